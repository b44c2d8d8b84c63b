//! Encoder payload resolution from resources bundled into the binary.

use super::{ProvisionError, ToolHandle};
use rust_embed::RustEmbed;
use std::borrow::Cow;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Read-only set of named resources shipped with the program
pub trait PayloadSource: Send + Sync {
    /// Names of every bundled resource
    fn names(&self) -> Vec<String>;
    /// Contents of one resource, or None if it cannot be read
    fn read(&self, name: &str) -> Option<Cow<'static, [u8]>>;
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Assets;

/// Resources compiled in from this crate's `assets/` directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct BundledAssets;

impl PayloadSource for BundledAssets {
    fn names(&self) -> Vec<String> {
        Assets::iter().map(|name| name.into_owned()).collect()
    }

    fn read(&self, name: &str) -> Option<Cow<'static, [u8]>> {
        Assets::get(name).map(|file| file.data)
    }
}

/// Locates the payload by suffix and writes it out for one run.
pub struct PayloadExtractor {
    source: Arc<dyn PayloadSource>,
    suffix: String,
    temp_dir: PathBuf,
}

impl PayloadExtractor {
    pub fn new(source: Arc<dyn PayloadSource>, suffix: String, temp_dir: PathBuf) -> Self {
        Self {
            source,
            suffix,
            temp_dir,
        }
    }

    /// Name of the bundled payload, without extracting it.
    pub fn probe(&self) -> Result<String, ProvisionError> {
        let suffix = self.suffix.to_lowercase();
        let mut names: Vec<String> = self
            .source
            .names()
            .into_iter()
            .filter(|name| name.to_lowercase().ends_with(&suffix))
            .collect();
        names.sort();

        names
            .into_iter()
            .next()
            .ok_or_else(|| ProvisionError::PayloadMissing {
                suffix: self.suffix.clone(),
            })
    }

    /// Copy the payload to `<temp_dir>/cc-music-<uuid><suffix>`.
    ///
    /// The file is fully written and synced before this returns, so the
    /// encoder never sees a partial archive.
    pub fn extract(&self) -> Result<ToolHandle, ProvisionError> {
        let name = self.probe()?;
        let data = self
            .source
            .read(&name)
            .ok_or_else(|| ProvisionError::PayloadUnreadable { name: name.clone() })?;

        let path = self
            .temp_dir
            .join(format!("cc-music-{}{}", Uuid::new_v4(), self.suffix));
        let mut file = File::create(&path)?;
        file.write_all(&data)?;
        file.sync_all()?;

        debug!("Extracted {} to {}", name, path.display());
        Ok(ToolHandle::temporary(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    /// In-memory resource set; a `None` body simulates an unreadable entry
    struct MemorySource(BTreeMap<String, Option<Vec<u8>>>);

    impl MemorySource {
        fn new(entries: &[(&str, Option<&str>)]) -> Arc<Self> {
            Arc::new(Self(
                entries
                    .iter()
                    .map(|(name, data)| (name.to_string(), data.map(|d| d.as_bytes().to_vec())))
                    .collect(),
            ))
        }
    }

    impl PayloadSource for MemorySource {
        fn names(&self) -> Vec<String> {
            self.0.keys().cloned().collect()
        }

        fn read(&self, name: &str) -> Option<Cow<'static, [u8]>> {
            self.0.get(name).cloned().flatten().map(Cow::Owned)
        }
    }

    #[test]
    fn test_extract_writes_unique_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = MemorySource::new(&[
            ("README.md", Some("docs")),
            ("encoder.jar", Some("PK\x03\x04payload")),
        ]);
        let extractor = PayloadExtractor::new(source, ".jar".into(), temp_dir.path().into());

        let first = extractor.extract().unwrap();
        let second = extractor.extract().unwrap();

        assert!(first.is_temporary());
        assert_ne!(first.path(), second.path());
        assert_eq!(std::fs::read(first.path()).unwrap(), b"PK\x03\x04payload");
        let name = first.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("cc-music-") && name.ends_with(".jar"));
    }

    #[test]
    fn test_probe_matches_suffix_case_insensitively() {
        let source = MemorySource::new(&[("tools/Encoder.JAR", Some("x"))]);
        let extractor = PayloadExtractor::new(source, ".jar".into(), std::env::temp_dir());

        assert_eq!(extractor.probe().unwrap(), "tools/Encoder.JAR");
    }

    #[test]
    fn test_missing_payload() {
        let temp_dir = TempDir::new().unwrap();
        let source = MemorySource::new(&[("README.md", Some("docs"))]);
        let extractor = PayloadExtractor::new(source, ".jar".into(), temp_dir.path().into());

        assert!(matches!(
            extractor.extract(),
            Err(ProvisionError::PayloadMissing { ref suffix }) if suffix == ".jar"
        ));
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unreadable_payload() {
        let source = MemorySource::new(&[("encoder.jar", None)]);
        let extractor = PayloadExtractor::new(source, ".jar".into(), std::env::temp_dir());

        assert!(matches!(
            extractor.extract(),
            Err(ProvisionError::PayloadUnreadable { ref name }) if name == "encoder.jar"
        ));
    }

    #[test]
    fn test_bundled_assets_are_embedded() {
        let assets = BundledAssets;
        assert!(assets.names().iter().any(|n| n == "README.md"));
        assert!(assets.read("README.md").is_some());
        assert!(assets.read("no-such-file").is_none());
    }
}
