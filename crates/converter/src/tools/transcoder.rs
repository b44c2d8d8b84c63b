//! Transcoder resolution: find it in the tools directory, download it if absent.

use super::{Provenance, ProvisionError, ToolHandle};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Source of transcoder release packages
#[async_trait]
pub trait ReleaseFetcher: Send + Sync {
    /// Download a release and unpack it somewhere under `dest`.
    async fn fetch(&self, dest: &Path) -> Result<(), ProvisionError>;
}

/// Release platform key for the running host, as used by the release index.
pub fn platform_key() -> Option<&'static str> {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("windows", "x86_64") => Some("windows-64"),
        ("windows", "x86") => Some("windows-32"),
        ("linux", "x86_64") => Some("linux-64"),
        ("linux", "x86") => Some("linux-32"),
        ("linux", "aarch64") => Some("linux-arm64"),
        ("linux", "arm") => Some("linux-armhf"),
        ("macos", _) => Some("osx-64"),
        _ => None,
    }
}

/// Release index document: `{ "version": "6.1", "bin": { "<platform>": { "<tool>": "<zip url>" } } }`
#[derive(Debug, Deserialize)]
pub struct ReleaseIndex {
    pub version: String,
    pub bin: HashMap<String, HashMap<String, String>>,
}

impl ReleaseIndex {
    /// Archive URL for `component` on `platform`
    pub fn download_url(&self, platform: &str, component: &str) -> Result<&str, ProvisionError> {
        self.bin
            .get(platform)
            .ok_or_else(|| {
                ProvisionError::Index(format!(
                    "no release for platform '{}' in version {}",
                    platform, self.version
                ))
            })?
            .get(component)
            .map(String::as_str)
            .ok_or_else(|| {
                ProvisionError::Index(format!(
                    "no '{}' archive for platform '{}'",
                    component, platform
                ))
            })
    }
}

/// Fetches official static transcoder builds listed by an ffbinaries-style index.
pub struct FfbinariesFetcher {
    client: reqwest::Client,
    index_url: String,
    platform: Option<String>,
    component: String,
}

impl FfbinariesFetcher {
    /// `platform` of None means [`platform_key`] of the running host.
    pub fn new(index_url: String, platform: Option<String>, component: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            index_url,
            platform,
            component,
        }
    }

    fn platform(&self) -> Result<String, ProvisionError> {
        self.platform
            .clone()
            .or_else(|| platform_key().map(String::from))
            .ok_or_else(|| {
                ProvisionError::Index(format!(
                    "no prebuilt release for {}-{}",
                    std::env::consts::OS,
                    std::env::consts::ARCH
                ))
            })
    }
}

#[async_trait]
impl ReleaseFetcher for FfbinariesFetcher {
    async fn fetch(&self, dest: &Path) -> Result<(), ProvisionError> {
        let platform = self.platform()?;

        let index: ReleaseIndex = self
            .client
            .get(&self.index_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let url = index.download_url(&platform, &self.component)?;
        info!("Fetching {} {} for {}", self.component, index.version, platform);
        debug!("Release archive: {}", url);

        let archive = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let target = dest.join(&index.version);
        let extracted =
            tokio::task::spawn_blocking(move || extract_archive(&archive, &target)).await??;
        debug!("Extracted {} files", extracted.len());

        Ok(())
    }
}

/// Unpack a zip archive into `dest`, returning the files written.
///
/// Entries whose names would escape `dest` are skipped. On Unix every file
/// is made executable, since release archives do not always carry modes.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<Vec<PathBuf>, ProvisionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    fs::create_dir_all(dest)?;

    let mut written = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        out.sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(0o755))?;
        }

        written.push(out_path);
    }

    Ok(written)
}

/// Resolves the transcoder from a persistent tools directory.
pub struct TranscoderProvisioner {
    tools_dir: PathBuf,
    pattern: String,
    fetcher: Arc<dyn ReleaseFetcher>,
}

impl TranscoderProvisioner {
    pub fn new(tools_dir: PathBuf, pattern: String, fetcher: Arc<dyn ReleaseFetcher>) -> Self {
        Self {
            tools_dir,
            pattern,
            fetcher,
        }
    }

    /// First file under the tools directory whose name contains the pattern.
    ///
    /// A file whose stem equals the pattern exactly (`ffmpeg`, `ffmpeg.exe`)
    /// wins over looser matches; ties break on path order.
    pub fn find_existing(&self) -> Option<PathBuf> {
        let mut matches: Vec<PathBuf> = WalkDir::new(&self.tools_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| name.contains(self.pattern.as_str()))
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
            .collect();

        matches.sort_by_key(|path| {
            let exact = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s == self.pattern)
                .unwrap_or(false);
            (!exact, path.clone())
        });
        matches.into_iter().next()
    }

    /// Resolve the transcoder, downloading it only when nothing matches.
    ///
    /// Idempotent: once a matching file exists, later calls never fetch.
    pub async fn resolve(&self) -> Result<ToolHandle, ProvisionError> {
        fs::create_dir_all(&self.tools_dir)?;
        let tools_dir = fs::canonicalize(&self.tools_dir)?;

        if let Some(path) = self.find_existing() {
            debug!("Found transcoder at {}", path.display());
            return Ok(ToolHandle::persistent(
                fs::canonicalize(path)?,
                Provenance::PreExisting,
            ));
        }

        info!("Downloading {}....", self.pattern);
        self.fetcher.fetch(&tools_dir).await?;

        match self.find_existing() {
            Some(path) => {
                info!("Installed transcoder at {}", path.display());
                Ok(ToolHandle::persistent(
                    fs::canonicalize(path)?,
                    Provenance::Provisioned,
                ))
            }
            None => Err(ProvisionError::TranscoderNotFound {
                pattern: self.pattern.clone(),
                dir: tools_dir,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Fetcher that writes `files` under `dest` and counts its calls
    struct FakeFetcher {
        calls: AtomicUsize,
        files: Vec<&'static str>,
    }

    impl FakeFetcher {
        fn new(files: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                files,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReleaseFetcher for FakeFetcher {
        async fn fetch(&self, dest: &Path) -> Result<(), ProvisionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for file in &self.files {
                let path = dest.join(file);
                fs::create_dir_all(path.parent().unwrap())?;
                fs::write(path, b"#!/bin/sh\n")?;
            }
            Ok(())
        }
    }

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn test_resolve_downloads_once_then_reuses() {
        let temp_dir = TempDir::new().unwrap();
        let tools_dir = temp_dir.path().join("ffmpeg");
        let fetcher = FakeFetcher::new(vec!["6.1/ffmpeg"]);
        let provisioner =
            TranscoderProvisioner::new(tools_dir.clone(), "ffmpeg".into(), fetcher.clone());

        let first = provisioner.resolve().await.unwrap();
        assert_eq!(first.provenance(), Provenance::Provisioned);
        assert!(!first.is_temporary());
        assert_eq!(fetcher.calls(), 1);

        let second = provisioner.resolve().await.unwrap();
        assert_eq!(second.provenance(), Provenance::PreExisting);
        assert_eq!(second.path(), first.path());
        assert_eq!(fetcher.calls(), 1, "second resolve must not download");
    }

    #[tokio::test]
    async fn test_resolve_uses_existing_without_fetch() {
        let temp_dir = TempDir::new().unwrap();
        let tools_dir = temp_dir.path().to_path_buf();
        fs::create_dir_all(tools_dir.join("nested")).unwrap();
        fs::write(tools_dir.join("nested/ffmpeg.exe"), b"MZ").unwrap();
        let fetcher = FakeFetcher::new(vec![]);
        let provisioner = TranscoderProvisioner::new(tools_dir, "ffmpeg".into(), fetcher.clone());

        let handle = provisioner.resolve().await.unwrap();

        assert_eq!(handle.provenance(), Provenance::PreExisting);
        assert!(handle.path().ends_with("nested/ffmpeg.exe"));
        assert!(handle.path().is_absolute());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_fails_when_download_has_no_match() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = FakeFetcher::new(vec!["6.1/readme.txt"]);
        let provisioner =
            TranscoderProvisioner::new(temp_dir.path().to_path_buf(), "ffmpeg".into(), fetcher);

        let result = provisioner.resolve().await;

        assert!(matches!(
            result,
            Err(ProvisionError::TranscoderNotFound { ref pattern, .. }) if pattern == "ffmpeg"
        ));
    }

    #[test]
    fn test_exact_stem_preferred_over_loose_match() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::create_dir_all(dir.join("__MACOSX")).unwrap();
        fs::write(dir.join("__MACOSX/._ffmpeg"), b"").unwrap();
        fs::write(dir.join("ffmpeg-notes.txt"), b"").unwrap();
        fs::write(dir.join("ffmpeg"), b"").unwrap();
        let provisioner =
            TranscoderProvisioner::new(dir.to_path_buf(), "ffmpeg".into(), FakeFetcher::new(vec![]));

        assert_eq!(provisioner.find_existing(), Some(dir.join("ffmpeg")));
    }

    #[test]
    fn test_extract_archive_writes_files_and_skips_escapes() {
        let temp_dir = TempDir::new().unwrap();
        let bytes = build_zip(&[
            ("ffmpeg", b"binary"),
            ("docs/LICENSE", b"text"),
            ("../escape", b"nope"),
        ]);
        let dest = temp_dir.path().join("6.1");

        let written = extract_archive(&bytes, &dest).unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(fs::read(dest.join("ffmpeg")).unwrap(), b"binary");
        assert_eq!(fs::read(dest.join("docs/LICENSE")).unwrap(), b"text");
        assert!(!temp_dir.path().join("escape").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dest.join("ffmpeg")).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn test_extract_archive_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let result = extract_archive(b"definitely not a zip", temp_dir.path());
        assert!(matches!(result, Err(ProvisionError::Archive(_))));
    }

    #[test]
    fn test_release_index_lookup() {
        let json = r#"{
            "version": "6.1",
            "permalink": "https://ffbinaries.com/api/v1/version/6.1",
            "bin": {
                "linux-64": { "ffmpeg": "https://example.invalid/ffmpeg-6.1-linux-64.zip" },
                "windows-64": { "ffprobe": "https://example.invalid/ffprobe-6.1-win-64.zip" }
            }
        }"#;
        let index: ReleaseIndex = serde_json::from_str(json).unwrap();

        assert_eq!(
            index.download_url("linux-64", "ffmpeg").unwrap(),
            "https://example.invalid/ffmpeg-6.1-linux-64.zip"
        );
        assert!(matches!(
            index.download_url("osx-64", "ffmpeg"),
            Err(ProvisionError::Index(_))
        ));
        assert!(matches!(
            index.download_url("windows-64", "ffmpeg"),
            Err(ProvisionError::Index(_))
        ));
    }

    #[test]
    fn test_platform_key_known_for_ci_hosts() {
        if cfg!(all(target_os = "linux", target_arch = "x86_64")) {
            assert_eq!(platform_key(), Some("linux-64"));
        }
    }

    #[test]
    fn test_fetcher_platform_override() {
        let fetcher = FfbinariesFetcher::new(
            "http://127.0.0.1:9/index".into(),
            Some("linux-armhf".into()),
            "ffmpeg".into(),
        );
        assert_eq!(fetcher.platform().unwrap(), "linux-armhf");
    }
}
