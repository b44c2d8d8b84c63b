//! Filename sanitization for shell-safe, cross-platform output names.
//!
//! Every stage derives its output basename from the input file name through
//! [`sanitize`], so the mapping must stay a pure function of `(name, policy)`.

pub use crate::config::SanitizePolicy;
use thiserror::Error;

/// Error type for sanitization
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SanitizeError {
    /// Nothing from the allow-list survived
    #[error("file name '{original}' has no usable characters after sanitization")]
    Empty { original: String },
}

/// Returns true for characters allowed in an output basename.
pub fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Strip the final extension, if any.
///
/// `"a.b.mp3"` -> `"a.b"`, `"track"` -> `"track"`, `".mp3"` -> `""`.
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

fn trim_dots_and_space(s: &str) -> &str {
    s.trim_matches(|c: char| c == '.' || c.is_whitespace())
}

/// Sanitize a file name into a safe basename without extension.
///
/// Steps: strip the extension, trim `.` and whitespace from both ends, join
/// internal whitespace runs with `_`, apply the case policy, then drop every
/// character outside `[a-zA-Z0-9._-]`. Leading/trailing dots exposed by the
/// filter are trimmed again so the result never names `.` or `..`.
///
/// # Errors
/// Returns [`SanitizeError::Empty`] when nothing is left; callers reject the
/// file instead of writing to a collision-prone empty name.
pub fn sanitize(original: &str, policy: SanitizePolicy) -> Result<String, SanitizeError> {
    let stem = trim_dots_and_space(strip_extension(original));

    let joined = stem.split_whitespace().collect::<Vec<_>>().join("_");

    let cased = match policy {
        SanitizePolicy::Lowercase => joined.to_lowercase(),
        SanitizePolicy::PreserveCase => joined,
    };

    let filtered: String = cased.chars().filter(|&c| is_allowed(c)).collect();
    let result = filtered.trim_matches('.');

    if result.is_empty() {
        return Err(SanitizeError::Empty {
            original: original.to_string(),
        });
    }

    Ok(result.to_string())
}
