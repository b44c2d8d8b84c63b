//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Filesystem layout used by a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    /// Directory scanned recursively for source audio
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    /// Root under which each run creates its working directory
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Persistent cache for the downloaded transcoder
    #[serde(default = "default_tools_dir")]
    pub tools_dir: PathBuf,
    /// Log file shared with the console output
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("input")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_tools_dir() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("latest.log")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            tools_dir: default_tools_dir(),
            log_file: default_log_file(),
        }
    }
}

/// Transcoder (stage 1) resolution settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscoderConfig {
    /// A file in the tools directory whose name contains this is the transcoder
    #[serde(default = "default_name_pattern")]
    pub name_pattern: String,
    /// JSON index listing release archives per platform
    #[serde(default = "default_release_index_url")]
    pub release_index_url: String,
    /// Platform key override (e.g. "linux-64"); auto-detected if None
    #[serde(default)]
    pub platform: Option<String>,
}

fn default_name_pattern() -> String {
    "ffmpeg".to_string()
}

fn default_release_index_url() -> String {
    "https://ffbinaries.com/api/v1/version/latest".to_string()
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            name_pattern: default_name_pattern(),
            release_index_url: default_release_index_url(),
            platform: None,
        }
    }
}

/// Encoder (stage 2) settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncoderConfig {
    /// Runtime used to launch the bundled payload
    #[serde(default = "default_java")]
    pub java: PathBuf,
    /// File suffix identifying the payload among bundled assets
    #[serde(default = "default_payload_suffix")]
    pub payload_suffix: String,
}

fn default_java() -> PathBuf {
    PathBuf::from("java")
}

fn default_payload_suffix() -> String {
    ".jar".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            java: default_java(),
            payload_suffix: default_payload_suffix(),
        }
    }
}

/// How output basenames are derived from source file names
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SanitizePolicy {
    /// Lowercase, then keep `[a-z0-9._-]`
    #[default]
    Lowercase,
    /// Keep case, keep `[a-zA-Z0-9._-]`
    PreserveCase,
}

impl SanitizePolicy {
    /// Parse the config/env spelling of a policy
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "lowercase" => Some(SanitizePolicy::Lowercase),
            "preserve-case" | "preserve_case" => Some(SanitizePolicy::PreserveCase),
            _ => None,
        }
    }
}

/// Name sanitization settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SanitizeConfig {
    #[serde(default)]
    pub policy: SanitizePolicy,
}

/// Post-run cleanup settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleanupConfig {
    /// Grace period before the extracted payload is deleted, in milliseconds
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_settle_delay_ms() -> u64 {
    1000
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub sanitize: SanitizeConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config.toml file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - CCMC_INPUT_DIR -> paths.input_dir
    /// - CCMC_OUTPUT_DIR -> paths.output_dir
    /// - CCMC_TOOLS_DIR -> paths.tools_dir
    /// - CCMC_LOG_FILE -> paths.log_file
    /// - CCMC_JAVA -> encoder.java
    /// - CCMC_TRANSCODER_PLATFORM -> transcoder.platform
    /// - CCMC_SANITIZE_POLICY -> sanitize.policy
    /// - CCMC_SETTLE_DELAY_MS -> cleanup.settle_delay_ms
    pub fn apply_env_overrides(&mut self) {
        if let Some(val) = non_empty_var("CCMC_INPUT_DIR") {
            self.paths.input_dir = PathBuf::from(val);
        }

        if let Some(val) = non_empty_var("CCMC_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(val);
        }

        if let Some(val) = non_empty_var("CCMC_TOOLS_DIR") {
            self.paths.tools_dir = PathBuf::from(val);
        }

        if let Some(val) = non_empty_var("CCMC_LOG_FILE") {
            self.paths.log_file = PathBuf::from(val);
        }

        if let Some(val) = non_empty_var("CCMC_JAVA") {
            self.encoder.java = PathBuf::from(val);
        }

        if let Some(val) = non_empty_var("CCMC_TRANSCODER_PLATFORM") {
            self.transcoder.platform = Some(val);
        }

        // Unknown policy names keep the existing value
        if let Some(val) = non_empty_var("CCMC_SANITIZE_POLICY") {
            if let Some(policy) = SanitizePolicy::parse(&val) {
                self.sanitize.policy = policy;
            }
        }

        if let Ok(val) = env::var("CCMC_SETTLE_DELAY_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.cleanup.settle_delay_ms = ms;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields defaults plus env overrides
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            return Self::load(path);
        }
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
