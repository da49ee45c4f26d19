//! Configuration file parser for ~/.config/newsdesk/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown top-level keys are ignored by serde but logged as warnings, since
//! they are usually typos.
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::feed::naver;
use crate::storage::MAX_SOURCE_LEN;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Parsed fine but a value is out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level service configuration.
///
/// Every section uses `#[serde(default)]` so any subset of keys can be given.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file; relative paths resolve against the working directory.
    pub database_path: PathBuf,
    pub server: ServerConfig,
    pub collection: CollectionConfig,
    pub backup: BackupConfig,
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("newsdesk.db"),
            server: ServerConfig::default(),
            collection: CollectionConfig::default(),
            backup: BackupConfig::default(),
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
    /// Upper bound on one fetcher call, retries included
    pub fetch_timeout_secs: u64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 60,
            fetch_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    Local,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub enabled: bool,
    pub kind: BackupKind,
    /// Snapshot directory for `kind = "local"`
    pub base_path: PathBuf,
    /// Bucket URL for `kind = "http"`
    pub base_url: Option<String>,
    pub hour: u32,
    pub minute: u32,
    /// Offset defining calendar days for snapshots, e.g. 9 for KST
    pub utc_offset_hours: i32,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: BackupKind::Local,
            base_path: PathBuf::from("backups"),
            base_url: None,
            hour: 3,
            minute: 0,
            utc_offset_hours: 0,
        }
    }
}

/// One external news source.
///
/// `SecretString` keeps the Naver secret out of Debug output.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Rss {
        name: String,
        url: String,
    },
    Naver {
        client_id: String,
        #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
        client_secret: SecretString,
        #[serde(default = "default_naver_display")]
        display: u32,
        #[serde(default = "default_naver_base_url")]
        base_url: String,
    },
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn default_naver_display() -> u32 {
    100
}

fn default_naver_base_url() -> String {
    naver::DEFAULT_BASE_URL.to_string()
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 5] =
        ["database_path", "server", "collection", "backup", "sources"];

    /// `$HOME/.config/newsdesk/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("newsdesk")
                .join("config.toml")
        })
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    ///
    /// `NAVER_CLIENT_SECRET`, when set, replaces every configured Naver secret.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read(path)?;
        config.apply_env_overrides(std::env::var("NAVER_CLIENT_SECRET").ok());
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            backup = ?config.backup.kind,
            "Loaded configuration"
        );
        Ok(config)
    }

    fn apply_env_overrides(&mut self, naver_secret: Option<String>) {
        let Some(secret) = naver_secret.filter(|s| !s.is_empty()) else {
            return;
        };
        for source in &mut self.sources {
            if let SourceConfig::Naver { client_secret, .. } = source {
                *client_secret = SecretString::from(secret.clone());
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.collection.interval_minutes == 0 {
            return invalid("collection.interval_minutes must be at least 1".to_string());
        }
        if self.collection.fetch_timeout_secs == 0 {
            return invalid("collection.fetch_timeout_secs must be at least 1".to_string());
        }
        if self.backup.hour > 23 || self.backup.minute > 59 {
            return invalid(format!(
                "backup time {:02}:{:02} is not a valid time of day",
                self.backup.hour, self.backup.minute
            ));
        }
        if !(-12..=14).contains(&self.backup.utc_offset_hours) {
            return invalid(format!(
                "backup.utc_offset_hours {} is outside -12..=14",
                self.backup.utc_offset_hours
            ));
        }
        if self.backup.kind == BackupKind::Http && self.backup.base_url.is_none() {
            return invalid("backup.kind = \"http\" requires backup.base_url".to_string());
        }

        for source in &self.sources {
            if let SourceConfig::Rss { name, .. } = source {
                if name.trim().is_empty() || name.chars().count() > MAX_SOURCE_LEN {
                    return invalid(format!(
                        "rss source name {name:?} must be 1..={MAX_SOURCE_LEN} characters"
                    ));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
