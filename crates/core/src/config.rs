//! Configuration management
//!
//! This module handles loading and saving the s3site configuration file.
//! The configuration file is stored in TOML format at ~/.s3site/config.toml.
//!
//! PROTECTED FILE: Changes to schema_version require migration support.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "S3SITE_CONFIG";

/// Directory under the home directory holding config and logs
pub const CONFIG_DIR_NAME: &str = ".s3site";

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_INDEX_DOCUMENT: &str = "index.html";
const DEFAULT_COLOR: &str = "auto";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// AWS connection settings
    #[serde(default)]
    pub aws: AwsSettings,

    /// Default settings for CLI behavior
    #[serde(default)]
    pub defaults: Defaults,

    /// Defaults applied when creating sites
    #[serde(default)]
    pub site: SiteDefaults,

    /// Distribution teardown policy
    #[serde(default)]
    pub delete: DeleteSettings,
}

/// AWS credentials and client tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsSettings {
    /// Access key ID (falls back to the standard provider chain when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    /// Secret access key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,

    /// Region used for buckets and website endpoints
    #[serde(default = "default_region")]
    pub region: String,

    /// Alternate S3 endpoint URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_endpoint: Option<String>,

    /// Maximum SDK attempts per request
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

/// Default settings for CLI behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Show progress bars
    #[serde(default = "default_true")]
    pub progress: bool,

    /// Color mode: "auto", "always", or "never"
    #[serde(default = "default_color")]
    pub color: String,
}

/// Website documents used by `create` when not given on the command line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteDefaults {
    #[serde(default = "default_index_document")]
    pub index_document: String,

    #[serde(default)]
    pub error_document: String,
}

/// Polling behavior while disabling a distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    60000
}

fn default_true() -> bool {
    true
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_index_document() -> String {
    DEFAULT_INDEX_DOCUMENT.to_string()
}

fn default_poll_interval() -> u64 {
    30
}

fn default_max_wait() -> u64 {
    3600
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            region: default_region(),
            s3_endpoint: None,
            max_attempts: default_max_attempts(),
            connect_timeout_ms: default_connect_timeout(),
            read_timeout_ms: default_read_timeout(),
        }
    }
}

impl AwsSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Static credentials, if both halves are configured
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            progress: true,
            color: default_color(),
        }
    }
}

impl Default for SiteDefaults {
    fn default() -> Self {
        Self {
            index_document: default_index_document(),
            error_document: String::new(),
        }
    }
}

impl Default for DeleteSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_wait_secs: default_max_wait(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            aws: AwsSettings::default(),
            defaults: Defaults::default(),
            site: SiteDefaults::default(),
            delete: DeleteSettings::default(),
        }
    }
}

/// The kinds of value a setting may hold, each with its own check
#[derive(Debug, Clone, Copy)]
enum SettingKind<'a> {
    /// Non-empty string
    Text(&'a str),
    /// Integer with a lower bound
    AtLeast(u64, u64),
    /// One of a fixed set of words
    Choice(&'a str, &'a [&'a str]),
    /// Absolute http(s) URL
    Url(&'a str),
}

impl SettingKind<'_> {
    fn validate(self) -> std::result::Result<(), String> {
        match self {
            SettingKind::Text(value) if value.trim().is_empty() => {
                Err("must not be empty".to_string())
            }
            SettingKind::Text(_) => Ok(()),
            SettingKind::AtLeast(value, min) if value < min => {
                Err(format!("must be at least {min}"))
            }
            SettingKind::AtLeast(..) => Ok(()),
            SettingKind::Choice(value, options) if !options.contains(&value) => {
                Err(format!("expected one of {}", options.join(", ")))
            }
            SettingKind::Choice(..) => Ok(()),
            SettingKind::Url(value) => match url::Url::parse(value) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
                Ok(url) => Err(format!("unsupported scheme '{}'", url.scheme())),
                Err(e) => Err(e.to_string()),
            },
        }
    }
}

fn check(section: &str, setting: &str, kind: SettingKind<'_>) -> Result<()> {
    kind.validate().map_err(|reason| {
        Error::Config(format!(
            "invalid value for setting {setting} in section [{section}]: {reason}"
        ))
    })
}

impl Config {
    /// Validate every setting, failing on the first bad one
    pub fn validate(&self) -> Result<()> {
        let aws = &self.aws;
        match (&aws.access_key_id, &aws.secret_access_key) {
            (Some(id), Some(secret)) => {
                check("aws", "access_key_id", SettingKind::Text(id))?;
                check("aws", "secret_access_key", SettingKind::Text(secret))?;
            }
            (None, None) => {}
            (Some(_), None) => {
                return Err(Error::Config(
                    "setting secret_access_key in section [aws] is required when access_key_id is set"
                        .into(),
                ));
            }
            (None, Some(_)) => {
                return Err(Error::Config(
                    "setting access_key_id in section [aws] is required when secret_access_key is set"
                        .into(),
                ));
            }
        }
        check("aws", "region", SettingKind::Text(&aws.region))?;
        if let Some(endpoint) = &aws.s3_endpoint {
            check("aws", "s3_endpoint", SettingKind::Url(endpoint))?;
        }
        check(
            "aws",
            "max_attempts",
            SettingKind::AtLeast(u64::from(aws.max_attempts), 1),
        )?;
        check(
            "aws",
            "connect_timeout_ms",
            SettingKind::AtLeast(aws.connect_timeout_ms, 1),
        )?;
        check(
            "aws",
            "read_timeout_ms",
            SettingKind::AtLeast(aws.read_timeout_ms, 1),
        )?;

        check(
            "defaults",
            "color",
            SettingKind::Choice(&self.defaults.color, &["auto", "always", "never"]),
        )?;

        check(
            "site",
            "index_document",
            SettingKind::Text(&self.site.index_document),
        )?;

        check(
            "delete",
            "poll_interval_secs",
            SettingKind::AtLeast(self.delete.poll_interval_secs, 1),
        )?;
        check(
            "delete",
            "max_wait_secs",
            SettingKind::AtLeast(self.delete.max_wait_secs, self.delete.poll_interval_secs),
        )?;
        Ok(())
    }
}

/// Directory holding the config file and crash reports (~/.s3site)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
    explicit: bool,
}

impl ConfigManager {
    /// Create a new ConfigManager, honoring `S3SITE_CONFIG` before the default path
    pub fn new() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(Self::with_path(PathBuf::from(path)));
        }
        let config_path = config_dir()?.join("config.toml");
        Ok(Self {
            config_path,
            explicit: false,
        })
    }

    /// Create a ConfigManager for an explicitly chosen file
    ///
    /// Unlike the default location, an explicit file must exist when loaded.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: path,
            explicit: true,
        }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load and validate the configuration
    ///
    /// A missing file at the default location yields the default configuration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            if self.explicit {
                return Err(Error::ConfigNotFound(self.config_path.clone()));
            }
            tracing::debug!(path = %self.config_path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        if !self.config_path.is_file() {
            return Err(Error::Config(format!(
                "config {} exists but is not a regular file",
                self.config_path.display()
            )));
        }

        tracing::debug!(path = %self.config_path.display(), "loading config");
        let content = std::fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&content)?;

        if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade s3site.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        config.validate()?;
        Ok(config)
    }
}
