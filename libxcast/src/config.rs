//! Configuration management for xcast
//!
//! Settings come from an optional TOML file, then environment variables
//! (a `.env` file in the working directory is honoured). The database URL
//! is required; the encryption key is never read from the config file, see
//! [`crate::vault::CredentialVault::from_env`].

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub scheduler: SchedulerConfig,
    pub delivery: DeliveryConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sqlite://` URL or a plain file path
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub root: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: "~/.local/share/xcast/uploads".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Run the scheduler inside `xcast-serve`
    pub enabled: bool,
    /// Seconds between ticks
    pub poll_interval: u64,
    /// Failed attempts before a post becomes terminally failed; unset retries forever
    pub max_attempts: Option<u32>,
    /// Posts delivered concurrently within one tick
    pub concurrency: usize,
    /// Seconds after which another worker may take over a claimed post
    ///
    /// A claimed post cannot be deleted while its lease is fresh. If a post is
    /// delivered but recording it keeps failing, it stays claimed and is sent
    /// again once the lease runs out.
    pub claim_lease: i64,
    /// Offset used for schedule strings without an explicit zone, e.g. "+09:00"
    ///
    /// Defaults to UTC. Deployments that write schedules in Japan time need
    /// "+09:00".
    pub utc_offset: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: 60,
            max_attempts: None,
            concurrency: 4,
            claim_lease: crate::store::DEFAULT_CLAIM_LEASE,
            utc_offset: "+00:00".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Parse `utc_offset` into a chrono offset
    pub fn offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.utc_offset).ok_or_else(|| {
            ConfigError::InvalidValue {
                field: "scheduler.utc_offset".to_string(),
                reason: format!("expected +HH:MM or -HH:MM, got '{}'", self.utc_offset),
            }
            .into()
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub api_base: String,
    pub upload_base: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.twitter.com".to_string(),
            upload_base: "https://upload.twitter.com".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec![],
            max_upload_bytes: 20 * 1024 * 1024,
            request_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from the default location plus the environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match resolve_config_path()? {
            Some(path) => Self::load_from_path(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path (no environment overrides)
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Overlay environment variables onto the loaded values
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(root) = std::env::var("XCAST_MEDIA_ROOT") {
            self.media.root = root;
        }
        if let Ok(enabled) = std::env::var("XCAST_SCHEDULER_ENABLED") {
            self.scheduler.enabled = matches!(
                enabled.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Ok(host) = std::env::var("XCAST_HOST") {
            self.server.host = host;
        }
        if let Some(port) = std::env::var("XCAST_PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Check required fields and value ranges
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::MissingField("database.url (DATABASE_URL)".to_string()).into());
        }
        if self.scheduler.poll_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.poll_interval".to_string(),
                reason: "must be at least 1 second".to_string(),
            }
            .into());
        }
        if self.scheduler.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.scheduler.max_attempts == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.max_attempts".to_string(),
                reason: "must be at least 1 when set".to_string(),
            }
            .into());
        }
        self.scheduler.offset()?;
        Ok(())
    }

    /// Media root with `~` expanded
    pub fn media_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.media.root).to_string())
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
///
/// Returns `None` when no file exists at the default location.
pub fn resolve_config_path() -> Result<Option<PathBuf>> {
    if let Ok(path) = std::env::var("XCAST_CONFIG") {
        return Ok(Some(PathBuf::from(shellexpand::tilde(&path).to_string())));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    let path = config_dir.join("xcast").join("config.toml");
    Ok(path.exists().then_some(path))
}

/// Parse "+09:00", "-05:30", "+0900" or "Z"
pub fn parse_utc_offset(input: &str) -> Option<FixedOffset> {
    let s = input.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
