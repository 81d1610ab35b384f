//! Configuration loading from files and environment.
//!
//! Sources, later ones winning:
//! 1. Built-in defaults
//! 2. TOML file: `--config <path>`, else `<config dir>/shoplist/config.toml`
//! 3. Environment variables
//!
//! The result is validated before anything is served.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use shoplist_core::{
    AccessPolicy, ChatId, Error, ProjectionOptions, Result, SchemaDriftPolicy,
    DEFAULT_TIMESTAMP_FORMAT,
};

/// Telegram allows 100 inline buttons; two go to the add/refresh row
const MAX_LIST_BUTTONS: usize = 98;

/// Where the ledger lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Google Sheets
    #[default]
    Sheets,
    /// Process memory, lost on exit
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: String,
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            poll_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub backend: BackendKind,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub schema_drift: SchemaDriftPolicy,
    pub timestamp_format: String,
    pub remote_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            spreadsheet_id: String::new(),
            sheet_name: "ListaCompras".to_string(),
            schema_drift: SchemaDriftPolicy::default(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            remote_timeout_secs: 15,
        }
    }
}

/// Service-account key, inline or on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub credentials_json: Option<String>,
    pub credentials_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Empty means every chat is served
    pub allowed_chats: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_secs: 600 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub max_label_chars: usize,
    /// Items listed with a button; the rest is summarized
    pub max_entries: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        let defaults = ProjectionOptions::default();
        Self {
            max_label_chars: defaults.max_label_chars,
            max_entries: defaults.max_entries,
        }
    }
}

/// Complete bot configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub ledger: LedgerConfig,
    pub google: GoogleConfig,
    pub access: AccessConfig,
    pub session: SessionConfig,
    pub display: DisplayConfig,
}

/// Load configuration from all sources and validate it.
///
/// An explicit `path` must exist; the default location is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => load_toml_file(path)?,
        None => match default_config_path() {
            Some(path) if path.is_file() => load_toml_file(&path)?,
            _ => Config::default(),
        },
    };

    let config = config.apply_env_vars()?;
    config.validate()?;
    Ok(config)
}

/// `<config dir>/shoplist/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "shoplist")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Parse one TOML file
pub fn load_toml_file(path: &Path) -> Result<Config> {
    if path.is_dir() {
        return Err(Error::config(format!(
            "Config path is a directory, not a file: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("Failed to read config file {}: {e}", path.display()))
    })?;
    toml::from_str(&content).map_err(|e| {
        Error::config(format!(
            "Failed to parse config file {}: {e}",
            path.display()
        ))
    })
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::config(format!("Invalid {name} value {value:?}: {e}")))
}

impl Config {
    /// Apply environment variable overrides
    pub fn apply_env_vars(mut self) -> Result<Self> {
        if let Some(value) = env_var("TELEGRAM_TOKEN") {
            self.telegram.token = value;
        }
        if let Some(value) = env_var("SPREADSHEET_ID") {
            self.ledger.spreadsheet_id = value;
        }
        if let Some(value) = env_var("SHEET_NAME") {
            self.ledger.sheet_name = value;
        }
        if let Some(value) = env_var("GROUP_ID") {
            let group: i64 = parse_env("GROUP_ID", &value)?;
            self.access.allowed_chats = if group == 0 { Vec::new() } else { vec![group] };
        }
        if let Some(value) = env_var("GOOGLE_CREDS_JSON") {
            self.google.credentials_json = Some(value);
        }
        if let Some(value) = env_var("GOOGLE_CREDS_FILE") {
            self.google.credentials_file = Some(PathBuf::from(value));
        }
        if let Some(value) = env_var("SHOPLIST_BACKEND") {
            self.ledger.backend = match value.trim().to_ascii_lowercase().as_str() {
                "sheets" => BackendKind::Sheets,
                "memory" => BackendKind::Memory,
                other => {
                    return Err(Error::config(format!(
                        "Invalid SHOPLIST_BACKEND value {other:?}: expected sheets or memory"
                    )))
                }
            };
        }
        if let Some(value) = env_var("SHOPLIST_SESSION_TTL_SECS") {
            self.session.ttl_secs = parse_env("SHOPLIST_SESSION_TTL_SECS", &value)?;
        }
        if let Some(value) = env_var("SHOPLIST_REMOTE_TIMEOUT_SECS") {
            self.ledger.remote_timeout_secs = parse_env("SHOPLIST_REMOTE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = env_var("SHOPLIST_SCHEMA_DRIFT") {
            self.ledger.schema_drift = match value.trim().to_ascii_lowercase().as_str() {
                "refuse" => SchemaDriftPolicy::Refuse,
                "reset" => SchemaDriftPolicy::Reset,
                other => {
                    return Err(Error::config(format!(
                        "Invalid SHOPLIST_SCHEMA_DRIFT value {other:?}: expected refuse or reset"
                    )))
                }
            };
        }
        Ok(self)
    }

    /// Check required fields and ranges
    pub fn validate(&self) -> Result<()> {
        if self.telegram.token.trim().is_empty() {
            return Err(Error::config(
                "telegram.token is required (or set TELEGRAM_TOKEN)",
            ));
        }
        if self.ledger.backend == BackendKind::Sheets {
            if self.ledger.spreadsheet_id.trim().is_empty() {
                return Err(Error::config(
                    "ledger.spreadsheet_id is required for the sheets backend (or set SPREADSHEET_ID)",
                ));
            }
            if self.google.credentials_json.is_none() && self.google.credentials_file.is_none() {
                return Err(Error::config(
                    "google credentials are required for the sheets backend \
                     (set GOOGLE_CREDS_JSON or GOOGLE_CREDS_FILE)",
                ));
            }
        }
        if self.ledger.sheet_name.trim().is_empty() {
            return Err(Error::config("ledger.sheet_name cannot be empty"));
        }
        if self.ledger.remote_timeout_secs == 0 {
            return Err(Error::config("ledger.remote_timeout_secs must be greater than 0"));
        }
        if self.session.ttl_secs == 0 {
            return Err(Error::config("session.ttl_secs must be greater than 0"));
        }
        if self.display.max_label_chars == 0 {
            return Err(Error::config("display.max_label_chars must be greater than 0"));
        }
        if !(1..=MAX_LIST_BUTTONS).contains(&self.display.max_entries) {
            return Err(Error::config(format!(
                "display.max_entries must be between 1 and {MAX_LIST_BUTTONS}"
            )));
        }
        Ok(())
    }

    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::only(self.access.allowed_chats.iter().copied().map(ChatId))
    }

    pub const fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger.remote_timeout_secs)
    }

    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session.ttl_secs)
    }

    pub const fn projection(&self) -> ProjectionOptions {
        ProjectionOptions {
            max_label_chars: self.display.max_label_chars,
            max_entries: self.display.max_entries,
        }
    }
}
