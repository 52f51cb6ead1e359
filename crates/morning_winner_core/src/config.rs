//! Startup-time storage configuration.
//!
//! # Responsibility
//! - Decide once per session whether the hosted or the local store is used.
//! - Carry adapter tuning (timeout, upsert mode) as explicit values.
//!
//! # Invariants
//! - Selection is a pure function of the supplied key lookup.
//! - Missing or placeholder hosted credentials select the local store; this
//!   is not an error.

use log::warn;
use reqwest::Url;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_HOSTED_URL: &str = "SUPABASE_URL";
pub const ENV_HOSTED_KEY: &str = "SUPABASE_ANON_KEY";
/// Prefix used by web deployments for the same two values.
pub const ENV_PUBLIC_PREFIX: &str = "NEXT_PUBLIC_";
pub const ENV_DB_PATH: &str = "MORNING_WINNER_DB_PATH";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "MORNING_WINNER_HTTP_TIMEOUT_SECS";
pub const ENV_UPSERT_MODE: &str = "MORNING_WINNER_UPSERT_MODE";

pub const DEFAULT_DB_FILE_NAME: &str = "morning_winner.sqlite3";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const URL_PLACEHOLDER: &str = "your_supabase_project_url";
const KEY_PLACEHOLDER: &str = "your_supabase_anon_key";

/// Invalid tuning values. Hosted credentials never produce this error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidTimeout(String),
    InvalidUpsertMode(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTimeout(value) => write!(
                f,
                "invalid {ENV_HTTP_TIMEOUT_SECS} `{value}`; expected a positive integer"
            ),
            Self::InvalidUpsertMode(value) => write!(
                f,
                "invalid {ENV_UPSERT_MODE} `{value}`; expected atomic|read_then_write"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Connection values for the hosted tables.
#[derive(Clone, PartialEq, Eq)]
pub struct HostedConfig {
    pub base_url: String,
    pub api_key: String,
}

impl HostedConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Returns `true` when both values are present, non-placeholder, and the
    /// URL is an absolute http(s) URL.
    pub fn is_usable(&self) -> bool {
        let url = self.base_url.trim();
        let key = self.api_key.trim();
        if url.is_empty() || key.is_empty() || url == URL_PLACEHOLDER || key == KEY_PLACEHOLDER {
            return false;
        }
        matches!(
            Url::parse(url).map(|parsed| parsed.scheme().to_string()),
            Ok(scheme) if scheme == "http" || scheme == "https"
        )
    }
}

// The key never appears in logs or debug output.
impl Debug for HostedConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// How the hosted adapter performs the `(member_id, date)` upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpsertMode {
    /// Single insert-or-update keyed on the unique pair.
    #[default]
    Atomic,
    /// Lookup followed by update or insert. Racing writers can collide.
    ReadThenWrite,
}

impl FromStr for UpsertMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "atomic" => Ok(Self::Atomic),
            "read_then_write" | "read-then-write" => Ok(Self::ReadThenWrite),
            other => Err(ConfigError::InvalidUpsertMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSelection {
    Local,
    Hosted(HostedConfig),
}

/// Everything needed to construct the session's storage adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: BackendSelection,
    /// SQLite file for the local store. Unused by the hosted backend.
    pub local_db_path: PathBuf,
    /// Per-request timeout for hosted calls.
    pub http_timeout: Duration,
    pub upsert_mode: UpsertMode,
}

impl StorageConfig {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendSelection::Local,
            local_db_path: path.into(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            upsert_mode: UpsertMode::default(),
        }
    }

    pub fn hosted(hosted: HostedConfig) -> Self {
        Self {
            backend: BackendSelection::Hosted(hosted),
            ..Self::local(DEFAULT_DB_FILE_NAME)
        }
    }

    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Hosted credentials are read from `SUPABASE_URL`/`SUPABASE_ANON_KEY`,
    /// falling back to their `NEXT_PUBLIC_` forms.
    ///
    /// # Errors
    /// - `InvalidTimeout` when the timeout is not a positive integer.
    /// - `InvalidUpsertMode` when the mode name is unknown.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read_one = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        // A blank primary value does not shadow the prefixed form.
        let read = |name: &str| {
            read_one(name).or_else(|| read_one(&format!("{ENV_PUBLIC_PREFIX}{name}")))
        };

        let backend = match (read(ENV_HOSTED_URL), read(ENV_HOSTED_KEY)) {
            (Some(url), Some(key)) => {
                let hosted = HostedConfig::new(url, key);
                if hosted.is_usable() {
                    BackendSelection::Hosted(hosted)
                } else {
                    warn!("event=config_select module=config status=fallback backend=local reason=invalid_hosted_credentials");
                    BackendSelection::Local
                }
            }
            _ => {
                warn!("event=config_select module=config status=fallback backend=local reason=hosted_not_configured");
                BackendSelection::Local
            }
        };

        let http_timeout = match read(ENV_HTTP_TIMEOUT_SECS) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
            None => DEFAULT_HTTP_TIMEOUT,
        };

        let upsert_mode = match read(ENV_UPSERT_MODE) {
            Some(raw) => raw.parse()?,
            None => UpsertMode::default(),
        };

        Ok(Self {
            backend,
            local_db_path: read(ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE_NAME)),
            http_timeout,
            upsert_mode,
        })
    }

    pub fn is_hosted(&self) -> bool {
        matches!(self.backend, BackendSelection::Hosted(_))
    }
}
