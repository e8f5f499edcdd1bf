//! Configuration management
//!
//! Settings live in `~/.litaudit/config.yaml`. Every setting can be
//! overridden by an environment variable, which takes precedence over the
//! file:
//!
//! | key            | variable               |
//! |----------------|------------------------|
//! | `api_key`      | `LITAUDIT_API_KEY`     |
//! | `library_id`   | `LITAUDIT_LIBRARY_ID`  |
//! | `library_type` | `LITAUDIT_LIBRARY_TYPE`|
//! | `api_url`      | `LITAUDIT_API_URL`     |
//! | `mirror_path`  | `LITAUDIT_MIRROR_PATH` |
//! | `ledger_path`  | `LITAUDIT_LEDGER_PATH` |

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transport::LibraryType;

/// Name of the per-user configuration directory.
const CONFIG_DIR: &str = ".litaudit";

/// Keys accepted by `config get` and `config set`.
pub const KEYS: &[&str] = &[
    "api_key",
    "library_id",
    "library_type",
    "api_url",
    "mirror_path",
    "ledger_path",
    "timeout_secs",
    "persona",
    "phase",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not find home directory")]
    NoHomeDirectory,

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to write config file: {0}")]
    Write(#[from] std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Unknown config key '{0}'. Valid keys: {keys}", keys = KEYS.join(", "))]
    UnknownKey(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("No backend configured: set api_key and library_id for the remote library, or mirror_path for an offline snapshot")]
    NoBackend,

    #[error("Remote credentials and mirror_path are both configured; pass --offline to use the mirror or unset mirror_path")]
    AmbiguousBackend,
}

/// Persisted settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for the remote library
    pub api_key: Option<String>,

    /// Numeric id of the remote library
    pub library_id: Option<String>,

    /// `user` or `group`
    pub library_type: Option<String>,

    /// API base URL, for self-hosted deployments
    pub api_url: Option<String>,

    /// Path to the desktop client's snapshot database
    pub mirror_path: Option<PathBuf>,

    /// Path to the local screening ledger
    pub ledger_path: Option<PathBuf>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Default reviewer persona
    pub persona: Option<String>,

    /// Default review phase
    pub phase: Option<String>,
}

/// The one backend a session talks to.
#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    Remote {
        api_key: String,
        library_id: String,
        library_type: LibraryType,
        api_url: Option<String>,
        timeout: Option<Duration>,
    },
    Mirror {
        path: PathBuf,
    },
}

impl Config {
    /// Path of the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(config_dir()?.join("config.yaml"))
    }

    /// Loads the config file and applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| env::var(name).ok());
        Ok(config)
    }

    /// Loads a config file without overrides. A missing file is an empty config.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_saphyr::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Writes the config file, creating its directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let yaml = serde_saphyr::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Applies `LITAUDIT_*` overrides from `lookup`.
    pub fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("LITAUDIT_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = var("LITAUDIT_LIBRARY_ID") {
            self.library_id = Some(v);
        }
        if let Some(v) = var("LITAUDIT_LIBRARY_TYPE") {
            self.library_type = Some(v);
        }
        if let Some(v) = var("LITAUDIT_API_URL") {
            self.api_url = Some(v);
        }
        if let Some(v) = var("LITAUDIT_MIRROR_PATH") {
            self.mirror_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("LITAUDIT_LEDGER_PATH") {
            self.ledger_path = Some(PathBuf::from(v));
        }
    }

    /// Reads a setting by key.
    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let value = match key {
            "api_key" => self.api_key.clone(),
            "library_id" => self.library_id.clone(),
            "library_type" => self.library_type.clone(),
            "api_url" => self.api_url.clone(),
            "mirror_path" => self.mirror_path.as_ref().map(|p| p.display().to_string()),
            "ledger_path" => self.ledger_path.as_ref().map(|p| p.display().to_string()),
            "timeout_secs" => self.timeout_secs.map(|t| t.to_string()),
            "persona" => self.persona.clone(),
            "phase" => self.phase.clone(),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        };
        Ok(value)
    }

    /// Updates a setting by key. An empty value clears it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let text = (!value.is_empty()).then(|| value.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        match key {
            "api_key" => self.api_key = text,
            "library_id" => self.library_id = text,
            "library_type" => {
                if let Some(t) = &text {
                    t.parse::<LibraryType>().map_err(invalid)?;
                }
                self.library_type = text;
            }
            "api_url" => {
                if let Some(url) = &text {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        return Err(invalid("must start with http:// or https://".to_string()));
                    }
                }
                self.api_url = text;
            }
            "mirror_path" => self.mirror_path = text.map(PathBuf::from),
            "ledger_path" => self.ledger_path = text.map(PathBuf::from),
            "timeout_secs" => {
                self.timeout_secs = match text {
                    Some(t) => Some(
                        t.parse::<u64>()
                            .ok()
                            .filter(|secs| *secs > 0)
                            .ok_or_else(|| invalid("expected a positive number of seconds".to_string()))?,
                    ),
                    None => None,
                }
            }
            "persona" => self.persona = text,
            "phase" => self.phase = text,
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Whether remote credentials are complete.
    pub fn has_remote(&self) -> bool {
        self.api_key.is_some() && self.library_id.is_some()
    }

    /// Selects the session backend.
    ///
    /// Exactly one of remote credentials or a mirror path must be usable.
    /// With both configured, `offline` picks the mirror; without it the
    /// choice is ambiguous and refused.
    pub fn backend(&self, offline: bool) -> Result<Backend, ConfigError> {
        let mirror = self.mirror_path.clone();

        if offline {
            return mirror
                .map(|path| Backend::Mirror { path })
                .ok_or(ConfigError::NoBackend);
        }

        match (self.has_remote(), mirror) {
            (true, Some(_)) => Err(ConfigError::AmbiguousBackend),
            (true, None) => self.remote_backend(),
            (false, Some(path)) => Ok(Backend::Mirror { path }),
            (false, None) => Err(ConfigError::NoBackend),
        }
    }

    fn remote_backend(&self) -> Result<Backend, ConfigError> {
        let (Some(api_key), Some(library_id)) = (&self.api_key, &self.library_id) else {
            return Err(ConfigError::NoBackend);
        };
        let library_type = match &self.library_type {
            Some(t) => t.parse().map_err(|message| ConfigError::InvalidValue {
                key: "library_type".to_string(),
                message,
            })?,
            None => LibraryType::default(),
        };
        Ok(Backend::Remote {
            api_key: api_key.clone(),
            library_id: library_id.clone(),
            library_type,
            api_url: self.api_url.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
        })
    }

    /// Path of the screening ledger, defaulting to the config directory.
    pub fn ledger_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.ledger_path {
            Some(path) => Ok(path.clone()),
            None => Ok(config_dir()?.join("screening_state.csv")),
        }
    }
}

fn config_dir() -> Result<PathBuf, ConfigError> {
    Ok(dirs::home_dir()
        .ok_or(ConfigError::NoHomeDirectory)?
        .join(CONFIG_DIR))
}

/// Masks a secret for display, keeping the last four characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}
