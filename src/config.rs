//! Configuration file support for Keyboard Debounce
//!
//! Settings can live in a TOML file so a long list of keys does not have to
//! be repeated on every start. Command-line flags are applied on top.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/keyboard-debounce/config.toml` |
//! | macOS | `~/Library/Application Support/keyboard-debounce/config.toml` |
//! | Windows | `%APPDATA%\keyboard-debounce\config.toml` |
//!
//! ## Example
//!
//! ```toml
//! [debounce]
//! all_keys = false
//! default_ms = 40
//! keys = ["n", "j:60"]
//!
//! [output]
//! log_drops = true
//! ```

use crate::debounce::{DebouncePolicy, PolicyBuilder, DEFAULT_DURATION};
use crate::keyboard::{KeyCode, UnknownKeyName};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to determine config directory
    #[error("Could not determine config directory")]
    NoConfigDir,
    /// IO error reading or writing config file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Failed to parse config file
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to serialize config
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// A `keys` entry did not parse
    #[error("Invalid key entry: {0}")]
    Key(#[from] KeySpecError),
    /// A 0 ms override cannot be written while the default is not 0 ms,
    /// because `NAME:0` reads back as "use the default"
    #[error("{key} uses a 0 ms window, which a config file can only express when default_ms is 0 (it is {default_ms})")]
    ZeroOverride { key: String, default_ms: u64 },
}

/// Error for a single `NAME[:MS]` entry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeySpecError {
    #[error(transparent)]
    UnknownKey(#[from] UnknownKeyName),
    #[error("invalid duration '{0}', expected a whole number of milliseconds")]
    InvalidDuration(String),
}

/// A key to debounce, optionally with its own duration.
///
/// Written as `NAME` or `NAME:MS`. A duration of zero or less means "use the
/// default".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyOverride {
    pub key: KeyCode,
    pub duration: Option<Duration>,
}

impl FromStr for KeyOverride {
    type Err = KeySpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, duration) = match s.split_once(':') {
            Some((name, ms)) => {
                let ms: i64 = ms
                    .trim()
                    .parse()
                    .map_err(|_| KeySpecError::InvalidDuration(ms.to_string()))?;
                let duration = (ms > 0).then(|| Duration::from_millis(ms as u64));
                (name, duration)
            }
            None => (s, None),
        };
        let key = name.parse::<KeyCode>()?;
        Ok(Self { key, duration })
    }
}

impl fmt::Display for KeyOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key.name() {
            Some(name) => f.write_str(name)?,
            None => write!(f, "#{}", self.key.as_u16())?,
        }
        if let Some(duration) = self.duration {
            write!(f, ":{}", duration.as_millis())?;
        }
        Ok(())
    }
}

/// Returns the path to the default config file.
///
/// # Platform-specific paths
///
/// - Linux: `~/.config/keyboard-debounce/config.toml`
/// - macOS: `~/Library/Application Support/keyboard-debounce/config.toml`
/// - Windows: `%APPDATA%\keyboard-debounce\config.toml`
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(config_dir.join("keyboard-debounce").join("config.toml"))
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Which keys to debounce
    #[serde(default)]
    pub debounce: DebounceConfig,
    /// What to print while running
    #[serde(default)]
    pub output: OutputConfig,
}

/// Debounce settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebounceConfig {
    /// Apply the default duration to every key
    pub all_keys: bool,
    /// Default release-to-press window in milliseconds
    pub default_ms: u64,
    /// Per-key overrides as `NAME` or `NAME:MS`
    pub keys: Vec<String>,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            all_keys: false,
            default_ms: DEFAULT_DURATION.as_millis() as u64,
            keys: Vec::new(),
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Print a line for every suppressed press
    pub log_drops: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { log_drops: true }
    }
}

impl Config {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Parse the `keys` list
    pub fn key_overrides(&self) -> Result<Vec<KeyOverride>, KeySpecError> {
        self.debounce.keys.iter().map(|k| k.parse()).collect()
    }

    /// Start a policy from this file's settings, keys registered in file order
    pub fn policy_builder(&self) -> Result<PolicyBuilder, ConfigError> {
        let mut builder = PolicyBuilder::new();
        builder
            .apply_to_all(self.debounce.all_keys)
            .set_default(Duration::from_millis(self.debounce.default_ms));
        for entry in self.key_overrides()? {
            builder.add_key(entry.key, entry.duration);
        }
        Ok(builder)
    }

    /// Config that reproduces a resolved policy exactly.
    ///
    /// Fails for a key resolved to 0 ms under a non-zero default, since
    /// reloading would hand that key the default instead.
    pub fn from_policy(policy: &DebouncePolicy, log_drops: bool) -> Result<Self, ConfigError> {
        let default_ms = policy.default_duration().as_millis() as u64;
        let keys = policy
            .overrides()
            .into_iter()
            .map(|(key, duration)| {
                let entry = KeyOverride {
                    key,
                    duration: Some(duration),
                };
                if duration.is_zero() && default_ms != 0 {
                    return Err(ConfigError::ZeroOverride {
                        key: entry.to_string(),
                        default_ms,
                    });
                }
                Ok(entry.to_string())
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            debounce: DebounceConfig {
                all_keys: policy.applies_to_all(),
                default_ms,
                keys,
            },
            output: OutputConfig { log_drops },
        })
    }
}
