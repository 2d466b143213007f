//! Engine configuration.
//!
//! [`EngineConfig`] is the full set of options a session is created from.
//! The demo binary can layer CLI flags over a TOML file; the library
//! builder fills one in directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::defaults;

/// Configuration errors surfaced while loading or parsing options.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid device selector '{value}': {message}")]
    InvalidDevice { value: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Compute device selector.
///
/// Grammar: `best | cpu[:threads] | gpu[:index]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Device {
    /// Let the engine pick.
    Best,
    /// CPU, optionally pinned to a thread count.
    Cpu { threads: Option<usize> },
    /// GPU, optionally a specific adapter index.
    Gpu { index: Option<usize> },
}

impl Default for Device {
    fn default() -> Self {
        Device::Best
    }
}

impl FromStr for Device {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| ConfigError::InvalidDevice {
            value: s.to_string(),
            message: message.to_string(),
        };

        let (head, arg) = match s.split_once(':') {
            Some((head, arg)) => (head, Some(arg)),
            None => (s, None),
        };

        match head {
            "best" => {
                if arg.is_some() {
                    return Err(invalid("'best' takes no argument"));
                }
                Ok(Device::Best)
            }
            "cpu" => {
                let threads = match arg {
                    None => None,
                    Some(a) => Some(
                        a.parse::<usize>()
                            .ok()
                            .filter(|&n| n > 0)
                            .ok_or_else(|| invalid("thread count must be a positive integer"))?,
                    ),
                };
                Ok(Device::Cpu { threads })
            }
            "gpu" => {
                let index = match arg {
                    None => None,
                    Some(a) => Some(
                        a.parse::<usize>()
                            .map_err(|_| invalid("gpu index must be a non-negative integer"))?,
                    ),
                };
                Ok(Device::Gpu { index })
            }
            _ => Err(invalid("expected 'best', 'cpu[:threads]' or 'gpu[:index]'")),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Best => write!(f, "best"),
            Device::Cpu { threads: None } => write!(f, "cpu"),
            Device::Cpu { threads: Some(n) } => write!(f, "cpu:{}", n),
            Device::Gpu { index: None } => write!(f, "gpu"),
            Device::Gpu { index: Some(i) } => write!(f, "gpu:{}", i),
        }
    }
}

impl TryFrom<String> for Device {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}

/// Full session configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Authorization key. Required, non-empty.
    pub access_key: String,
    /// Path to the model parameter file. Required, must exist.
    pub model_path: PathBuf,
    /// Compute device selector.
    pub device: Device,
    /// Trailing non-speech duration that declares an endpoint, in seconds.
    /// `None` disables endpoint detection entirely.
    pub endpoint_duration_sec: Option<f32>,
    /// Run the punctuation pass over finalized transcripts.
    pub enable_automatic_punctuation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            model_path: PathBuf::new(),
            device: Device::Best,
            endpoint_duration_sec: Some(defaults::ENDPOINT_DURATION_SEC),
            enable_automatic_punctuation: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// Missing fields fall back to defaults; invalid TOML is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or defaults if the file is missing.
    ///
    /// Only a missing file yields defaults; invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }
}
