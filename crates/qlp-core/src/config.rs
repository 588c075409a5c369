//! Configuration: defaults, then a TOML file, then `QLP_*` environment
//! variables. Command-line flags are applied on top by the binary.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::device::state::DEFAULT_DEVICE_NAME;
use crate::protocol::layout;

/// Longest accepted idle sleep between polls.
pub const MAX_POLL_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value {value:?} for {key}: {reason}")]
    Env {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid device id {0:?}: expected up to 8 hex digits")]
    DeviceId(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    /// Local address to bind (default 0.0.0.0).
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    /// Service port, used both to listen and as the reply port (default 52075).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Reply destination (default 255.255.255.255).
    #[serde(default = "default_broadcast")]
    pub broadcast: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Hex device id. Generated at startup when absent.
    #[serde(default, deserialize_with = "deserialize_device_id")]
    pub id: Option<u32>,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_strip_length")]
    pub strip_length: u16,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}
fn default_port() -> u16 {
    layout::SERVICE_PORT
}
fn default_broadcast() -> Ipv4Addr {
    Ipv4Addr::BROADCAST
}
fn default_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}
fn default_strip_length() -> u16 {
    1
}
fn default_poll_interval_ms() -> u64 {
    10
}
fn default_level() -> String {
    "info".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            broadcast: default_broadcast(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: None,
            name: default_name(),
            strip_length: default_strip_length(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn deserialize_device_id<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|value| parse_device_id(&value).map_err(serde::de::Error::custom))
        .transpose()
}

/// Parse a device id written as up to eight hex digits, with an optional
/// `0x` prefix.
///
/// # Examples
/// ```
/// use qlp_core::config::parse_device_id;
///
/// assert_eq!(parse_device_id("0BADCAFE").unwrap(), 0x0BAD_CAFE);
/// assert_eq!(parse_device_id("0x2a").unwrap(), 0x2A);
/// assert!(parse_device_id("123456789").is_err());
/// ```
pub fn parse_device_id(value: &str) -> Result<u32, ConfigError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if digits.is_empty() || digits.len() > 8 {
        return Err(ConfigError::DeviceId(value.to_string()));
    }
    u32::from_str_radix(digits, 16).map_err(|_| ConfigError::DeviceId(value.to_string()))
}

/// Candidate files, first existing one wins.
pub fn search_paths() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        out.push(PathBuf::from(home).join(".config/qlp/config.toml"));
    }
    out.push(PathBuf::from("/etc/qlp/config.toml"));
    out
}

impl Config {
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an explicit file, which must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Load the first existing file of `paths`, or defaults when none exists.
    /// A file that exists but does not parse is an error.
    pub fn load_first(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        match paths.iter().find(|path| path.exists()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Apply `QLP_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("QLP_PORT") {
            self.network.port = parse_env("QLP_PORT", value)?;
        }
        if let Some(value) = lookup("QLP_DEVICE_ID") {
            self.device.id = Some(parse_device_id(&value)?);
        }
        if let Some(value) = lookup("QLP_DEVICE_NAME") {
            self.device.name = value;
        }
        if let Some(value) = lookup("QLP_STRIP_LENGTH") {
            self.device.strip_length = parse_env("QLP_STRIP_LENGTH", value)?;
        }
        if let Some(value) = lookup("QLP_LOG_LEVEL") {
            self.logging.level = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.port == 0 {
            return Err(ConfigError::Invalid("network.port must be non-zero".into()));
        }
        let name = &self.device.name;
        if name.is_empty() {
            return Err(ConfigError::Invalid("device.name must not be empty".into()));
        }
        if !name.is_ascii() || name.chars().any(|c| c.is_ascii_control()) {
            return Err(ConfigError::Invalid(format!(
                "device.name {name:?} must be printable ASCII"
            )));
        }
        if self.device.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "device.poll_interval_ms must be at most {MAX_POLL_INTERVAL_MS}"
            )));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.network.bind, self.network.port)
    }

    /// Where replies and controller requests are sent.
    pub fn broadcast_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.network.broadcast), self.network.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.device.poll_interval_ms)
    }

    /// The configured id, or a fresh random one.
    pub fn resolve_device_id<R: RngCore>(&self, rng: &mut R) -> u32 {
        self.device.id.unwrap_or_else(|| rng.next_u32())
    }
}

fn parse_env<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err: T::Err| ConfigError::Env {
        key,
        reason: err.to_string(),
        value,
    })
}
