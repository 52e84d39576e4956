use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no serial device configured (set serial.device or pass --device)")]
    MissingDevice,
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Path of the sensor's serial device, e.g. `/dev/ttyACM0`
    pub device: Option<String>,
    /// Longest silence tolerated from the sensor before giving up
    pub read_timeout_secs: u64,
    /// Pause after each command before listening for the response
    pub settle_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address for the HTTP server to listen on
    pub http_addr: SocketAddr,
    /// How long in-flight requests may run after shutdown starts
    pub shutdown_grace_secs: u64,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Check required settings before anything is opened or bound, returning
    /// the serial device to open.
    pub fn validate(&self) -> Result<&str, ConfigError> {
        self.serial.device()
    }
}

impl SerialConfig {
    pub fn device(&self) -> Result<&str, ConfigError> {
        match self.device.as_deref().map(str::trim) {
            Some(device) if !device.is_empty() => Ok(device),
            _ => Err(ConfigError::MissingDevice),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl ServerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: None,
            read_timeout_secs: 10,
            settle_delay_ms: 100,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            shutdown_grace_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config() {
        let config = Config::parse(
            r#"
            [serial]
            device = "/dev/ttyACM0"
            read_timeout_secs = 3
            settle_delay_ms = 250

            [server]
            http_addr = "0.0.0.0:9090"
            shutdown_grace_secs = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.serial.device().unwrap(), "/dev/ttyACM0");
        assert_eq!(config.serial.read_timeout(), Duration::from_secs(3));
        assert_eq!(config.serial.settle_delay(), Duration::from_millis(250));
        assert_eq!(config.server.http_addr.port(), 9090);
        assert_eq!(config.server.shutdown_grace(), Duration::from_secs(1));
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let config = Config::parse("[serial]\ndevice = \"/dev/ttyUSB0\"\n").unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.serial.read_timeout(), Duration::from_secs(10));
        assert_eq!(config.serial.settle_delay(), Duration::from_millis(100));
        assert_eq!(config.server.http_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.server.shutdown_grace(), Duration::from_secs(5));
    }

    #[test]
    fn missing_device_is_a_config_error() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingDevice)));

        let blank = Config::parse("[serial]\ndevice = \"  \"\n").unwrap();
        assert!(matches!(blank.validate(), Err(ConfigError::MissingDevice)));
    }

    #[test]
    fn bad_address_is_a_parse_error() {
        let err = Config::parse("[server]\nhttp_addr = \"localhost\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unreadable_file_names_the_path() {
        let err = Config::load(Path::new("/nonexistent/co2-bridge.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/co2-bridge.toml"));
    }
}
