//! Application settings

use crate::core::command::LineEnding;
use crate::core::framing::DEFAULT_MAX_LINE_LENGTH;
use crate::core::logger::LogFormat;
use crate::core::runtime::DEFAULT_POLL_INTERVAL;
use crate::core::session::SessionConfig;
use crate::core::transport::{SerialConfig, SerialParity, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No platform config directory
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// File could not be read or written
    #[error("Config I/O error on {}: {source}", path.display())]
    Io {
        /// Config file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        /// Config file
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },

    /// Config could not be rendered
    #[error("Could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial link settings
    pub serial: SerialSettings,
    /// Session behaviour
    pub session: SessionSettings,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load config from the platform config directory; defaults if absent
    pub fn load() -> Result<Self, ConfigError> {
        let path = super::config_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load config from `path`; defaults if the file does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_err)
    }

    /// Serial configuration, with optional command-line overrides
    pub fn serial_config(&self, port: Option<&str>, baud_rate: Option<u32>) -> Option<SerialConfig> {
        let port = port.or(self.serial.port.as_deref())?;
        Some(
            SerialConfig::new(port, baud_rate.unwrap_or(self.serial.baud_rate))
                .parity(self.serial.parity)
                .read_timeout(Duration::from_millis(self.serial.read_timeout_ms)),
        )
    }

    /// Session configuration
    pub fn session_config(&self, name: &str) -> SessionConfig {
        let mut config = SessionConfig::new(name);
        config.line_ending = self.session.line_ending;
        config.max_line_length = self.session.max_line_length;
        config
    }

    /// Poll period
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.session.poll_interval_ms.max(1))
    }
}

/// Serial link settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Default port
    pub port: Option<String>,
    /// Baud rate
    pub baud_rate: u32,
    /// Parity (none, odd, even)
    pub parity: SerialParity,
    /// Per-read timeout in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            parity: SerialParity::None,
            read_timeout_ms: u64::try_from(DEFAULT_READ_TIMEOUT.as_millis()).unwrap_or(1000),
        }
    }
}

/// Session behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Poll period in milliseconds
    pub poll_interval_ms: u64,
    /// Terminator appended to requests
    pub line_ending: LineEnding,
    /// Longest accepted device line in bytes
    pub max_line_length: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(100),
            line_ending: LineEnding::None,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (overridden by `RUST_LOG`)
    pub level: String,
    /// Directory for diagnostic logs and transcripts
    pub directory: Option<PathBuf>,
    /// Write diagnostics to a daily rolling file as well
    pub file_logging: bool,
    /// Record a transcript of every session
    pub transcript: bool,
    /// Transcript format
    pub transcript_format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: super::log_dir(),
            file_logging: false,
            transcript: false,
            transcript_format: LogFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.read_timeout_ms, 1000);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.session.line_ending, LineEnding::None);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[serial]\nport = \"/dev/ttyACM0\"\n\n[session]\nline_ending = \"lf\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.session.line_ending, LineEnding::Lf);
        assert_eq!(config.session_config("x").line_ending, LineEnding::Lf);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.serial.port = Some("COM5".into());
        config.session.poll_interval_ms = 250;
        config.save_to(&path).unwrap();

        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[serial]\nbaud_rate = \"fast\"\n").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_serial_overrides() {
        let mut config = AppConfig::default();
        assert!(config.serial_config(None, None).is_none());

        config.serial.port = Some("/dev/ttyUSB0".into());
        let serial = config.serial_config(None, Some(115_200)).unwrap();
        assert_eq!(serial.port, "/dev/ttyUSB0");
        assert_eq!(serial.baud_rate, 115_200);

        let serial = config.serial_config(Some("COM3"), None).unwrap();
        assert_eq!(serial.port, "COM3");
        assert_eq!(serial.baud_rate, 9600);
        assert_eq!(serial.parity, SerialParity::None);
    }

    #[test]
    fn test_parity_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[serial]\nport = \"COM3\"\nparity = \"even\"\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        let serial = config.serial_config(None, None).unwrap();
        assert_eq!(serial.parity, SerialParity::Even);
        assert_eq!(serial.read_timeout, Duration::from_secs(1));
    }
}
