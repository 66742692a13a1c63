//! Runtime configuration loaded from a TOML file
//!
//! Every field carries a default, so a partial file (or no file at all) is a valid
//! configuration. The file is looked up at `$JOYGRBL_CONFIG` first and falls back to
//! `<config dir>/joygrbl/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "joygrbl";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_ENV: &str = "JOYGRBL_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub serial: SerialConfig,
    pub joystick: JoystickConfig,
}

/// Serial link to the GRBL controller
///
/// Only the device path is configurable; line settings are fixed in [`crate::grbl::transport`].
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SerialConfig {
    pub path: String,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyACM0".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct JoystickConfig {
    /// Position of the gamepad in the list of connected devices
    pub index: usize,

    /// Analog deadzone as a fraction of full scale (0.0-1.0)
    pub deadzone: f32,

    /// How long a single device poll may block before the sampler rechecks for shutdown
    pub poll_interval_ms: u64,
}

impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            index: 0,
            deadzone: 0.05,
            poll_interval_ms: 50,
        }
    }
}

impl JoystickConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl AppConfig {
    /// Loads the configuration from the default location
    ///
    /// A missing file is not an error: defaults are used and a warning is logged.
    pub async fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        Self::load_from(&path).await
    }

    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::ReadError {
                path: path.to_path_buf(),
                source,
            })?;

        if !exists {
            warn!(
                "Config file {} does not exist, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::ReadError {
                    path: path.to_path_buf(),
                    source,
                })?;

        let config = Self::parse(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        info!("Loaded configuration from {}", path.display());
        debug!("Configuration: {:?}", config);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "serial.path must not be empty".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.joystick.deadzone) {
            return Err(ConfigError::ValidationError(format!(
                "joystick.deadzone must be in [0.0, 1.0), got {}",
                self.joystick.deadzone
            )));
        }
        if self.joystick.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "joystick.poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies command-line overrides; currently only the serial device path
    pub fn apply_args<I>(&mut self, mut args: I)
    where
        I: Iterator<Item = String>,
    {
        if let Some(path) = args.next() {
            info!("Serial path overridden from command line: {}", path);
            self.serial.path = path;
        }
    }

    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }

        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.serial.path, "/dev/ttyACM0");
        assert_eq!(config.joystick.index, 0);
        assert_eq!(config.joystick.poll_interval(), Duration::from_millis(50));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = AppConfig::parse(
            r#"
            [serial]
            path = "/dev/ttyUSB1"

            [joystick]
            index = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.serial.path, "/dev/ttyUSB1");
        assert_eq!(config.joystick.index, 2);
        assert_eq!(config.joystick.poll_interval_ms, 50);
    }

    #[test]
    fn malformed_file_is_rejected() {
        assert!(AppConfig::parse("[serial\npath = ").is_err());
        assert!(AppConfig::parse("[serial]\npath = 5").is_err());
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.joystick.deadzone = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = AppConfig::default();
        config.joystick.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.serial.path = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn line_settings_in_the_file_are_not_honored() {
        // Older files may still carry these keys; they are accepted and have no effect
        let config = AppConfig::parse(
            r#"
            [serial]
            path = "/dev/ttyUSB0"
            baud_rate = 9600
            read_timeout_ms = 10
            "#,
        )
        .unwrap();

        assert_eq!(
            config.serial,
            SerialConfig {
                path: "/dev/ttyUSB0".to_string()
            }
        );
    }

    #[test]
    fn first_argument_overrides_serial_path() {
        let mut config = AppConfig::default();
        config.apply_args(vec!["/dev/ttyACM3".to_string()].into_iter());
        assert_eq!(config.serial.path, "/dev/ttyACM3");

        let mut config = AppConfig::default();
        config.apply_args(std::iter::empty());
        assert_eq!(config.serial.path, "/dev/ttyACM0");
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("joygrbl-test-does-not-exist/config.toml");
        let config = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn file_on_disk_is_loaded() {
        let dir = std::env::temp_dir().join(format!("joygrbl-config-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("config.toml");
        tokio::fs::write(&path, "[serial]\npath = \"/dev/ttyUSB2\"\n")
            .await
            .unwrap();

        let config = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(config.serial.path, "/dev/ttyUSB2");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
