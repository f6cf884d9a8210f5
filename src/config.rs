//! Connection and board settings.
//!
//! With the `serde` feature the settings can be loaded from YAML:
//!
//! ```yaml
//! channels: 8
//! serial:
//!   port: /dev/ttyUSB0
//!   address: 1
//!   baud_rate: 9600
//!   timeout: 200ms
//!   close_port_after_each_call: false
//!   debug: false
//! ```
//!
//! Every key is optional and falls back to the defaults below.

use crate::protocol as proto;
use std::time::Duration;

/// Parameters of the serial Modbus-RTU link to one board.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerialConfig {
    /// Serial device, e.g. `/dev/ttyUSB0` (Linux), `/dev/tty.usbserial`
    /// (macOS) or `COM4` (Windows).
    #[cfg_attr(feature = "serde", serde(default = "default_port"))]
    pub port: String,

    /// Modbus slave address of the board.
    #[cfg_attr(feature = "serde", serde(default))]
    pub address: proto::Address,

    #[cfg_attr(feature = "serde", serde(default))]
    pub baud_rate: proto::BaudRate,

    /// Read timeout applied to every transaction.
    #[cfg_attr(
        feature = "serde",
        serde(default = "default_timeout", with = "humantime_serde")
    )]
    pub timeout: Duration,

    /// Open the port for every transaction and close it afterwards,
    /// instead of holding it open.
    #[cfg_attr(feature = "serde", serde(default))]
    pub close_port_after_each_call: bool,

    /// Log every request and response at debug level.
    #[cfg_attr(feature = "serde", serde(default))]
    pub debug: bool,
}

fn default_port() -> String {
    if cfg!(target_os = "windows") {
        String::from("COM1")
    } else {
        String::from("/dev/ttyUSB0")
    }
}

fn default_timeout() -> Duration {
    Duration::from_millis(200)
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            address: proto::Address::default(),
            baud_rate: proto::BaudRate::default(),
            timeout: default_timeout(),
            close_port_after_each_call: false,
            debug: false,
        }
    }
}

/// Everything needed to open a board.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelayBoardConfig {
    /// Number of relay channels on the board.
    #[cfg_attr(feature = "serde", serde(default))]
    pub channels: proto::Channels,

    #[cfg_attr(feature = "serde", serde(default))]
    pub serial: SerialConfig,
}

#[cfg(feature = "serde")]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(feature = "serde")]
impl RelayBoardConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_reader<R: std::io::Read>(reader: R) -> Result<Self, Error> {
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        log::debug!("Loading config file from {path:?}");
        let file = std::fs::File::open(path)?;
        Self::from_yaml_reader(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RelayBoardConfig::default();
        assert_eq!(config.channels.count(), 16);
        assert_eq!(*config.serial.address, 1);
        assert_eq!(config.serial.baud_rate, proto::BaudRate::DEFAULT);
        assert_eq!(config.serial.timeout, Duration::from_millis(200));
        assert!(!config.serial.close_port_after_each_call);
        assert!(!config.serial.debug);
    }

    #[cfg(feature = "serde")]
    mod yaml {
        use super::*;
        use assert_matches::assert_matches;

        #[test]
        fn full_document() {
            let config = RelayBoardConfig::from_yaml_str(
                r#"
channels: 8
serial:
  port: COM4
  address: 17
  baud_rate: 19200
  timeout: 1s 500ms
  close_port_after_each_call: true
  debug: true
"#,
            )
            .unwrap();
            assert_eq!(config.channels.count(), 8);
            assert_eq!(config.serial.port, "COM4");
            assert_eq!(*config.serial.address, 17);
            assert_eq!(*config.serial.baud_rate, 19200);
            assert_eq!(config.serial.timeout, Duration::from_millis(1500));
            assert!(config.serial.close_port_after_each_call);
            assert!(config.serial.debug);
        }

        #[test]
        fn missing_keys_use_defaults() {
            let config = RelayBoardConfig::from_yaml_str("serial:\n  address: 3\n").unwrap();
            assert_eq!(config.channels, proto::Channels::DEFAULT);
            assert_eq!(*config.serial.address, 3);
            assert_eq!(config.serial.timeout, Duration::from_millis(200));
        }

        #[test]
        fn out_of_range_values_are_rejected() {
            assert_matches!(
                RelayBoardConfig::from_yaml_str("serial:\n  address: 248\n"),
                Err(Error::Yaml(_))
            );
        }

        #[test]
        fn any_baud_rate_is_accepted() {
            for rate in [300, 14400, 230400] {
                let config =
                    RelayBoardConfig::from_yaml_str(&format!("serial:\n  baud_rate: {rate}\n"))
                        .unwrap();
                assert_eq!(*config.serial.baud_rate, rate);
            }
        }

        #[test]
        fn missing_file() {
            assert_matches!(
                RelayBoardConfig::from_file("/nonexistent/relay-board.yml"),
                Err(Error::Io(_))
            );
        }
    }
}
