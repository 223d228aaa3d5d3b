use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// SerialTerm configuration file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerialTermConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// Defaults applied to new sessions
    #[serde(default)]
    pub serial: SerialDefaults,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Receive pump polling period in milliseconds
    #[serde(default = "default_receive_poll")]
    pub receive_poll_ms: u64,
    /// Hot-plug polling period in milliseconds
    #[serde(default = "default_hotplug_poll")]
    pub hotplug_poll_ms: u64,
    /// Read/write timeout of native serial handles in milliseconds
    #[serde(default = "default_io_timeout")]
    pub io_timeout_ms: u64,
}

/// Default serial parameters used when the operator does not pick them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialDefaults {
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default)]
    pub stop_bits: StopBits,
}

/// Parameters of a single serial session
///
/// Nothing here is validated up front; the OS open call is the only judge of
/// whether a combination is acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Device identifier, e.g. `COM3` or `/dev/ttyUSB0`
    pub device: String,
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: u8,
    pub stop_bits: StopBits,
}

/// Parity configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Stop bits configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopBits {
    #[default]
    #[serde(rename = "1")]
    One,
    #[serde(rename = "1.5")]
    OnePointFive,
    #[serde(rename = "2")]
    Two,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_receive_poll() -> u64 {
    10
}

fn default_hotplug_poll() -> u64 {
    1000
}

fn default_io_timeout() -> u64 {
    100
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            receive_poll_ms: default_receive_poll(),
            hotplug_poll_ms: default_hotplug_poll(),
            io_timeout_ms: default_io_timeout(),
        }
    }
}

impl GlobalConfig {
    pub fn receive_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receive_poll_ms.max(1))
    }

    pub fn hotplug_poll_interval(&self) -> Duration {
        Duration::from_millis(self.hotplug_poll_ms.max(1))
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

impl Default for SerialDefaults {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
        }
    }
}

impl SerialDefaults {
    /// Build a session configuration for `device` from these defaults
    pub fn session_for(&self, device: impl Into<String>) -> SessionConfig {
        SessionConfig {
            device: device.into(),
            baud_rate: self.baud_rate,
            parity: self.parity,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
        }
    }
}

impl SessionConfig {
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        SerialDefaults {
            baud_rate,
            ..SerialDefaults::default()
        }
        .session_for(device)
    }

    #[must_use]
    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    #[must_use]
    pub fn data_bits(mut self, data_bits: u8) -> Self {
        self.data_bits = data_bits;
        self
    }

    #[must_use]
    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }
}

impl fmt::Display for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} {}{}{}",
            self.device,
            self.baud_rate,
            self.data_bits,
            self.parity.short_name(),
            self.stop_bits
        )
    }
}

impl Parity {
    fn short_name(&self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        }
    }
}

impl FromStr for Parity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "n" => Ok(Parity::None),
            "odd" | "o" => Ok(Parity::Odd),
            "even" | "e" => Ok(Parity::Even),
            other => Err(format!("unknown parity '{}'", other)),
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parity::None => write!(f, "none"),
            Parity::Odd => write!(f, "odd"),
            Parity::Even => write!(f, "even"),
        }
    }
}

impl FromStr for StopBits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(StopBits::One),
            "1.5" => Ok(StopBits::OnePointFive),
            "2" => Ok(StopBits::Two),
            other => Err(format!("unsupported stop bits '{}'", other)),
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopBits::One => write!(f, "1"),
            StopBits::OnePointFive => write!(f, "1.5"),
            StopBits::Two => write!(f, "2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = SerialTermConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: SerialTermConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.serial.baud_rate, 9600);
        assert_eq!(deserialized.global.receive_poll_ms, 10);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SerialTermConfig = toml::from_str(
            r#"
            [serial]
            baud_rate = 115200
            parity = "even"
            stop_bits = "1.5"
            "#,
        )
        .unwrap();

        assert_eq!(config.global.log_level, "info");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.serial.data_bits, 8);
        assert_eq!(config.serial.parity, Parity::Even);
        assert_eq!(config.serial.stop_bits, StopBits::OnePointFive);
    }

    #[test]
    fn test_session_for_device() {
        let session = SerialDefaults::default().session_for("COM3");
        assert_eq!(session, SessionConfig::new("COM3", 9600));
        assert_eq!(session.to_string(), "COM3 @ 9600 8N1");
    }

    #[test]
    fn test_parity_parsing() {
        assert_eq!("None".parse::<Parity>().unwrap(), Parity::None);
        assert_eq!("o".parse::<Parity>().unwrap(), Parity::Odd);
        assert_eq!("EVEN".parse::<Parity>().unwrap(), Parity::Even);
        assert!("mark".parse::<Parity>().is_err());
    }

    #[test]
    fn test_stop_bits_parsing() {
        assert_eq!("1".parse::<StopBits>().unwrap(), StopBits::One);
        assert_eq!("1.5".parse::<StopBits>().unwrap(), StopBits::OnePointFive);
        assert_eq!(" 2 ".parse::<StopBits>().unwrap(), StopBits::Two);
        assert!("3".parse::<StopBits>().is_err());
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let global = GlobalConfig {
            receive_poll_ms: 0,
            ..GlobalConfig::default()
        };
        assert_eq!(global.receive_poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_io_timeout_from_config() {
        assert_eq!(GlobalConfig::default().io_timeout(), Duration::from_millis(100));

        let config: SerialTermConfig = toml::from_str("[global]\nio_timeout_ms = 250\n").unwrap();
        assert_eq!(config.global.io_timeout(), Duration::from_millis(250));
        assert_eq!(config.global.hotplug_poll_ms, 1000);
    }
}
