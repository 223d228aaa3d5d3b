use super::backend::{PortHandle, SerialBackend};
use crate::domain::config::{Parity, SessionConfig, StopBits};
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// Serial backend over the platform's native serial API
#[derive(Debug, Clone)]
pub struct SystemBackend {
    timeout: Duration,
}

impl SystemBackend {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_millis(100),
        }
    }

    /// Set the read/write timeout applied to opened handles
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialBackend for SystemBackend {
    fn list_ports(&self) -> io::Result<Vec<String>> {
        let ports = serialport::available_ports().map_err(io::Error::from)?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    fn open(&self, config: &SessionConfig) -> io::Result<Box<dyn PortHandle>> {
        let data_bits = match config.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Invalid data bits: {}", other),
                ))
            }
        };

        let stop_bits = match config.stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
            StopBits::OnePointFive => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "1.5 stop bits are not supported by the native serial driver",
                ))
            }
        };

        let parity = match config.parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        };

        let port = serialport::new(&config.device, config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(serialport::FlowControl::None)
            .timeout(self.timeout)
            .open()
            .map_err(io::Error::from)?;

        info!("Serial port opened: {}", config);

        Ok(Box::new(SystemPort {
            name: config.device.clone(),
            port,
        }))
    }
}

/// Handle on a native serial port
struct SystemPort {
    name: String,
    port: Box<dyn SerialPort>,
}

impl PortHandle for SystemPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        let available = self.port.bytes_to_read().map_err(io::Error::from)?;
        Ok(available as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn discard_output(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Output).map_err(io::Error::from)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }

    fn release(self: Box<Self>) -> io::Result<()> {
        debug!("Releasing serial handle '{}'", self.name);
        drop(self.port);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> SessionConfig {
        // /dev/null is not a serial device
        SessionConfig::new("/dev/null", 9600)
    }

    #[test]
    fn test_open_fails_gracefully() {
        let backend = SystemBackend::new();
        assert!(backend.open(&create_test_config()).is_err());
    }

    #[test]
    fn test_invalid_data_bits_rejected_before_os_call() {
        let backend = SystemBackend::new();
        let config = create_test_config().data_bits(9);
        let err = backend.open(&config).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_timeout_follows_global_config() {
        let global = crate::domain::config::GlobalConfig {
            io_timeout_ms: 250,
            ..Default::default()
        };
        let backend = SystemBackend::new().with_timeout(global.io_timeout());
        assert_eq!(backend.timeout(), Duration::from_millis(250));
        assert_eq!(SystemBackend::default().timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_one_and_a_half_stop_bits_rejected() {
        let backend = SystemBackend::new();
        let config = create_test_config().stop_bits(StopBits::OnePointFive);
        let err = backend.open(&config).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
