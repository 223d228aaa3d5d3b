use crate::domain::config::SessionConfig;
use std::io;

/// Access to the operating system's serial devices
pub trait SerialBackend: Send + Sync {
    /// List device identifiers in the order the OS reports them
    fn list_ports(&self) -> io::Result<Vec<String>>;

    /// Acquire a handle on `config.device` with the given line parameters
    fn open(&self, config: &SessionConfig) -> io::Result<Box<dyn PortHandle>>;
}

/// An open OS serial handle
pub trait PortHandle: Send {
    /// Device identifier this handle was opened on
    fn name(&self) -> &str;

    /// Number of received bytes waiting to be read
    fn bytes_to_read(&mut self) -> io::Result<usize>;

    /// Read into `buf`, returning the number of bytes copied
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write every byte of `data` in one operation
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Drop output that was buffered but not yet transmitted
    fn discard_output(&mut self) -> io::Result<()>;

    /// Drop input that was received but not yet read
    fn discard_input(&mut self) -> io::Result<()>;

    /// Release the OS handle
    fn release(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}
