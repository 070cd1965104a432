//! Transport abstraction
//!
//! The controller and reader only see [`Transport`]; a [`Connector`] turns a
//! [`LinkConfig`] into one. The serial implementations wrap `serialport`.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

use super::{
    serial::{clear_input, configure_port, open_port},
    LinkConfig, LinkError,
};

/// Byte channel to the board
pub trait Transport: Read + Write + Send {
    /// Number of bytes that can be read without blocking.
    ///
    /// Transports that cannot tell return `ErrorKind::Unsupported`.
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "available byte count not reported",
        ))
    }

    /// Discard anything received but not yet read
    fn clear_input_buffer(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Set the timeout for subsequent read/write calls
    fn set_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }
}

/// Opens transports for connection attempts
pub trait Connector: Send {
    fn open(&self, config: &LinkConfig) -> Result<Box<dyn Transport>, LinkError>;
}

/// Serial port wrapper implementing [`Transport`]
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Transport for SerialTransport {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.port.bytes_to_read().map_err(io::Error::other)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        clear_input(self.port.as_mut()).map_err(io::Error::other)
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(io::Error::other)
    }
}

/// Opens real serial ports
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn open(&self, config: &LinkConfig) -> Result<Box<dyn Transport>, LinkError> {
        let mut port = open_port(config)?;
        configure_port(port.as_mut())?;
        Ok(Box::new(SerialTransport::new(port)))
    }
}
