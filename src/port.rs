//! Adapter from a [`serialport::SerialPort`] to the [embedded_io] traits the driver is written
//! against.

use std::time::Duration;

use serialport::SerialPort;

/// An open OS serial port. The port is closed when this is dropped.
pub struct SerialPortIo(Box<dyn SerialPort>);

impl SerialPortIo {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self(port)
    }

    /// How long a single read blocks before failing with [embedded_io::ErrorKind::TimedOut].
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.0.set_timeout(timeout).map_err(PortError::from)
    }
}

/// [`std::io::Error`] wrapped so it can implement [embedded_io::Error].
#[derive(Debug)]
pub struct PortError(pub std::io::Error);

impl core::fmt::Display for PortError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for PortError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<serialport::Error> for PortError {
    fn from(err: serialport::Error) -> Self {
        PortError(err.into())
    }
}

impl embedded_io::Error for PortError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::NotConnected => embedded_io::ErrorKind::NotConnected,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::AlreadyExists => embedded_io::ErrorKind::AlreadyExists,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            std::io::ErrorKind::OutOfMemory => embedded_io::ErrorKind::OutOfMemory,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for SerialPortIo {
    type Error = PortError;
}

impl embedded_io::Read for SerialPortIo {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(PortError)
    }
}

impl embedded_io::Write for SerialPortIo {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(PortError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(PortError)
    }
}
