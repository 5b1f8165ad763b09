//! Ownership of the connection to one PSU.
//!
//! A [Session] opens the port, switches the PSU to remote control and keeps the tunable
//! parameters. Closing, whether explicit, by reopening on another port, or by dropping the
//! session, returns the front panel to local control and releases the port.

use std::time::Duration;

use log::{debug, warn};

use crate::{
    error::{ConfigError, Error, Result},
    port::{PortError, SerialPortIo},
    psu::{DEFAULT_PACING_INTERVAL, DEFAULT_READ_TIMEOUT, GpdPsu},
    ramp::{RampConfig, validate_step},
    transport::LineTransport,
    types::BaudRate,
};

/// Opens the interface a [Session] talks through.
pub trait Connect {
    type Interface: embedded_io::Read + embedded_io::Write;

    fn connect(
        &mut self,
        port: &str,
        config: &SessionConfig,
    ) -> core::result::Result<Self::Interface, InterfaceError<Self>>;

    /// Bound how long a single read on an open interface may block.
    fn set_read_timeout(
        &mut self,
        interface: &mut Self::Interface,
        timeout: Duration,
    ) -> core::result::Result<(), InterfaceError<Self>>;
}

/// The error type of a connector's interface.
pub type InterfaceError<C> = <<C as Connect>::Interface as embedded_io::ErrorType>::Error;

/// Opens OS serial ports (8N1, no flow control) with the [serialport] crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl Connect for SerialConnector {
    type Interface = SerialPortIo;

    fn connect(
        &mut self,
        port: &str,
        config: &SessionConfig,
    ) -> core::result::Result<SerialPortIo, PortError> {
        let port = serialport::new(port, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .timeout(config.read_timeout)
            .open()?;
        Ok(SerialPortIo::new(port))
    }

    fn set_read_timeout(
        &mut self,
        interface: &mut SerialPortIo,
        timeout: Duration,
    ) -> core::result::Result<(), PortError> {
        interface.set_timeout(timeout)
    }
}

/// Connection and tuning parameters of a [Session].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Host side baud rate. Must match the PSU, see [BaudRate].
    pub baud_rate: u32,
    /// How long to wait for a response line.
    pub read_timeout: Duration,
    /// Delay between a query and its response, and between ramp steps.
    pub pacing_interval: Duration,
    /// Volts per ramp step.
    pub voltage_step: f64,
    /// Amps per ramp step.
    pub current_step: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            baud_rate: BaudRate::_9600.bits_per_second(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            pacing_interval: DEFAULT_PACING_INTERVAL,
            voltage_step: RampConfig::DEFAULT.step_size(),
            current_step: RampConfig::DEFAULT.step_size(),
        }
    }
}

impl SessionConfig {
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_pacing_interval(mut self, pacing_interval: Duration) -> Self {
        self.pacing_interval = pacing_interval;
        self
    }

    pub fn with_voltage_step(mut self, voltage_step: f64) -> Self {
        self.voltage_step = voltage_step;
        self
    }

    pub fn with_current_step(mut self, current_step: f64) -> Self {
        self.current_step = current_step;
        self
    }

    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        validate_step(self.voltage_step)?;
        validate_step(self.current_step)?;
        Ok(())
    }
}

/// An open (or closed) connection to one PSU.
///
/// Only one session should hold a given port. A session is not synchronised, share it between
/// threads behind a mutex.
pub struct Session<C: Connect = SerialConnector, const L: usize = 128> {
    connector: C,
    port: String,
    config: SessionConfig,
    psu: Option<GpdPsu<C::Interface, L>>,
}

impl Session<SerialConnector> {
    /// Open `port` with the default configuration.
    pub fn open_serial(port: &str) -> Result<Self, PortError> {
        Self::open_serial_with(port, SessionConfig::default())
    }

    pub fn open_serial_with(port: &str, config: SessionConfig) -> Result<Self, PortError> {
        Self::with_connector(SerialConnector, port, config)
    }
}

impl<C: Connect, const L: usize> Session<C, L> {
    /// Create a session and open it on `port`.
    pub fn with_connector(
        connector: C,
        port: &str,
        config: SessionConfig,
    ) -> Result<Self, InterfaceError<C>> {
        config.validate()?;
        let mut session = Self {
            connector,
            port: port.to_string(),
            config,
            psu: None,
        };
        session.connect()?;
        Ok(session)
    }

    /// Open `port`, closing any other port this session holds first.
    ///
    /// Does nothing if `port` is already open.
    pub fn open(&mut self, port: &str) -> Result<(), InterfaceError<C>> {
        if self.port != port {
            if let Err(e) = self.close() {
                warn!("Failed to hand back {} before reopening: {e}", self.port);
            }
            self.port = port.to_string();
        }
        self.connect()
    }

    fn connect(&mut self) -> Result<(), InterfaceError<C>> {
        if self.psu.is_some() {
            return Ok(());
        }
        debug!("Opening {} at {} baud", self.port, self.config.baud_rate);
        let interface = self
            .connector
            .connect(&self.port, &self.config)
            .map_err(Error::Serial)?;
        let transport = LineTransport::new(
            interface,
            self.config.pacing_interval,
            self.config.read_timeout,
        );
        let mut psu = GpdPsu::with_transport(transport);
        psu.set_voltage_step(self.config.voltage_step)?;
        psu.set_current_step(self.config.current_step)?;
        psu.remote()?;
        self.psu = Some(psu);
        Ok(())
    }

    /// Return the PSU to local control and close the port. Closing a closed session does nothing.
    ///
    /// The port is released even if handing back control fails.
    pub fn close(&mut self) -> Result<(), InterfaceError<C>> {
        let Some(mut psu) = self.psu.take() else {
            return Ok(());
        };
        debug!("Closing {}", self.port);
        let result = psu.local();
        drop(psu);
        result
    }

    pub fn is_open(&self) -> bool {
        self.psu.is_some()
    }

    /// Port name of the current (or last) connection.
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The connected PSU.
    pub fn psu(&mut self) -> Result<&mut GpdPsu<C::Interface, L>, InterfaceError<C>> {
        self.psu.as_mut().ok_or(Error::NotConnected)
    }

    /// Ramp all channels to 0V and disable the output. See [GpdPsu::shutdown_all_channels].
    pub fn shutdown_all_channels(&mut self) -> Result<(), InterfaceError<C>> {
        self.psu()?.shutdown_all_channels()
    }

    pub fn voltage_step(&self) -> f64 {
        self.config.voltage_step
    }

    pub fn set_voltage_step(&mut self, step: f64) -> Result<(), InterfaceError<C>> {
        validate_step(step)?;
        self.config.voltage_step = step;
        if let Some(psu) = self.psu.as_mut() {
            psu.set_voltage_step(step)?;
        }
        Ok(())
    }

    pub fn current_step(&self) -> f64 {
        self.config.current_step
    }

    pub fn set_current_step(&mut self, step: f64) -> Result<(), InterfaceError<C>> {
        validate_step(step)?;
        self.config.current_step = step;
        if let Some(psu) = self.psu.as_mut() {
            psu.set_current_step(step)?;
        }
        Ok(())
    }

    pub fn pacing_interval(&self) -> Duration {
        self.config.pacing_interval
    }

    pub fn set_pacing_interval(&mut self, interval: Duration) {
        self.config.pacing_interval = interval;
        if let Some(psu) = self.psu.as_mut() {
            psu.set_pacing_interval(interval);
        }
    }

    pub fn read_timeout(&self) -> Duration {
        self.config.read_timeout
    }

    /// Applies to the open port straight away, as well as to later opens.
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), InterfaceError<C>> {
        self.config.read_timeout = timeout;
        if let Some(psu) = self.psu.as_mut() {
            psu.set_read_timeout(timeout);
            self.connector
                .set_read_timeout(psu.transport_mut().interface_mut(), timeout)
                .map_err(Error::Serial)?;
        }
        Ok(())
    }

    pub fn baud_rate(&self) -> u32 {
        self.config.baud_rate
    }

    /// Host side baud rate, used from the next open.
    pub fn set_baud_rate(&mut self, baud_rate: u32) {
        self.config.baud_rate = baud_rate;
    }
}

impl<C: Connect, const L: usize> Drop for Session<C, L> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to hand back {} on drop: {e}", self.port);
        }
    }
}
