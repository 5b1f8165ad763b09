use std::time::Duration;

use log::debug;

use crate::{
    command::{self, Command, Identity, StatusFlags},
    error::{ConfigError, Error, Result},
    ramp::{RampConfig, validate_step},
    transport::LineTransport,
    types::{BaudRate, Channel, MemorySlot, ModelFamily, Quantity, State, TrackingMode},
};

/// Default delay between a query and reading its response, and between ramp steps.
pub const DEFAULT_PACING_INTERVAL: Duration = Duration::from_millis(50);

/// Default time to wait for a response line.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// You can create a GpdPsu using any interface which implements [embedded_io::Read] & [embedded_io::Write].
///
/// For it's methods, we generally use the nomenclature that "set" means to write a configuration and "get" means to read
/// back a configuration value. Where as "read" means to get a measured value.
///
/// Setpoints are in volts and amps, and are sent with 3 decimal places.
pub struct GpdPsu<S: embedded_io::Read + embedded_io::Write, const L: usize = 128> {
    transport: LineTransport<S, L>,
    voltage_ramp: RampConfig,
    current_ramp: RampConfig,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> GpdPsu<S, L> {
    /// Create a new GpdPsu with default pacing, read timeout and ramp step sizes.
    pub fn new(interface: S) -> Self {
        Self::with_transport(LineTransport::new(
            interface,
            DEFAULT_PACING_INTERVAL,
            DEFAULT_READ_TIMEOUT,
        ))
    }

    pub fn with_transport(transport: LineTransport<S, L>) -> Self {
        let pacing = transport.pacing_interval();
        let mut ramp = RampConfig::DEFAULT;
        ramp.set_pacing_interval(pacing);
        Self {
            transport,
            voltage_ramp: ramp,
            current_ramp: ramp,
        }
    }

    pub fn transport(&self) -> &LineTransport<S, L> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut LineTransport<S, L> {
        &mut self.transport
    }

    /// Release the underlying interface.
    pub fn into_inner(self) -> S {
        self.transport.into_inner()
    }

    /// Voltage change per ramp step, in volts.
    pub fn voltage_step(&self) -> f64 {
        self.voltage_ramp.step_size()
    }

    pub fn set_voltage_step(&mut self, step: f64) -> Result<(), S::Error> {
        self.voltage_ramp.set_step_size(step)?;
        Ok(())
    }

    /// Current change per ramp step, in amps.
    pub fn current_step(&self) -> f64 {
        self.current_ramp.step_size()
    }

    pub fn set_current_step(&mut self, step: f64) -> Result<(), S::Error> {
        self.current_ramp.set_step_size(step)?;
        Ok(())
    }

    /// The interval used both between ramp steps and between a query and its response.
    pub fn pacing_interval(&self) -> Duration {
        self.transport.pacing_interval()
    }

    pub fn set_pacing_interval(&mut self, interval: Duration) {
        self.transport.set_pacing_interval(interval);
        self.voltage_ramp.set_pacing_interval(interval);
        self.current_ramp.set_pacing_interval(interval);
    }

    pub fn read_timeout(&self) -> Duration {
        self.transport.read_timeout()
    }

    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.transport.set_read_timeout(timeout);
    }

    pub fn ramp_config(&self, quantity: Quantity) -> &RampConfig {
        match quantity {
            Quantity::Voltage => &self.voltage_ramp,
            Quantity::Current => &self.current_ramp,
        }
    }

    /// Replace the ramp configuration of one quantity, e.g. to pace voltage and current ramps differently.
    pub fn set_ramp_config(&mut self, quantity: Quantity, config: RampConfig) -> Result<(), S::Error> {
        validate_step(config.step_size())?;
        match quantity {
            Quantity::Voltage => self.voltage_ramp = config,
            Quantity::Current => self.current_ramp = config,
        }
        Ok(())
    }

    /// Set a voltage or current setpoint immediately.
    pub fn set_setpoint(&mut self, quantity: Quantity, channel: Channel, value: f64) -> Result<(), S::Error> {
        if !value.is_finite() {
            return Err(ConfigError::NonFiniteSetpoint(value).into());
        }
        self.send(Command::SetSetpoint(quantity, channel, value))
    }

    /// Get a voltage or current setpoint.
    pub fn get_setpoint(&mut self, quantity: Quantity, channel: Channel) -> Result<f64, S::Error> {
        self.query_number(Command::GetSetpoint(quantity, channel))
    }

    /// Set the output voltage of a channel in one step. See [Self::ramp_voltage] to change it gradually.
    pub fn set_voltage(&mut self, channel: Channel, volts: f64) -> Result<(), S::Error> {
        self.set_setpoint(Quantity::Voltage, channel, volts)
    }

    /// Set the current limit of a channel in one step. See [Self::ramp_current] to change it gradually.
    pub fn set_current(&mut self, channel: Channel, amps: f64) -> Result<(), S::Error> {
        self.set_setpoint(Quantity::Current, channel, amps)
    }

    /// Get the target voltage of a channel, in volts.
    pub fn get_voltage_setpoint(&mut self, channel: Channel) -> Result<f64, S::Error> {
        self.get_setpoint(Quantity::Voltage, channel)
    }

    /// Get the current limit of a channel, in amps.
    pub fn get_current_setpoint(&mut self, channel: Channel) -> Result<f64, S::Error> {
        self.get_setpoint(Quantity::Current, channel)
    }

    /// Return the measured output voltage in volts.
    pub fn read_output_voltage(&mut self, channel: Channel) -> Result<f64, S::Error> {
        self.query_number(Command::GetOutput(Quantity::Voltage, channel))
    }

    /// Return the measured output current in amps.
    pub fn read_output_current(&mut self, channel: Channel) -> Result<f64, S::Error> {
        self.query_number(Command::GetOutput(Quantity::Current, channel))
    }

    /// Enable/disable the output. This switches all channels together.
    pub fn set_output_state(&mut self, state: impl Into<State>) -> Result<(), S::Error> {
        self.send(Command::Output(state.into()))
    }

    /// Enable the output.
    pub fn on(&mut self) -> Result<(), S::Error> {
        self.set_output_state(State::On)
    }

    /// Disable the output.
    pub fn off(&mut self) -> Result<(), S::Error> {
        self.set_output_state(State::Off)
    }

    /// Read the full status word.
    pub fn get_status(&mut self) -> Result<StatusFlags, S::Error> {
        let response = self.query(Command::Status)?;
        StatusFlags::decode(&response).ok_or(Error::InvalidResponse(response))
    }

    /// Read whether the output is enabled or disabled.
    pub fn get_output_state(&mut self) -> Result<State, S::Error> {
        Ok(self.get_status()?.output())
    }

    /// Select independent, series or parallel operation of CH1 and CH2.
    pub fn set_tracking_mode(&mut self, mode: TrackingMode) -> Result<(), S::Error> {
        self.send(Command::Track(mode))
    }

    /// Enable/disable the beeper.
    pub fn set_beep(&mut self, state: impl Into<State>) -> Result<(), S::Error> {
        self.send(Command::Beep(state.into()))
    }

    /// Read the `*IDN?` identification.
    pub fn identify(&mut self) -> Result<Identity, S::Error> {
        Ok(Identity::new(self.query(Command::Identify)?))
    }

    /// Identify the PSU and look up its model family.
    pub fn get_model_family(&mut self) -> Result<ModelFamily, S::Error> {
        let identity = self.identify()?;
        identity
            .family()
            .ok_or_else(|| Error::UnknownModel(identity.as_str().to_string()))
    }

    /// Recall settings previously saved to a memory slot.
    pub fn recall(&mut self, slot: MemorySlot) -> Result<(), S::Error> {
        self.send(Command::Recall(slot))
    }

    /// Save the current settings to a memory slot.
    pub fn save(&mut self, slot: MemorySlot) -> Result<(), S::Error> {
        self.send(Command::Save(slot))
    }

    /// Sets the baud rate on the PSU.
    ///
    /// The host side port keeps its rate, so it needs reopening at the new rate afterwards.
    pub fn set_baud_rate(&mut self, baud_rate: BaudRate) -> Result<(), S::Error> {
        self.send(Command::Baud(baud_rate))
    }

    /// Hand control back to the front panel.
    pub fn local(&mut self) -> Result<(), S::Error> {
        self.send(Command::Local)
    }

    /// Take remote control, locking the front panel.
    pub fn remote(&mut self) -> Result<(), S::Error> {
        self.send(Command::Remote)
    }

    /// Read the last error message from the PSU.
    pub fn get_error(&mut self) -> Result<String, S::Error> {
        self.query(Command::Error)
    }

    /// Read the command summary.
    pub fn help(&mut self) -> Result<String, S::Error> {
        self.query(Command::Help)
    }

    /// Move a voltage or current setpoint to `target` without jumping.
    ///
    /// If the output is enabled, the present setpoint is read back and the setpoint is walked towards
    /// the target one step at a time, pausing the ramp's pacing interval after each step. With the
    /// output disabled there is no load to protect and the target is set directly.
    ///
    /// Either way this finishes with one set at exactly `target`. The output state is only checked once,
    /// at the start.
    pub fn ramp(&mut self, quantity: Quantity, channel: Channel, target: f64) -> Result<(), S::Error> {
        if !target.is_finite() {
            return Err(ConfigError::NonFiniteSetpoint(target).into());
        }
        if self.get_output_state()? == State::On {
            let config = *self.ramp_config(quantity);
            let present = self.get_setpoint(quantity, channel)?;
            let steps = config.steps(present, target)?;
            debug!(
                "Ramping {quantity:?} on {channel} from {present} to {target} in steps of {}",
                config.step_size()
            );
            for value in steps {
                self.set_setpoint(quantity, channel, value)?;
                std::thread::sleep(config.pacing_interval());
            }
        } else {
            debug!("Output is off, setting {quantity:?} on {channel} to {target} directly");
        }
        self.set_setpoint(quantity, channel, target)
    }

    /// Change the voltage of a channel gradually. See [Self::ramp].
    pub fn ramp_voltage(&mut self, channel: Channel, volts: f64) -> Result<(), S::Error> {
        self.ramp(Quantity::Voltage, channel, volts)
    }

    /// Change the current limit of a channel gradually. See [Self::ramp].
    pub fn ramp_current(&mut self, channel: Channel, amps: f64) -> Result<(), S::Error> {
        self.ramp(Quantity::Current, channel, amps)
    }

    /// Ramp every channel of this model down to 0V, then disable the output.
    ///
    /// Fails with [Error::UnknownModel] before touching any channel if the model cannot be identified.
    pub fn shutdown_all_channels(&mut self) -> Result<(), S::Error> {
        let family = self.get_model_family()?;
        debug!("Shutting down {} channels of {family:?}", family.channel_count());
        for channel in family.channels() {
            self.ramp_voltage(channel, 0.0)?;
        }
        self.off()
    }

    /// Send a command which has no response.
    pub fn send(&mut self, command: Command) -> Result<(), S::Error> {
        if command.is_query() {
            return Err(ConfigError::ExpectsResponse(command.into()).into());
        }
        let line = command.encode().map_err(|_| Error::LineTooLong)?;
        self.transport.write_line(&line)
    }

    /// Send a query and return the raw response line.
    pub fn query(&mut self, command: Command) -> Result<String, S::Error> {
        if !command.is_query() {
            return Err(ConfigError::NoResponse(command.into()).into());
        }
        let line = command.encode().map_err(|_| Error::LineTooLong)?;
        self.transport.query(&line)
    }

    fn query_number(&mut self, command: Command) -> Result<f64, S::Error> {
        let response = self.query(command)?;
        command::decode_number(&response, command::unit_suffix_len(&command))
            .ok_or(Error::InvalidResponse(response))
    }
}
