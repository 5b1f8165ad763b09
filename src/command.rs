//! The GPD command set: one ASCII line per operation, plus the decoders for query responses.
//!
//! Response decoding is position based. The instrument has no self describing framing, so each
//! response type has a fixed number of trailing unit characters or a fixed character offset,
//! captured by the constants in this module.

use core::fmt::Write;

use modular_bitfield::prelude::*;
use strum_macros::IntoStaticStr;

use crate::types::{
    BaudRate, Channel, ControlMode, MemorySlot, ModelFamily, Quantity, State, TrackingMode,
};

/// Longest command line we ever build, excluding the terminator.
pub const COMMAND_CAPACITY: usize = 32;

/// Appended to every line sent to, and received from, the PSU.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Decimal places the PSU resolves setpoints to.
pub const SETPOINT_DECIMALS: usize = 3;

/// `ISET{c}?` and `VSET{c}?` answer with the value followed by a unit character (`A`/`V`).
pub const SETPOINT_UNIT_SUFFIX_LEN: usize = 1;

/// `IOUT{c}?` answers with the value followed by `A`.
pub const OUTPUT_CURRENT_UNIT_SUFFIX_LEN: usize = 1;

/// `VOUT{c}?` answers with a bare number.
pub const OUTPUT_VOLTAGE_UNIT_SUFFIX_LEN: usize = 0;

/// `STATUS?` answers with one `0`/`1` character per status bit.
pub const STATUS_LEN: usize = 8;

/// Character offset of the output enable bit in the `STATUS?` response.
pub const STATUS_OUTPUT_OFFSET: usize = 5;

/// Byte range of the model number within the `*IDN?` response.
///
/// E.g. `GW INSTEK,GPD-3303S,SN:EXXXXXXX,V1.00` => `3303`.
pub const IDN_MODEL_RANGE: core::ops::Range<usize> = 14..18;

pub type CommandLine = heapless::String<COMMAND_CAPACITY>;

/// Every operation understood by the GPD series.
#[derive(Debug, Clone, Copy, PartialEq, IntoStaticStr)]
pub enum Command {
    /// `ISET{c}:{value}` / `VSET{c}:{value}`
    SetSetpoint(Quantity, Channel, f64),
    /// `ISET{c}?` / `VSET{c}?`
    GetSetpoint(Quantity, Channel),
    /// `IOUT{c}?` / `VOUT{c}?`
    GetOutput(Quantity, Channel),
    /// `OUT{0|1}`
    Output(State),
    /// `TRACK{0|1|2}`
    Track(TrackingMode),
    /// `BEEP{0|1}`
    Beep(State),
    /// `STATUS?`
    Status,
    /// `*IDN?`
    Identify,
    /// `RCL{n}`
    Recall(MemorySlot),
    /// `SAV{n}`
    Save(MemorySlot),
    /// `BAUD{code}`
    Baud(BaudRate),
    /// `LOCAL`
    Local,
    /// `REMOTE`
    Remote,
    /// `ERR?`
    Error,
    /// `HELP?`
    Help,
}

impl Command {
    /// Render the command line, without terminator.
    pub fn encode(&self) -> Result<CommandLine, core::fmt::Error> {
        let mut line = CommandLine::new();
        match *self {
            Command::SetSetpoint(quantity, channel, value) => write!(
                line,
                "{}SET{}:{:.*}",
                prefix(quantity),
                channel.number(),
                SETPOINT_DECIMALS,
                value
            )?,
            Command::GetSetpoint(quantity, channel) => {
                write!(line, "{}SET{}?", prefix(quantity), channel.number())?
            }
            Command::GetOutput(quantity, channel) => {
                write!(line, "{}OUT{}?", prefix(quantity), channel.number())?
            }
            Command::Output(state) => write!(line, "OUT{}", u8::from(state))?,
            Command::Track(mode) => write!(line, "TRACK{}", mode as u8)?,
            Command::Beep(state) => write!(line, "BEEP{}", u8::from(state))?,
            Command::Status => line.push_str("STATUS?").map_err(|_| core::fmt::Error)?,
            Command::Identify => line.push_str("*IDN?").map_err(|_| core::fmt::Error)?,
            Command::Recall(slot) => write!(line, "RCL{}", slot.number())?,
            Command::Save(slot) => write!(line, "SAV{}", slot.number())?,
            Command::Baud(rate) => write!(line, "BAUD{}", rate as u8)?,
            Command::Local => line.push_str("LOCAL").map_err(|_| core::fmt::Error)?,
            Command::Remote => line.push_str("REMOTE").map_err(|_| core::fmt::Error)?,
            Command::Error => line.push_str("ERR?").map_err(|_| core::fmt::Error)?,
            Command::Help => line.push_str("HELP?").map_err(|_| core::fmt::Error)?,
        }
        Ok(line)
    }

    /// Whether the PSU answers this command with a line.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Command::GetSetpoint(..)
                | Command::GetOutput(..)
                | Command::Status
                | Command::Identify
                | Command::Error
                | Command::Help
        )
    }
}

fn prefix(quantity: Quantity) -> char {
    match quantity {
        Quantity::Voltage => 'V',
        Quantity::Current => 'I',
    }
}

/// Round to the resolution of the PSU.
pub fn round_setpoint(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Decode a numeric response after dropping `suffix_len` trailing unit characters.
pub fn decode_number(response: &str, suffix_len: usize) -> Option<f64> {
    let keep = response.chars().count().checked_sub(suffix_len)?;
    let number: String = response.chars().take(keep).collect();
    number.trim().parse().ok()
}

/// Trailing unit characters on the response to a `GetSetpoint`/`GetOutput` query.
pub fn unit_suffix_len(command: &Command) -> usize {
    match command {
        Command::GetOutput(Quantity::Voltage, _) => OUTPUT_VOLTAGE_UNIT_SUFFIX_LEN,
        Command::GetOutput(Quantity::Current, _) => OUTPUT_CURRENT_UNIT_SUFFIX_LEN,
        Command::GetSetpoint(..) => SETPOINT_UNIT_SUFFIX_LEN,
        _ => 0,
    }
}

/// The `STATUS?` response, one bit per character.
///
/// Character `n` of the response is bit `n` here.
/// * 0 - CH1 mode, `0` CC, `1` CV.
/// * 1 - CH2 mode, `0` CC, `1` CV.
/// * 2,3 - Tracking, `01` independent, `11` series, `10` parallel.
/// * 4 - Beep.
/// * 5 - Output.
/// * 6,7 - Baud rate, `00` 115200, `01` 57600, `10` 9600.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags {
    ch1_cv: bool,
    ch2_cv: bool,
    tracking_bits: B2,
    beep_on: bool,
    output_on: bool,
    baud_bits: B2,
}

impl StatusFlags {
    /// Parse the raw `STATUS?` string. `None` if it is not eight `0`/`1` characters.
    pub fn decode(response: &str) -> Option<Self> {
        let bytes = response.as_bytes();
        if bytes.len() < STATUS_LEN {
            return None;
        }
        let mut packed = 0u8;
        for (bit, &c) in bytes[..STATUS_LEN].iter().enumerate() {
            match c {
                b'0' => {}
                b'1' => packed |= 1 << bit,
                _ => return None,
            }
        }
        Some(Self::from_bytes([packed]))
    }

    pub fn output(&self) -> State {
        State::from(self.output_on())
    }

    pub fn beep(&self) -> State {
        State::from(self.beep_on())
    }

    /// Regulation mode, only CH1 and CH2 are reported.
    pub fn control_mode(&self, channel: Channel) -> Option<ControlMode> {
        let cv = match channel.number() {
            1 => self.ch1_cv(),
            2 => self.ch2_cv(),
            _ => return None,
        };
        Some(if cv { ControlMode::Cv } else { ControlMode::Cc })
    }

    pub fn tracking(&self) -> Option<TrackingMode> {
        // Bit 2 is the low bit, so "01" reads as 0b10.
        match self.tracking_bits() {
            0b10 => Some(TrackingMode::Independent),
            0b11 => Some(TrackingMode::Series),
            0b01 => Some(TrackingMode::Parallel),
            _ => None,
        }
    }

    pub fn baud_rate(&self) -> Option<BaudRate> {
        match self.baud_bits() {
            0b00 => Some(BaudRate::_115200),
            0b10 => Some(BaudRate::_57600),
            0b01 => Some(BaudRate::_9600),
            _ => None,
        }
    }
}

/// The `*IDN?` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The model number substring, e.g. `3303`.
    pub fn model_number(&self) -> Option<&str> {
        self.0.get(IDN_MODEL_RANGE)
    }

    pub fn family(&self) -> Option<ModelFamily> {
        self.model_number().and_then(ModelFamily::from_model_number)
    }
}
