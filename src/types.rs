//! This module contains the typed values used by the GPD command set.

use strum_macros::EnumIter;

use crate::error::ConfigError;

/// An output channel of the supply, numbered from 1.
///
/// The GPD-4303S has four channels and the GPD-3303S two, so any value in `1..=4` is accepted
/// here. Which of those actually exist depends on the model, see [`ModelFamily::channels`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(u8);

impl Channel {
    pub const MAX: u8 = 4;

    pub const CH1: Channel = Channel(1);
    pub const CH2: Channel = Channel(2);
    pub const CH3: Channel = Channel(3);
    pub const CH4: Channel = Channel(4);

    pub fn new(number: u8) -> Result<Self, ConfigError> {
        if (1..=Self::MAX).contains(&number) {
            Ok(Self(number))
        } else {
            Err(ConfigError::InvalidChannel(number))
        }
    }

    /// The number used on the wire.
    pub fn number(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Channel {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "CH{}", self.0)
    }
}

/// Used to be less ambiguous and whether something is on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum State {
    /// Disabled.
    Off,
    /// Enabled.
    On,
}

impl From<State> for bool {
    fn from(value: State) -> Self {
        match value {
            State::Off => false,
            State::On => true,
        }
    }
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        match value {
            true => State::On,
            false => State::Off,
        }
    }
}

impl From<State> for u8 {
    fn from(value: State) -> Self {
        bool::from(value) as u8
    }
}

/// Which quantity a setpoint or ramp applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Quantity {
    Voltage,
    Current,
}

/// Regulation mode a channel is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Constant current regulation mode.
    Cc,
    /// Constant voltage regulation mode.
    Cv,
}

/// How CH1 and CH2 are combined, as set by `TRACK{n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum TrackingMode {
    Independent = 0,
    Series = 1,
    Parallel = 2,
}

impl TryFrom<u8> for TrackingMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Independent),
            1 => Ok(Self::Series),
            2 => Ok(Self::Parallel),
            other => Err(other),
        }
    }
}

/// Baud rates the PSU can be switched to with `BAUD{code}`.
///
/// The discriminant is the code sent on the wire, not the rate itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum BaudRate {
    _115200 = 0,
    _57600 = 1,
    /// This is the default PSU baud rate.
    _9600 = 2,
}

impl BaudRate {
    pub fn bits_per_second(self) -> u32 {
        match self {
            BaudRate::_115200 => 115_200,
            BaudRate::_57600 => 57_600,
            BaudRate::_9600 => 9_600,
        }
    }
}

impl TryFrom<u8> for BaudRate {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::_115200),
            1 => Ok(Self::_57600),
            2 => Ok(Self::_9600),
            other => Err(other),
        }
    }
}

/// Model families this driver knows the channel layout of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum ModelFamily {
    Gpd3303,
    Gpd4303,
}

impl ModelFamily {
    /// Model number substring (as found in `*IDN?`) to family.
    ///
    /// Lookups that miss this table must be reported, never defaulted.
    pub const TABLE: &'static [(&'static str, ModelFamily)] =
        &[("3303", ModelFamily::Gpd3303), ("4303", ModelFamily::Gpd4303)];

    pub fn from_model_number(model: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(number, _)| *number == model)
            .map(|(_, family)| *family)
    }

    pub fn channel_count(self) -> u8 {
        match self {
            ModelFamily::Gpd3303 => 2,
            ModelFamily::Gpd4303 => 4,
        }
    }

    /// All channels present on this model, in ascending order.
    pub fn channels(self) -> impl Iterator<Item = Channel> {
        (1..=self.channel_count()).map(Channel)
    }
}

/// A save/recall memory slot on the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySlot(u8);

impl MemorySlot {
    pub const MAX: u8 = 4;

    pub fn new(number: u8) -> Result<Self, ConfigError> {
        if (1..=Self::MAX).contains(&number) {
            Ok(Self(number))
        } else {
            Err(ConfigError::InvalidMemorySlot(number))
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }
}
