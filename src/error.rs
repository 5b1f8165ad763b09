//! Our error types for the GPD PSUs.

use core::time::Duration;

use thiserror::Error;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for GW Instek GPD PSU communications.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error: {0:?}")]
    Serial(I),
    #[error("No response within {0:?}")]
    Timeout(Duration),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("Unknown model family in identification {0:?}")]
    UnknownModel(String),
    #[error("Invalid response received: {0:?}")]
    InvalidResponse(String),
    #[error("Line exceeded the buffer capacity")]
    LineTooLong,
    #[error("Session is not connected")]
    NotConnected,
}

/// Rejected parameters, raised before anything is sent to the instrument.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("step size must be positive and finite, got {0}")]
    NonPositiveStep(f64),
    #[error("setpoint must be finite, got {0}")]
    NonFiniteSetpoint(f64),
    #[error("channel {0} is outside 1..=4")]
    InvalidChannel(u8),
    #[error("memory slot {0} is outside 1..=4")]
    InvalidMemorySlot(u8),
    #[error("{0} expects a response, send it as a query")]
    ExpectsResponse(&'static str),
    #[error("{0} has no response, send it without querying")]
    NoResponse(&'static str),
}
