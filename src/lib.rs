//! This crate provides an interface for communicating with and controlling the GW Instek GPD-x303S
//! series of programmable bench power supplies.
//!
//! Models which this should work with:
//! * GPD-3303S (2 channels)
//! * GPD-4303S (4 channels)
//!
//! The supplies speak a line-oriented ASCII protocol over a USB virtual COM port. Every command is a
//! single `\r\n` terminated line, and only queries (commands ending in `?`) produce a response line.
//! The instrument gives no acknowledgement, so the driver waits a fixed pacing interval between
//! issuing a query and reading its answer.
//!
//! The serial port used for PSU comms should be configured like so:
//! * Default baud rate: 9600
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//!
//! Voltage and current can be changed gradually ("ramped") while the output is energised, see
//! [`psu::GpdPsu::ramp_voltage`]. [`session::Session`] owns the serial port, puts the supply in
//! remote mode on open and hands the front panel back on close.

pub mod command;
pub mod error;
pub mod port;
pub mod psu;
pub mod ramp;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock_serial;
