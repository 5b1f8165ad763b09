//! We use this mocking module in unit tests to emulate a GPD PSU on the end of a serial port.
//!
//! Every line written is decoded and applied to a small model of the instrument, and queries
//! are answered in the same format the real PSU uses.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use thiserror::Error;

pub const IDN_3303: &str = "GW INSTEK,GPD-3303S,SN:EN123456,V1.10";
pub const IDN_4303: &str = "GW INSTEK,GPD-4303S,SN:EN654321,V1.10";

/// Our mock type used to emulate a PSU behind a serial port.
pub struct MockInstrument {
    /// Every byte written to the mock serial port.
    written: Vec<u8>,
    /// Bytes of the line currently being written.
    pending: Vec<u8>,
    /// Complete command lines received, in order.
    commands: Vec<String>,
    /// Response bytes waiting to be read.
    responses: VecDeque<u8>,
    idn: String,
    channels: usize,
    voltage: [f64; 4],
    current: [f64; 4],
    output: bool,
    beep: bool,
    tracking: u8,
    baud: u8,
    remote: bool,
    last_error: Option<String>,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
    /// Receives the command history when this mock is dropped, i.e. the port closed.
    closed: Option<CloseLog>,
}

/// One entry per closed mock, holding every command that mock received.
pub type CloseLog = Rc<RefCell<Vec<Vec<String>>>>;

#[derive(Debug, Error)]
pub enum MockSerialError {
    /// Simulated timeout error, nothing to read.
    #[error("timed out")]
    Timeout,
    /// Generic simulated error for testing
    #[error("simulated error")]
    SimulatedError,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockInstrument {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockInstrument {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        for &byte in buf {
            self.written.push(byte);
            if byte == b'\n' {
                let raw = core::mem::take(&mut self.pending);
                let line = String::from_utf8_lossy(&raw).trim_end().to_string();
                self.handle_line(&line);
                self.commands.push(line);
            } else {
                self.pending.push(byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockInstrument {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }
        if self.responses.is_empty() {
            return Err(MockSerialError::Timeout);
        }
        let mut count = 0;
        for slot in buf.iter_mut() {
            match self.responses.pop_front() {
                Some(byte) => {
                    *slot = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}

impl Drop for MockInstrument {
    fn drop(&mut self) {
        if let Some(closed) = &self.closed {
            closed.borrow_mut().push(core::mem::take(&mut self.commands));
        }
    }
}

impl MockInstrument {
    pub fn new(idn: &str, channels: usize) -> Self {
        Self {
            written: Vec::new(),
            pending: Vec::new(),
            commands: Vec::new(),
            responses: VecDeque::new(),
            idn: idn.to_string(),
            channels,
            voltage: [0.0; 4],
            current: [0.0; 4],
            output: false,
            beep: true,
            tracking: 0,
            baud: 2,
            remote: false,
            last_error: None,
            should_error_on_write: false,
            should_error_on_read: false,
            closed: None,
        }
    }

    /// A two channel GPD-3303S.
    pub fn gpd_3303() -> Self {
        Self::new(IDN_3303, 2)
    }

    /// A four channel GPD-4303S.
    pub fn gpd_4303() -> Self {
        Self::new(IDN_4303, 4)
    }

    /// Record this mock's commands into `log` when it is dropped.
    pub fn with_close_log(mut self, log: CloseLog) -> Self {
        self.closed = Some(log);
        self
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.written
    }

    /// Command lines received so far, without terminators.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
        self.written.clear();
    }

    /// Queue bytes to be read back verbatim.
    pub fn push_raw_response(&mut self, data: &[u8]) {
        self.responses.extend(data.iter().copied());
    }

    pub fn set_output(&mut self, on: bool) {
        self.output = on;
    }

    pub fn output(&self) -> bool {
        self.output
    }

    pub fn set_voltage(&mut self, channel: usize, value: f64) {
        self.voltage[channel - 1] = value;
    }

    pub fn voltage(&self, channel: usize) -> f64 {
        self.voltage[channel - 1]
    }

    pub fn set_current(&mut self, channel: usize, value: f64) {
        self.current[channel - 1] = value;
    }

    pub fn current(&self, channel: usize) -> f64 {
        self.current[channel - 1]
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }

    pub fn beep(&self) -> bool {
        self.beep
    }

    pub fn tracking(&self) -> u8 {
        self.tracking
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }

    fn respond(&mut self, response: &str) {
        self.responses.extend(response.bytes());
        self.responses.extend(b"\r\n".iter().copied());
    }

    fn status(&self) -> String {
        let bit = |on: bool| if on { '1' } else { '0' };
        let tracking = match self.tracking {
            1 => "11",
            2 => "10",
            _ => "01",
        };
        let baud = match self.baud {
            0 => "00",
            1 => "01",
            _ => "10",
        };
        format!(
            "11{tracking}{}{}{baud}",
            bit(self.beep),
            bit(self.output)
        )
    }

    fn channel(&self, digit: &str) -> Option<usize> {
        let channel: usize = digit.parse().ok()?;
        (1..=self.channels).contains(&channel).then_some(channel - 1)
    }

    fn handle_line(&mut self, line: &str) {
        if self.apply(line).is_none() {
            self.last_error = Some(format!("Command Error: {line}"));
        }
    }

    fn apply(&mut self, line: &str) -> Option<()> {
        match line {
            "*IDN?" => {
                let idn = self.idn.clone();
                self.respond(&idn);
            }
            "STATUS?" => {
                let status = self.status();
                self.respond(&status);
            }
            "ERR?" => {
                let error = self.last_error.take().unwrap_or_else(|| "No Error.".to_string());
                self.respond(&error);
            }
            "HELP?" => self.respond("ISET<X>:<NR2> VSET<X>:<NR2> OUT<Boolean> STATUS?"),
            "REMOTE" => self.remote = true,
            "LOCAL" => self.remote = false,
            _ => return self.apply_parameterised(line),
        }
        Some(())
    }

    fn apply_parameterised(&mut self, line: &str) -> Option<()> {
        let (head, rest) = line.split_at(line.find(|c: char| c.is_ascii_digit())?);
        match head {
            "VSET" | "ISET" => {
                let is_voltage = head == "VSET";
                if let Some(digit) = rest.strip_suffix('?') {
                    let channel = self.channel(digit)?;
                    let response = if is_voltage {
                        format!("{:.3}V", self.voltage[channel])
                    } else {
                        format!("{:.3}A", self.current[channel])
                    };
                    self.respond(&response);
                } else {
                    let (digit, value) = rest.split_once(':')?;
                    let channel = self.channel(digit)?;
                    let value: f64 = value.parse().ok()?;
                    if is_voltage {
                        self.voltage[channel] = value;
                    } else {
                        self.current[channel] = value;
                    }
                }
            }
            "VOUT" => {
                let channel = self.channel(rest.strip_suffix('?')?)?;
                let value = if self.output { self.voltage[channel] } else { 0.0 };
                self.respond(&format!("{value:.3}"));
            }
            "IOUT" => {
                self.channel(rest.strip_suffix('?')?)?;
                self.respond("0.000A");
            }
            "OUT" => self.output = flag(rest)?,
            "BEEP" => self.beep = flag(rest)?,
            "TRACK" => self.tracking = code(rest, 2)?,
            "BAUD" => self.baud = code(rest, 2)?,
            "RCL" | "SAV" => {
                code(rest, 4).filter(|slot| *slot >= 1)?;
            }
            _ => return None,
        }
        Some(())
    }
}

fn flag(rest: &str) -> Option<bool> {
    match rest {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

fn code(rest: &str, max: u8) -> Option<u8> {
    rest.parse().ok().filter(|value| *value <= max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, Write};

    fn read_all(mock: &mut MockInstrument) -> String {
        let mut buffer = [0u8; 64];
        let count = mock.read(&mut buffer).unwrap();
        String::from_utf8_lossy(&buffer[..count]).into_owned()
    }

    #[test]
    fn test_new_mock_instrument() {
        let mock = MockInstrument::gpd_3303();
        assert!(mock.written_data().is_empty());
        assert!(mock.commands().is_empty());
        assert!(!mock.output());
        assert!(!mock.is_remote());
    }

    #[test]
    fn test_lines_split_across_writes() {
        let mut mock = MockInstrument::gpd_3303();
        mock.write(b"VSET1:").unwrap();
        mock.write(b"2.500\r").unwrap();
        mock.write(b"\nOUT1\r\n").unwrap();
        assert_eq!(mock.commands(), ["VSET1:2.500", "OUT1"]);
        assert_eq!(mock.voltage(1), 2.5);
        assert!(mock.output());
    }

    #[test]
    fn test_setpoint_queries() {
        let mut mock = MockInstrument::gpd_3303();
        mock.write(b"ISET2:0.125\r\nISET2?\r\n").unwrap();
        assert_eq!(read_all(&mut mock), "0.125A\r\n");
    }

    #[test]
    fn test_status_reflects_state() {
        let mut mock = MockInstrument::gpd_3303();
        mock.write(b"OUT1\r\nBEEP0\r\nTRACK1\r\nSTATUS?\r\n").unwrap();
        assert_eq!(read_all(&mut mock), "11110110\r\n");
    }

    #[test]
    fn test_unknown_channel_is_an_error() {
        let mut mock = MockInstrument::gpd_3303();
        mock.write(b"VSET3:1.000\r\nERR?\r\n").unwrap();
        assert_eq!(read_all(&mut mock), "Command Error: VSET3:1.000\r\n");
        mock.write(b"ERR?\r\n").unwrap();
        assert_eq!(read_all(&mut mock), "No Error.\r\n");
    }

    #[test]
    fn test_read_timeout_when_no_data() {
        let mut mock = MockInstrument::gpd_3303();
        let mut buffer = [0u8; 10];
        let result = mock.read(&mut buffer);
        assert!(matches!(result, Err(MockSerialError::Timeout)));
        assert!(matches!(
            MockSerialError::Timeout.kind(),
            embedded_io::ErrorKind::TimedOut
        ));
    }

    #[test]
    fn test_error_simulation() {
        let mut mock = MockInstrument::gpd_3303();
        mock.set_write_error(true);
        assert!(matches!(mock.write(b"OUT1\r\n"), Err(MockSerialError::SimulatedError)));
        assert!(mock.flush().is_err());
        assert!(mock.written_data().is_empty());

        mock.set_write_error(false);
        mock.push_raw_response(b"x");
        mock.set_read_error(true);
        let mut buffer = [0u8; 4];
        assert!(matches!(mock.read(&mut buffer), Err(MockSerialError::SimulatedError)));
    }

    #[test]
    fn test_close_log() {
        let log = CloseLog::default();
        let mut mock = MockInstrument::gpd_4303().with_close_log(log.clone());
        mock.write(b"REMOTE\r\n").unwrap();
        assert!(log.borrow().is_empty());
        drop(mock);
        assert_eq!(*log.borrow(), vec![vec!["REMOTE".to_string()]]);
    }
}
