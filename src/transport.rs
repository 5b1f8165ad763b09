//! Line based command/response transport.
//!
//! The PSU never acknowledges a command. A query is answered after the PSU has processed it, so
//! [`LineTransport::query`] waits a fixed pacing interval between writing the command and reading
//! the answer. That delay is what keeps the two sides in step.

use std::time::{Duration, Instant};

use embedded_io::Error as _;
use log::trace;

use crate::command::LINE_TERMINATOR;
use crate::error::{Error, Result};

/// Back-off between reads that returned nothing, so a non-blocking interface does not spin.
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Sends and receives `\r\n` terminated lines over any [embedded_io::Read] & [embedded_io::Write]
/// interface.
///
/// `L` is the longest response line accepted, excluding the terminator.
pub struct LineTransport<S: embedded_io::Read + embedded_io::Write, const L: usize = 128> {
    interface: S,
    pacing_interval: Duration,
    read_timeout: Duration,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> LineTransport<S, L> {
    pub fn new(interface: S, pacing_interval: Duration, read_timeout: Duration) -> Self {
        Self {
            interface,
            pacing_interval,
            read_timeout,
        }
    }

    /// Delay between sending a query and reading its response.
    pub fn pacing_interval(&self) -> Duration {
        self.pacing_interval
    }

    pub fn set_pacing_interval(&mut self, pacing_interval: Duration) {
        self.pacing_interval = pacing_interval;
    }

    /// How long [Self::read_line] waits for a terminator.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn set_read_timeout(&mut self, read_timeout: Duration) {
        self.read_timeout = read_timeout;
    }

    pub fn interface(&self) -> &S {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut S {
        &mut self.interface
    }

    pub fn into_inner(self) -> S {
        self.interface
    }

    /// Send one command line, appending the terminator.
    pub fn write_line(&mut self, line: &str) -> Result<(), S::Error> {
        trace!("-> {line}");
        self.interface
            .write_all(line.as_bytes())
            .map_err(Error::Serial)?;
        self.interface
            .write_all(LINE_TERMINATOR.as_bytes())
            .map_err(Error::Serial)?;
        self.interface.flush().map_err(Error::Serial)
    }

    /// Block until a full line arrives, returning it without the terminator.
    pub fn read_line(&mut self) -> Result<String, S::Error> {
        let mut line: heapless::Vec<u8, L> = heapless::Vec::new();
        let started = Instant::now();
        // One byte at a time so we never consume the start of a following line.
        let mut byte = [0u8; 1];
        loop {
            match self.interface.read(&mut byte) {
                Ok(0) => {}
                Ok(_) if byte[0] == b'\n' => break,
                Ok(_) => {
                    line.push(byte[0]).map_err(|_| Error::LineTooLong)?;
                    continue;
                }
                Err(e) if matches!(e.kind(), embedded_io::ErrorKind::TimedOut) => {}
                Err(e) => return Err(Error::Serial(e)),
            }
            // Only reached when nothing arrived on this read.
            let elapsed = started.elapsed();
            if elapsed >= self.read_timeout {
                return Err(Error::Timeout(self.read_timeout));
            }
            std::thread::sleep(IDLE_POLL_INTERVAL.min(self.read_timeout - elapsed));
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        let text = core::str::from_utf8(&line)
            .map_err(|_| Error::InvalidResponse(String::from_utf8_lossy(&line).into_owned()))?;
        trace!("<- {text}");
        Ok(text.to_string())
    }

    /// Write a command, wait the pacing interval, then read the response line.
    pub fn query(&mut self, line: &str) -> Result<String, S::Error> {
        self.write_line(line)?;
        std::thread::sleep(self.pacing_interval);
        self.read_line()
    }
}
