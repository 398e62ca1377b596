//! `ByteStream`: the driver's only substrate, abstracted behind a small
//! capability set rather than an inheritance hierarchy. `open` is
//! deliberately not part of the trait — each implementation's notion of
//! "open" takes different parameters, so it's a constructor on the concrete
//! type instead, the same way a block takes its setup arguments in
//! `new`/`build` rather than through a shared trait method.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::Duration;

use crate::error::{DriverError, Result};

/// Everything the driver needs from a link to the device.
pub trait ByteStream: Send {
    /// Idempotent; subsequent reads/writes must fail with
    /// [`DriverError::NotConnected`].
    fn close(&mut self) -> Result<()>;

    /// Read up to `buf.len()` bytes, blocking for at most `timeout`. May
    /// return fewer bytes than requested if the deadline elapses first;
    /// callers use the returned count to track progress, not an error.
    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Write the whole buffer or fail.
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<()>;

    /// Raise or lower DTR (used to power the scanner's motor on some models).
    fn set_dtr(&mut self, level: bool) -> Result<()>;
}

/// Real hardware, backed by the `serialport` crate.
pub struct SerialByteStream {
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialByteStream {
    /// Open `path` at `baud_rate`, 8N1, with `timeout` as the port's default
    /// read timeout.
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(timeout)
            .open()?;
        Ok(Self { port: Some(port) })
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        self.port.as_mut().ok_or(DriverError::NotConnected)
    }
}

impl ByteStream for SerialByteStream {
    fn close(&mut self) -> Result<()> {
        self.port = None;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port_mut()?;
        port.set_timeout(timeout)?;
        let mut total = 0;
        while total < buf.len() {
            match port.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) => return Err(DriverError::Io(e)),
            }
        }
        Ok(total)
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.port_mut()?.write_all(buf).map_err(DriverError::Io)
    }

    fn flush(&mut self) -> Result<()> {
        self.port_mut()?.flush().map_err(DriverError::Io)
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        self.port_mut()?.write_data_terminal_ready(level).map_err(DriverError::Serial)
    }
}

/// In-memory transport for unit and integration tests, filling the same role
/// an in-process producer plays for code that otherwise talks to real
/// hardware.
#[derive(Default)]
pub struct MockByteStream {
    inbound: VecDeque<u8>,
    /// Every byte the driver has written, for assertions.
    pub outbound: Vec<u8>,
    /// Every `set_dtr` call, in order.
    pub dtr_history: Vec<bool>,
    closed: bool,
}

impl MockByteStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if the device had sent them.
    pub fn push_inbound(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes);
    }

    /// Bytes still unread.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inbound.len()
    }
}

impl ByteStream for MockByteStream {
    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if self.closed {
            return Err(DriverError::NotConnected);
        }
        let n = buf.len().min(self.inbound.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.inbound.pop_front().expect("bounded by inbound.len()");
        }
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        if self.closed {
            return Err(DriverError::NotConnected);
        }
        self.outbound.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        if self.closed {
            return Err(DriverError::NotConnected);
        }
        self.dtr_history.push(level);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_round_trip() {
        let mut m = MockByteStream::new();
        m.push_inbound(&[1, 2, 3, 4]);
        let mut buf = [0u8; 4];
        let n = m.read_exact(&mut buf, Duration::from_millis(10)).unwrap();
        assert_eq!(n, 4);
        assert_eq!(buf, [1, 2, 3, 4]);

        m.write_all(&[9, 9]).unwrap();
        assert_eq!(m.outbound, vec![9, 9]);
    }

    #[test]
    fn mock_short_read_when_starved() {
        let mut m = MockByteStream::new();
        m.push_inbound(&[1, 2]);
        let mut buf = [0u8; 5];
        let n = m.read_exact(&mut buf, Duration::from_millis(10)).unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn mock_closed_rejects_io() {
        let mut m = MockByteStream::new();
        m.close().unwrap();
        let mut buf = [0u8; 1];
        assert!(m.read_exact(&mut buf, Duration::from_millis(1)).is_err());
        assert!(m.write_all(&[1]).is_err());
        assert!(m.set_dtr(true).is_err());
    }

    #[test]
    fn mock_dtr_history_recorded() {
        let mut m = MockByteStream::new();
        m.set_dtr(true).unwrap();
        m.set_dtr(false).unwrap();
        assert_eq!(m.dtr_history, vec![true, false]);
    }
}
