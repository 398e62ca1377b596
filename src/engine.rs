//! Request/response engine: one-shot command exchange with timeout,
//! built directly on a [`ByteStream`]. Exclusive access to the link during a
//! transaction is a caller discipline (enforced by the facade), not
//! something this type locks — it owns the stream outright.

use std::time::{Duration, Instant};

use log::trace;

use crate::error::{DriverError, Result};
use crate::frame::{ANS_SYNC_BYTE1, ANS_SYNC_BYTE2, ResponseHeader, encode_command};
use crate::transport::ByteStream;

/// Drives command exchanges over a single owned [`ByteStream`].
pub struct Engine<S: ByteStream> {
    stream: S,
}

impl<S: ByteStream> Engine<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_stream(self) -> S {
        self.stream
    }

    /// Encode and write a command frame.
    pub fn send_command(&mut self, cmd: u8, payload: Option<&[u8]>) -> Result<()> {
        let frame = encode_command(cmd, payload);
        self.stream.write_all(&frame)?;
        self.stream.flush()
    }

    /// Scan for the `0xA5 0x5A` sync pair, discarding everything before it,
    /// then parse the rest of a [`ResponseHeader`].
    pub fn wait_response_header(&mut self, timeout: Duration) -> Result<ResponseHeader> {
        let deadline = Instant::now() + timeout;

        let mut seen_sync1 = false;
        loop {
            let b = self.read_byte_before(deadline)?;
            if !seen_sync1 {
                if b == ANS_SYNC_BYTE1 {
                    seen_sync1 = true;
                }
            } else if b == ANS_SYNC_BYTE2 {
                break;
            } else if b != ANS_SYNC_BYTE1 {
                seen_sync1 = false;
            }
        }

        let rest = self.wait_for_bytes_before(5, deadline)?;
        let mut header_bytes = [0u8; 7];
        header_bytes[0] = ANS_SYNC_BYTE1;
        header_bytes[1] = ANS_SYNC_BYTE2;
        header_bytes[2..].copy_from_slice(&rest);
        trace!("Engine: response header bytes {:02x?}", header_bytes);
        ResponseHeader::parse(&header_bytes)
    }

    /// Block until exactly `n` bytes have arrived or `timeout` elapses.
    pub fn wait_for_bytes(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        self.wait_for_bytes_before(n, deadline)
    }

    /// Best-effort read: whatever the transport has ready within `timeout`,
    /// up to `buf.len()`, possibly fewer bytes (or zero) on a short read.
    /// Used by the acquisition pump's inner loop, which polls this on its
    /// own schedule rather than waiting for an exact byte count.
    pub fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.stream.read_exact(buf, timeout)
    }

    pub fn set_dtr(&mut self, level: bool) -> Result<()> {
        self.stream.set_dtr(level)
    }

    pub fn close(&mut self) -> Result<()> {
        self.stream.close()
    }

    fn read_byte_before(&mut self, deadline: Instant) -> Result<u8> {
        let mut b = [0u8; 1];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DriverError::Timeout);
            }
            if self.stream.read_exact(&mut b, remaining)? == 1 {
                return Ok(b[0]);
            }
        }
    }

    fn wait_for_bytes_before(&mut self, n: usize, deadline: Instant) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let mut total = 0;
        while total < n {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DriverError::Timeout);
            }
            total += self.stream.read_exact(&mut buf[total..], remaining)?;
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockByteStream;

    #[test]
    fn send_command_writes_encoded_frame() {
        let mut engine = Engine::new(MockByteStream::new());
        engine.send_command(0x65, None).unwrap();
        assert_eq!(engine.stream_mut().outbound, vec![0xA5, 0x65]);
    }

    #[test]
    fn wait_response_header_skips_garbage() {
        let mut mock = MockByteStream::new();
        let header = ResponseHeader {
            size: 20,
            sub_type: 0,
            msg_type: 0x04,
        };
        let mut bytes = vec![0xFF, 0x00, 0xA5];
        bytes.extend_from_slice(&header.encode());
        mock.push_inbound(&bytes);
        let mut engine = Engine::new(mock);
        let got = engine.wait_response_header(Duration::from_millis(100)).unwrap();
        assert_eq!(got, header);
    }

    #[test]
    fn wait_response_header_tolerates_repeated_sync1() {
        let mut mock = MockByteStream::new();
        let header = ResponseHeader {
            size: 1,
            sub_type: 0,
            msg_type: 0x06,
        };
        let mut bytes = vec![0xA5, 0xA5];
        bytes.extend_from_slice(&header.encode());
        mock.push_inbound(&bytes);
        let mut engine = Engine::new(mock);
        let got = engine.wait_response_header(Duration::from_millis(100)).unwrap();
        assert_eq!(got, header);
    }

    #[test]
    fn wait_response_header_times_out_on_empty_stream() {
        let mock = MockByteStream::new();
        let mut engine = Engine::new(mock);
        let err = engine.wait_response_header(Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, DriverError::Timeout));
    }

    #[test]
    fn read_returns_whatever_is_available() {
        let mut mock = MockByteStream::new();
        mock.push_inbound(&[1, 2, 3]);
        let mut engine = Engine::new(mock);
        let mut buf = [0u8; 8];
        let n = engine.read(&mut buf, Duration::from_millis(50)).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }

    #[test]
    fn wait_for_bytes_accumulates_across_short_reads() {
        let mut mock = MockByteStream::new();
        mock.push_inbound(&[1, 2, 3, 4]);
        let mut engine = Engine::new(mock);
        let got = engine.wait_for_bytes(4, Duration::from_millis(100)).unwrap();
        assert_eq!(got, vec![1, 2, 3, 4]);
    }
}
