//! Command-frame encoding and response-header parsing.
//!
//! Per the design note against packed on-wire structs: every wire shape here
//! is produced/consumed through explicit functions over byte slices, never a
//! `#[repr(packed)]` aggregate.

use crate::error::{DriverError, Result};

/// Host-to-device sync byte.
pub const CMD_SYNC_BYTE: u8 = 0xA5;

/// Device-to-host response sync bytes.
pub const ANS_SYNC_BYTE1: u8 = 0xA5;
/// Second response sync byte.
pub const ANS_SYNC_BYTE2: u8 = 0x5A;

/// Length of a response header on the wire.
pub const RESPONSE_HEADER_LEN: usize = 7;

/// Encode a command frame.
///
/// If `payload` is `Some`, the frame gets a trailing XOR checksum over
/// `[sync, cmd, size, payload...]`. Otherwise the frame is just `[sync,
/// cmd]`. Deciding this from whether a payload was actually supplied, rather
/// than from a bit pattern in `cmd` itself, matters because several opcodes
/// (`getDeviceInfo`, `getHealth`, `getSamplingRate`, `reset`) have `0x80`
/// baked into their numeric value despite carrying no payload of their own.
pub fn encode_command(cmd: u8, payload: Option<&[u8]>) -> Vec<u8> {
    let mut out = vec![CMD_SYNC_BYTE, cmd];
    if let Some(payload) = payload {
        let size: u8 = payload
            .len()
            .try_into()
            .expect("command payload must fit in a byte");
        out.push(size);
        out.extend_from_slice(payload);
        let checksum = out.iter().fold(0u8, |acc, &b| acc ^ b);
        out.push(checksum);
    }
    out
}

/// A parsed 7-byte response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Payload size in bytes that follows the header (low 30 bits of the
    /// packed field).
    pub size: u32,
    /// High 2 bits of the packed field.
    pub sub_type: u8,
    /// Final header byte, disambiguates what the payload means.
    pub msg_type: u8,
}

impl ResponseHeader {
    /// Parse a response header from exactly [`RESPONSE_HEADER_LEN`] bytes,
    /// which must already begin with the two sync bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != RESPONSE_HEADER_LEN {
            return Err(DriverError::Protocol(format!(
                "response header must be {RESPONSE_HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[0] != ANS_SYNC_BYTE1 || bytes[1] != ANS_SYNC_BYTE2 {
            return Err(DriverError::Protocol(
                "response header missing sync bytes".into(),
            ));
        }
        let packed = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        Ok(Self {
            size: packed & 0x3FFF_FFFF,
            sub_type: (packed >> 30) as u8,
            msg_type: bytes[6],
        })
    }

    /// Serialize this header back to 7 bytes. Used by the mock transport and
    /// by tests; never called on a live link.
    #[must_use]
    pub fn encode(&self) -> [u8; RESPONSE_HEADER_LEN] {
        let packed = (self.size & 0x3FFF_FFFF) | (u32::from(self.sub_type) << 30);
        let le = packed.to_le_bytes();
        [
            ANS_SYNC_BYTE1,
            ANS_SYNC_BYTE2,
            le[0],
            le[1],
            le[2],
            le[3],
            self.msg_type,
        ]
    }
}
