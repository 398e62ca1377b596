//! Command opcodes and the payload shapes the facade parses out of
//! responses to them.

use crate::error::{DriverError, Result};

pub const CMD_STOP: u8 = 0x65;
pub const CMD_RESET: u8 = 0x80;
pub const CMD_SCAN: u8 = 0x60;
pub const CMD_FORCE_SCAN: u8 = 0x61;
pub const CMD_GET_DEVICE_INFO: u8 = 0x90;
pub const CMD_GET_HEALTH: u8 = 0x92;
pub const CMD_GET_SAMPLING_RATE: u8 = 0xD1;
pub const CMD_SET_SAMPLING_RATE: u8 = 0xD0;

pub const RESP_TYPE_DEVICE_INFO: u8 = 0x04;
pub const RESP_TYPE_HEALTH: u8 = 0x06;
pub const RESP_TYPE_MEASUREMENT: u8 = 0x81;

/// Expected payload length following a device-info response header.
pub const DEVICE_INFO_PAYLOAD_LEN: usize = 20;
/// Expected payload length following a health response header.
pub const HEALTH_PAYLOAD_LEN: usize = 3;

/// Supported scanner models, by the byte `getDeviceInfo` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    F4 = 1,
    T1 = 2,
    F2 = 3,
    S4 = 4,
    G4 = 5,
    X4 = 6,
}

impl Model {
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Model::F4),
            2 => Some(Model::T1),
            3 => Some(Model::F2),
            4 => Some(Model::S4),
            5 => Some(Model::G4),
            6 => Some(Model::X4),
            _ => None,
        }
    }
}

/// Decode the firmware minor-byte into (minor, patch).
///
/// Preserved quirk from the original driver: if the computed minor digit is
/// zero, minor and patch are swapped. Whether this is cosmetic or encodes a
/// real firmware-range distinction is undocumented upstream; kept as-is.
fn decode_firmware_minor(minor_raw: u8) -> (u8, u8) {
    let mut minor = minor_raw / 10;
    let mut patch = minor_raw % 10;
    if minor == 0 {
        std::mem::swap(&mut minor, &mut patch);
    }
    (minor, patch)
}

/// Parsed `getDeviceInfo` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Raw model byte; see [`DeviceInfo::model`] for the typed form.
    pub model: u8,
    /// High byte of the firmware field.
    pub firmware_major: u8,
    /// Decoded from the firmware field's low byte (see [`decode_firmware_minor`]).
    pub firmware_minor: u8,
    /// Decoded from the firmware field's low byte (see [`decode_firmware_minor`]).
    pub firmware_patch: u8,
    /// Hardware revision.
    pub hardware: u8,
    /// Device serial number, as raw bytes.
    pub serial: [u8; 16],
}

impl DeviceInfo {
    /// The model this device reports, if it's one we recognize.
    #[must_use]
    pub fn model(&self) -> Option<Model> {
        Model::from_byte(self.model)
    }
}

/// Parse a `getDeviceInfo` response payload (not including the response header).
pub fn parse_device_info(payload: &[u8]) -> Result<DeviceInfo> {
    if payload.len() != DEVICE_INFO_PAYLOAD_LEN {
        return Err(DriverError::Protocol(format!(
            "device info payload must be {DEVICE_INFO_PAYLOAD_LEN} bytes, got {}",
            payload.len()
        )));
    }
    let firmware_major = payload[2];
    let (firmware_minor, firmware_patch) = decode_firmware_minor(payload[1]);
    let mut serial = [0u8; 16];
    serial.copy_from_slice(&payload[4..20]);
    Ok(DeviceInfo {
        model: payload[0],
        firmware_major,
        firmware_minor,
        firmware_patch,
        hardware: payload[3],
        serial,
    })
}

/// Device health advisory level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Warning,
    Error,
}

impl HealthStatus {
    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(HealthStatus::Ok),
            1 => Ok(HealthStatus::Warning),
            2 => Ok(HealthStatus::Error),
            other => Err(DriverError::Protocol(format!("unrecognized health status {other}"))),
        }
    }
}

/// Parsed `getHealth` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    /// Advisory level.
    pub status: HealthStatus,
    /// Device-specific error code, meaningful only when `status != Ok`.
    pub error_code: u16,
}

/// Parse a `getHealth` response payload.
pub fn parse_health(payload: &[u8]) -> Result<Health> {
    if payload.len() != HEALTH_PAYLOAD_LEN {
        return Err(DriverError::Protocol(format!(
            "health payload must be {HEALTH_PAYLOAD_LEN} bytes, got {}",
            payload.len()
        )));
    }
    Ok(Health {
        status: HealthStatus::from_byte(payload[0])?,
        error_code: u16::from_le_bytes([payload[1], payload[2]]),
    })
}

/// Opaque sampling-rate code, passed through by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingRate(pub u8);
