//! Driver error taxonomy.
//!
//! One variant per abstract error kind the facade can surface. A checksum
//! mismatch encountered by the acquisition pump never crosses this boundary
//! as an error: it only shows up as lost samples and a bumped parser counter
//! (see [`crate::parser::ScanParser`]). [`DriverError::ChecksumMismatch`]
//! exists for lower-level parser entry points used directly, outside the
//! pump, where surfacing it as an error rather than a counter makes sense.

/// Errors returned from the driver facade.
#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    /// Serial read/write failed or the link dropped.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure opening or configuring the serial port itself.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Deadline elapsed before the operation completed.
    #[error("timed out")]
    Timeout,

    /// Sync not found, header type mismatch, or unexpected payload size.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A package's checksum didn't match, surfaced by a lower-level parser
    /// entry point used directly rather than through the acquisition pump.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Operation is illegal in the driver's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// `grabScanData` called before `startScan`.
    #[error("not scanning")]
    NotScanning,

    /// `connect` called while already connected.
    #[error("already connected")]
    AlreadyConnected,

    /// Operation requires an open link.
    #[error("not connected")]
    NotConnected,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DriverError>;
