//! The unit of data this driver emits: one beam sample.

/// Whether a [`Node`] is the first sample of a new rotation.
///
/// The two low bits of `sync_quality` are a self-checking 2-bit code, not an
/// independent sync bit plus an independent check bit: `Sync` is encoded
/// `0b01`, `NotSync` is encoded `0b10`, so bit 1 is always the complement of
/// bit 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncFlag {
    /// First sample of a new rotation.
    Sync,
    /// Any other sample.
    #[default]
    NotSync,
}

impl SyncFlag {
    pub(crate) fn code(self) -> u8 {
        match self {
            SyncFlag::Sync => 0b01,
            SyncFlag::NotSync => 0b10,
        }
    }
}

/// Default reflectivity quality reported when intensity mode is off.
///
/// The wire constant is `10 << 2`; what's stored in a quality accessor is
/// that value shifted back down, i.e. `10`.
pub const DEFAULT_QUALITY: u8 = 10;

/// One beam measurement: angle, distance, quality, sync flag.
///
/// Mirrors the on-wire `node_info` layout field for field, but as plain Rust
/// fields rather than a packed struct (see the design note against packed
/// on-wire aggregates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Node {
    /// Bits 0-1: self-checking sync code (see [`SyncFlag`]). Bits 2-7: quality.
    pub sync_quality: u8,
    /// Bit 0: check bit, `(distance_fixed ^ angle_raw) & 1`. Bits 1-15: fixed-point
    /// angle, 6 fractional bits.
    pub angle_fixed: u16,
    /// Fixed-point distance, 2 fractional bits (millimetres = raw / 4). Zero
    /// means "no return".
    pub distance_fixed: u16,
}

impl Node {
    /// Build a node from its decoded components, computing both check bits
    /// the way the parser's emission step specifies.
    ///
    /// `angle_raw` is the angle stored in `angle_fixed`'s upper 15 bits
    /// (degrees * 64, already wrapped into `[0, 360*64)`) — this is the
    /// distance-corrected angle when a correction applies. `check_angle_raw`
    /// is the angle the check bit is computed against, which is always the
    /// *pre*-correction interpolated angle; callers that don't apply a
    /// correction pass the same value for both.
    pub fn from_parts(quality: u8, sync: SyncFlag, angle_raw: u16, check_angle_raw: u16, distance_fixed: u16) -> Self {
        let check_bit = (distance_fixed ^ check_angle_raw) & 1;
        Self {
            sync_quality: (quality << 2) | sync.code(),
            angle_fixed: (angle_raw << 1) | check_bit,
            distance_fixed,
        }
    }

    /// True if this node is the first sample of a new rotation.
    #[must_use]
    pub fn is_sync(&self) -> bool {
        self.sync_quality & 0b11 == SyncFlag::Sync.code()
    }

    /// Reflectivity quality, 0..63.
    #[must_use]
    pub fn quality(&self) -> u8 {
        self.sync_quality >> 2
    }

    /// Decoded angle in degrees, always in `[0, 360)`.
    #[must_use]
    pub fn angle_deg(&self) -> f32 {
        (self.angle_fixed >> 1) as f32 / 64.0
    }

    /// The raw 15-bit fixed-point angle (pre check-bit), same unit
    /// interpolation works in: degrees times 64.
    #[must_use]
    pub fn angle_raw(&self) -> u16 {
        self.angle_fixed >> 1
    }

    /// Decoded distance in millimetres. `0.0` means "no return".
    #[must_use]
    pub fn distance_mm(&self) -> f32 {
        self.distance_fixed as f32 / 4.0
    }

    /// True if the sample carries no valid return.
    #[must_use]
    pub fn is_no_return(&self) -> bool {
        self.distance_fixed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_roundtrip() {
        // 128.0 degrees => raw = 128*64 = 8192
        let n = Node::from_parts(10, SyncFlag::Sync, 8192, 8192, 4000);
        assert!(n.is_sync());
        assert_eq!(n.quality(), 10);
        assert_eq!(n.angle_deg(), 128.0);
        assert_eq!(n.distance_mm(), 1000.0);
        assert!(!n.is_no_return());
    }

    #[test]
    fn no_return_is_zero_distance() {
        let n = Node::from_parts(0, SyncFlag::NotSync, 0, 0, 0);
        assert!(n.is_no_return());
        assert!(!n.is_sync());
    }

    #[test]
    fn check_bit_matches_formula() {
        let n = Node::from_parts(0, SyncFlag::NotSync, 100, 100, 101);
        let want_check = (100u16 ^ 101u16) & 1;
        assert_eq!(n.angle_fixed & 1, want_check);
    }

    #[test]
    fn check_bit_uses_pre_correction_angle_not_stored_angle() {
        // Stored (corrected) angle is 99, but the check bit must be computed
        // against the pre-correction angle 100, not the stored one.
        let n = Node::from_parts(0, SyncFlag::NotSync, 99, 100, 101);
        let want_check = (100u16 ^ 101u16) & 1;
        assert_eq!(n.angle_fixed & 1, want_check);
        assert_eq!(n.angle_raw(), 99);
    }
}
