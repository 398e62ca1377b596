//! Sample-package layout and checksum.
//!
//! A package's body holds the distance (and, in intensity mode, quality)
//! fields for `count` contiguous samples. The distilled spec leaves the
//! standard-mode sample width as an open question; this implementation
//! resolves it, per the original driver's `node_packages` layout, as a
//! 16-bit little-endian distance (no quality byte). Intensity mode keeps the
//! original's `PackageNode { quality: u8, distance: u16 }`, 3 bytes per
//! sample. See `DESIGN.md` for the reasoning.

/// Package preamble, little-endian on the wire.
pub const PH: u16 = 0x55AA;

/// Low bit of `ct`: this package opens a new rotation.
pub const CT_RINGSTART_BIT: u8 = 0x01;

/// Bytes per sample in standard (non-intensity) mode.
pub const STANDARD_SAMPLE_BYTES: usize = 2;
/// Bytes per sample in intensity mode.
pub const INTENSITY_SAMPLE_BYTES: usize = 3;

/// A parsed package header (everything before the body).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageHeader {
    /// Low bit: ring-start marker. Remaining bits: scan-frequency info.
    pub ct: u8,
    /// Number of samples in the body, 1..=255.
    pub count: u8,
    /// Fixed-point angle of the first sample (check bit already set to 1 on the wire).
    pub first_angle: u16,
    /// Fixed-point angle of the last sample.
    pub last_angle: u16,
    /// On-wire checksum to verify against.
    pub checksum: u16,
}

impl PackageHeader {
    /// True if this package is the start of a new rotation.
    #[must_use]
    pub fn is_ring_start(&self) -> bool {
        self.ct & CT_RINGSTART_BIT != 0
    }

    /// Bytes in the body that should follow this header, given the current
    /// intensity-mode setting.
    #[must_use]
    pub fn body_len(&self, intensity_mode: bool) -> usize {
        let per_sample = if intensity_mode {
            INTENSITY_SAMPLE_BYTES
        } else {
            STANDARD_SAMPLE_BYTES
        };
        self.count as usize * per_sample
    }
}

/// XOR together `body` two bytes at a time (little-endian), as if it were a
/// sequence of `u16`s. An odd trailing byte is paired with a zero high byte.
fn xor_body_words(body: &[u8]) -> u16 {
    let mut acc = 0u16;
    let mut chunks = body.chunks_exact(2);
    for chunk in &mut chunks {
        acc ^= u16::from_le_bytes([chunk[0], chunk[1]]);
    }
    if let [last] = chunks.remainder() {
        acc ^= u16::from(*last);
    }
    acc
}

/// Compute the package checksum: seed with `PH ^ (ct<<8 | count)`,
/// XOR the first angle, XOR every 16-bit word of the body, XOR the last angle.
#[must_use]
pub fn compute_checksum(ct: u8, count: u8, first_angle: u16, last_angle: u16, body: &[u8]) -> u16 {
    let mut acc = PH ^ (u16::from(ct) << 8 | u16::from(count));
    acc ^= first_angle;
    acc ^= xor_body_words(body);
    acc ^= last_angle;
    acc
}

/// Build the body bytes for `count` standard-mode (distance-only) samples.
#[must_use]
pub fn build_standard_body(distances: &[u16]) -> Vec<u8> {
    let mut body = Vec::with_capacity(distances.len() * STANDARD_SAMPLE_BYTES);
    for &d in distances {
        body.extend_from_slice(&d.to_le_bytes());
    }
    body
}

/// Build the body bytes for `count` intensity-mode (quality, distance) samples.
#[must_use]
pub fn build_intensity_body(samples: &[(u8, u16)]) -> Vec<u8> {
    let mut body = Vec::with_capacity(samples.len() * INTENSITY_SAMPLE_BYTES);
    for &(q, d) in samples {
        body.push(q);
        body.extend_from_slice(&d.to_le_bytes());
    }
    body
}

/// Encode a full package (preamble, header, checksum, body) for test fixtures
/// and the mock transport. Never used against a real link — packages only
/// ever flow device-to-host.
#[must_use]
pub fn encode_package(ct: u8, first_angle: u16, last_angle: u16, body: &[u8], count: u8) -> Vec<u8> {
    let checksum = compute_checksum(ct, count, first_angle, last_angle, body);
    let mut out = Vec::with_capacity(8 + body.len());
    out.extend_from_slice(&PH.to_le_bytes());
    out.push(ct);
    out.push(count);
    out.extend_from_slice(&first_angle.to_le_bytes());
    out.extend_from_slice(&last_angle.to_le_bytes());
    out.extend_from_slice(&checksum.to_le_bytes());
    out.extend_from_slice(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_closure_standard() {
        let body = build_standard_body(&[4000, 8000, 12000, 16000]);
        let first_angle = 0x0101u16;
        let last_angle = 0x4D01u16;
        let checksum = compute_checksum(0, 4, first_angle, last_angle, &body);
        let encoded = encode_package(0, first_angle, last_angle, &body, 4);
        let got_checksum = u16::from_le_bytes([encoded[8], encoded[9]]);
        assert_eq!(got_checksum, checksum);
    }

    #[test]
    fn checksum_closure_intensity() {
        let body = build_intensity_body(&[(10, 1000), (20, 2000), (30, 3000)]);
        let checksum = compute_checksum(1, 3, 10, 200, &body);
        let encoded = encode_package(1, 10, 200, &body, 3);
        let got_checksum = u16::from_le_bytes([encoded[8], encoded[9]]);
        assert_eq!(got_checksum, checksum);
    }

    #[test]
    fn ring_start_bit() {
        let h = PackageHeader {
            ct: 1,
            count: 1,
            first_angle: 0,
            last_angle: 0,
            checksum: 0,
        };
        assert!(h.is_ring_start());
        let h2 = PackageHeader { ct: 0, ..h };
        assert!(!h2.is_ring_start());
    }

    #[test]
    fn body_len_depends_on_mode() {
        let h = PackageHeader {
            ct: 0,
            count: 5,
            first_angle: 0,
            last_angle: 0,
            checksum: 0,
        };
        assert_eq!(h.body_len(false), 10);
        assert_eq!(h.body_len(true), 15);
    }
}
