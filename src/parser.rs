//! Scan parser: byte-at-a-time package reassembly and per-sample emission.
//!
//! State-machine-as-enum-with-embedded-data, running counters for
//! accepted/rejected packages, and `trace!`/`debug!`/`warn!` logging at the
//! same granularity a bit-level HDLC deframer would use for its own framing.

use log::{debug, trace, warn};

use crate::node::{DEFAULT_QUALITY, Node, SyncFlag};
use crate::package::{PackageHeader, compute_checksum};

const DEGREES_FULL_CIRCLE_FIXED: i32 = 360 * 64;

#[derive(Default)]
enum State {
    #[default]
    AwaitPh1,
    AwaitPh2,
    Header(Vec<u8>),
    Body {
        header: PackageHeader,
        body: Vec<u8>,
        needed: usize,
    },
}

/// Maintains package-reassembly state across calls and converts each
/// verified package into its `Node`s.
pub struct ScanParser {
    state: State,
    intensity_mode: bool,
    /// Packages whose checksum verified.
    pub packages_ok: u64,
    /// Packages discarded due to checksum mismatch.
    pub packages_checksum_error: u64,
    /// Times framing was lost and the scanner had to hunt for the preamble again.
    pub resyncs: u64,
}

impl ScanParser {
    /// Create a parser for the given per-sample body layout.
    #[must_use]
    pub fn new(intensity_mode: bool) -> Self {
        Self {
            state: State::default(),
            intensity_mode,
            packages_ok: 0,
            packages_checksum_error: 0,
            resyncs: 0,
        }
    }

    /// Change the body layout. Should only be called between scans (the
    /// driver facade enforces "not while scanning"); resets any partial
    /// package in flight.
    pub fn set_intensity_mode(&mut self, intensity_mode: bool) {
        self.intensity_mode = intensity_mode;
        self.state = State::default();
    }

    /// Feed a chunk of bytes read from the link, returning every `Node`
    /// emitted by packages that completed (and checksummed correctly) within
    /// this chunk.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Node> {
        let mut out = Vec::new();
        for &b in bytes {
            self.feed_byte(b, &mut out);
        }
        out
    }

    fn feed_byte(&mut self, b: u8, out: &mut Vec<Node>) {
        self.state = match std::mem::take(&mut self.state) {
            State::AwaitPh1 => {
                if b == 0x55 {
                    State::AwaitPh2
                } else {
                    State::AwaitPh1
                }
            }
            State::AwaitPh2 => {
                if b == 0xAA {
                    trace!("ScanParser: preamble found");
                    State::Header(Vec::with_capacity(8))
                } else if b == 0x55 {
                    State::AwaitPh2
                } else {
                    self.resyncs += 1;
                    warn!("ScanParser: lost framing, resyncing");
                    State::AwaitPh1
                }
            }
            State::Header(mut buf) => {
                buf.push(b);
                if buf.len() < 8 {
                    State::Header(buf)
                } else {
                    let header = PackageHeader {
                        ct: buf[0],
                        count: buf[1],
                        first_angle: u16::from_le_bytes([buf[2], buf[3]]),
                        last_angle: u16::from_le_bytes([buf[4], buf[5]]),
                        checksum: u16::from_le_bytes([buf[6], buf[7]]),
                    };
                    let needed = header.body_len(self.intensity_mode);
                    if needed == 0 {
                        self.verify_and_emit(header, &[], out);
                        State::AwaitPh1
                    } else {
                        State::Body {
                            header,
                            body: Vec::with_capacity(needed),
                            needed,
                        }
                    }
                }
            }
            State::Body {
                header,
                mut body,
                needed,
            } => {
                body.push(b);
                if body.len() < needed {
                    State::Body {
                        header,
                        body,
                        needed,
                    }
                } else {
                    self.verify_and_emit(header, &body, out);
                    State::AwaitPh1
                }
            }
        };
    }

    fn verify_and_emit(&mut self, header: PackageHeader, body: &[u8], out: &mut Vec<Node>) {
        let checksum = compute_checksum(header.ct, header.count, header.first_angle, header.last_angle, body);
        if checksum == header.checksum {
            self.packages_ok += 1;
            debug!(
                "ScanParser: accepted package ct={:#x} count={}",
                header.ct, header.count
            );
            out.extend(emit_samples(&header, body, self.intensity_mode));
        } else {
            self.packages_checksum_error += 1;
            warn!(
                "ScanParser: checksum mismatch, want {:#06x} got {:#06x}, dropping package",
                checksum, header.checksum
            );
        }
    }
}

/// Convert one verified package into its samples.
fn emit_samples(header: &PackageHeader, body: &[u8], intensity_mode: bool) -> Vec<Node> {
    let count = header.count as usize;
    if count == 0 {
        return Vec::new();
    }
    let a_f = i32::from(header.first_angle >> 1);
    let mut a_l = i32::from(header.last_angle >> 1);
    if a_l < a_f {
        a_l += DEGREES_FULL_CIRCLE_FIXED;
    }

    let mut nodes = Vec::with_capacity(count);
    for i in 0..count {
        let interpolated = if count == 1 {
            a_f
        } else {
            a_f + (a_l - a_f) * i as i32 / (count as i32 - 1)
        };
        let angle_mod = interpolated.rem_euclid(DEGREES_FULL_CIRCLE_FIXED);

        let (quality, distance_fixed) = sample_at(body, i, intensity_mode);

        let angle_corrected = if distance_fixed > 0 {
            let correction = angle_correction_raw(f64::from(distance_fixed) / 4.0);
            (angle_mod - correction).rem_euclid(DEGREES_FULL_CIRCLE_FIXED)
        } else {
            angle_mod
        };

        let sync = if i == 0 && header.is_ring_start() {
            SyncFlag::Sync
        } else {
            SyncFlag::NotSync
        };
        nodes.push(Node::from_parts(
            quality,
            sync,
            angle_corrected as u16,
            angle_mod as u16,
            distance_fixed,
        ));
    }
    nodes
}

/// Pull the `i`th sample's (quality, distance_fixed) out of a verified body.
fn sample_at(body: &[u8], i: usize, intensity_mode: bool) -> (u8, u16) {
    if intensity_mode {
        let off = i * 3;
        let quality = body[off];
        let distance = u16::from_le_bytes([body[off + 1], body[off + 2]]);
        (quality, distance)
    } else {
        let off = i * 2;
        let distance = u16::from_le_bytes([body[off], body[off + 1]]);
        (DEFAULT_QUALITY, distance)
    }
}

/// Distance-dependent physical angle offset, in the same 1/64-degree fixed
/// unit as `angle_fixed`'s upper bits.
fn angle_correction_raw(distance_mm: f64) -> i32 {
    let correction_deg = (21.8 * (155.3 - distance_mm) / (155.3 * distance_mm)).atan().to_degrees();
    (correction_deg * 64.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{build_intensity_body, build_standard_body, encode_package};

    #[test]
    fn single_package_four_samples_no_intensity() {
        let body = build_standard_body(&[4000, 8000, 12000, 16000]);
        let first_angle = 0x0101u16; // 128.0125 deg (check bit set)
        let last_angle = 0x4D01u16;
        let pkg = encode_package(0, first_angle, last_angle, &body, 4);

        let mut parser = ScanParser::new(false);
        let nodes = parser.feed(&pkg);
        assert_eq!(nodes.len(), 4);
        assert_eq!(parser.packages_ok, 1);
        assert_eq!(parser.packages_checksum_error, 0);
        for (i, n) in nodes.iter().enumerate() {
            assert!(!n.is_sync(), "ct low bit unset, no node should be Sync");
            assert_eq!(n.distance_fixed, 4000 * (i as u16 + 1));
        }
    }

    #[test]
    fn ring_start_marks_only_first_sample_sync() {
        let body = build_standard_body(&[1000, 1000, 1000]);
        let pkg = encode_package(1, 0x0101, 0x4D01, &body, 3);
        let mut parser = ScanParser::new(false);
        let nodes = parser.feed(&pkg);
        assert_eq!(nodes.len(), 3);
        assert!(nodes[0].is_sync());
        assert!(!nodes[1].is_sync());
        assert!(!nodes[2].is_sync());
    }

    #[test]
    fn bad_checksum_dropped_and_resets_to_await_ph1() {
        let body = build_standard_body(&[4000, 8000, 12000, 16000]);
        let mut pkg = encode_package(0, 0x0101, 0x4D01, &body, 4);
        // flip a body byte after checksum has already been computed & written
        let body_start = 10;
        pkg[body_start] ^= 0xFF;

        let mut parser = ScanParser::new(false);
        let nodes = parser.feed(&pkg);
        assert!(nodes.is_empty());
        assert_eq!(parser.packages_checksum_error, 1);
        assert_eq!(parser.packages_ok, 0);

        // Parser must have returned to AwaitPH1: feeding a fresh, valid
        // package afterwards must still work.
        let pkg2 = encode_package(0, 0x0101, 0x4D01, &body, 4);
        let nodes2 = parser.feed(&pkg2);
        assert_eq!(nodes2.len(), 4);
    }

    #[test]
    fn framing_resync_skips_garbage() {
        let body = build_standard_body(&[1000, 2000]);
        let pkg = encode_package(0, 0x0101, 0x4D01, &body, 2);
        let mut garbage = vec![0xFFu8, 0xFF, 0x55, 0x55];
        garbage.extend_from_slice(&pkg);

        let mut parser = ScanParser::new(false);
        let nodes = parser.feed(&garbage);
        assert_eq!(nodes.len(), 2);
        assert!(parser.resyncs >= 1);
    }

    #[test]
    fn intensity_mode_uses_wire_quality() {
        let body = build_intensity_body(&[(5, 1000), (6, 2000)]);
        let pkg = encode_package(0, 0x0101, 0x4D01, &body, 2);
        let mut parser = ScanParser::new(true);
        let nodes = parser.feed(&pkg);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].quality(), 5);
        assert_eq!(nodes[1].quality(), 6);
    }

    #[test]
    fn no_return_sample_keeps_angle_uncorrected() {
        let body = build_standard_body(&[0]);
        let pkg = encode_package(0, 0x0101, 0x0101, &body, 1);
        let mut parser = ScanParser::new(false);
        let nodes = parser.feed(&pkg);
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].is_no_return());
        // first_angle raw = 0x0101 >> 1 = 128 => 128/64 = 2.0 deg, no correction applied
        assert_eq!(nodes[0].angle_deg(), 2.0);
    }

    #[test]
    fn angle_always_in_range() {
        // Wrap-around: last_angle raw < first_angle raw.
        let body = build_standard_body(&[500, 500, 500, 500]);
        let first_angle = (359 * 64) << 1 | 1;
        let last_angle = (1 * 64) << 1 | 1;
        let pkg = encode_package(0, first_angle as u16, last_angle as u16, &body, 4);
        let mut parser = ScanParser::new(false);
        let nodes = parser.feed(&pkg);
        assert_eq!(nodes.len(), 4);
        for n in &nodes {
            let deg = n.angle_deg();
            assert!((0.0..360.0).contains(&deg), "angle {deg} out of range");
        }
    }

    #[test]
    fn single_sample_package_uses_first_angle_directly() {
        let body = build_standard_body(&[0]);
        let angle_raw = 100u16;
        let first_angle = (angle_raw << 1) | 1;
        let pkg = encode_package(0, first_angle, first_angle, &body, 1);
        let mut parser = ScanParser::new(false);
        let nodes = parser.feed(&pkg);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].angle_raw(), angle_raw);
    }
}
