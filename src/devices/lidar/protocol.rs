//! LD-series LiDAR wire protocol
//!
//! Packet format (47 bytes, little-endian fixed-point):
//! - Header (1 byte): 0x54
//! - Point-count marker (1 byte): 0x2C (12 points)
//! - Rotational speed (2 bytes): deg/s * 100
//! - Start angle (2 bytes): deg * 100
//! - 12 measurements (3 bytes each): distance mm (2 bytes) + intensity (1 byte)
//! - End angle (2 bytes): deg * 100
//! - Device timestamp (2 bytes): ms
//! - CRC (1 byte): not validated
//!
//! The stream carries no delimiter other than the header byte, which can also
//! appear inside payloads, so framing must recover by single-byte advances.

use super::ring_buffer::RingBuffer;
use crate::error::{Error, Result};
use crate::types::{LidarPacket, LidarPoint, POINTS_PER_PACKET};

/// Packet header byte
pub const HEADER: u8 = 0x54;
/// Constant point-count marker at offset 1
pub const POINT_COUNT_MARKER: u8 = 0x2C;
/// Total packet size: 1-byte header + 46-byte payload
pub const PACKET_SIZE: usize = 47;

/// Decode one packet-sized window.
///
/// Validates the header and the point-count marker; a failure here costs the
/// caller exactly one byte of buffer (resynchronization), so the checks are
/// deliberately cheap.
pub fn decode_packet(raw: &[u8]) -> Result<LidarPacket> {
    if raw.len() != PACKET_SIZE {
        return Err(Error::Framing("bad packet length"));
    }
    if raw[0] != HEADER {
        return Err(Error::Framing("bad packet header"));
    }
    if raw[1] != POINT_COUNT_MARKER {
        return Err(Error::Framing("bad point-count marker"));
    }

    let speed_deg_per_sec = u16::from_le_bytes([raw[2], raw[3]]) as f64 / 100.0;
    let start_angle_deg = u16::from_le_bytes([raw[4], raw[5]]) as f64 / 100.0;
    let raw_end_angle_deg = u16::from_le_bytes([raw[42], raw[43]]) as f64 / 100.0;
    let sensor_timestamp_sec = u16::from_le_bytes([raw[44], raw[45]]) as f64 / 1000.0;

    // Unwrap the end angle past 360 when the arc crosses zero, interpolate
    // point angles evenly across [start, end), then re-wrap.
    let end_unwrapped = if raw_end_angle_deg < start_angle_deg {
        raw_end_angle_deg + 360.0
    } else {
        raw_end_angle_deg
    };
    let angle_step = (end_unwrapped - start_angle_deg) / (POINTS_PER_PACKET - 1) as f64;

    let mut points = Vec::with_capacity(POINTS_PER_PACKET);
    for i in 0..POINTS_PER_PACKET {
        let off = 6 + i * 3;
        let distance_m = u16::from_le_bytes([raw[off], raw[off + 1]]) as f64 / 1000.0;
        let intensity = raw[off + 2];
        let angle_deg = (start_angle_deg + i as f64 * angle_step) % 360.0;
        points.push(LidarPoint {
            angle_deg,
            distance_m,
            intensity,
        });
    }

    Ok(LidarPacket {
        speed_deg_per_sec,
        start_angle_deg,
        end_angle_deg: if end_unwrapped < 360.0 {
            end_unwrapped
        } else {
            end_unwrapped - 360.0
        },
        sensor_timestamp_sec,
        points,
    })
}

/// Rolling-buffer framer turning an arbitrary byte stream into packets.
///
/// Feed it raw reads with [`extend`](Self::extend), then drain decoded
/// packets with [`poll`](Self::poll). Dropped bytes, partial reads and loss
/// of framing are recovered by scanning for the header byte and, on a bad
/// window, advancing exactly one byte - never a whole packet width.
pub struct FrameAssembler {
    buffer: RingBuffer<4096>,
}

impl FrameAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self {
            buffer: RingBuffer::new(),
        }
    }

    /// Append raw bytes from the link
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Try to extract the next packet.
    ///
    /// Returns `None` when the buffer holds no complete, valid packet yet;
    /// call again after the next [`extend`](Self::extend).
    pub fn poll(&mut self) -> Option<LidarPacket> {
        while self.buffer.len() >= PACKET_SIZE {
            match self.buffer.find_byte(HEADER) {
                None => {
                    // No header anywhere: keep only a partial-prefix worth of
                    // trailing bytes for future data.
                    let drop = self.buffer.len() - (PACKET_SIZE - 1);
                    self.buffer.advance(drop);
                    return None;
                }
                Some(offset) if offset > 0 => {
                    self.buffer.advance(offset);
                    continue;
                }
                Some(_) => {
                    let window = self.buffer.window(0, PACKET_SIZE)?;
                    match decode_packet(window) {
                        Ok(packet) => {
                            self.buffer.advance(PACKET_SIZE);
                            return Some(packet);
                        }
                        Err(_) => {
                            // Spurious header byte; resynchronize one byte at
                            // a time.
                            self.buffer.advance(1);
                        }
                    }
                }
            }
        }
        None
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a valid packet from decoded-domain values
    fn build_packet(
        speed: f64,
        start_deg: f64,
        end_deg: f64,
        ts_sec: f64,
        distance_m: f64,
        intensity: u8,
    ) -> [u8; PACKET_SIZE] {
        let mut raw = [0u8; PACKET_SIZE];
        raw[0] = HEADER;
        raw[1] = POINT_COUNT_MARKER;
        raw[2..4].copy_from_slice(&((speed * 100.0) as u16).to_le_bytes());
        raw[4..6].copy_from_slice(&((start_deg * 100.0) as u16).to_le_bytes());
        for i in 0..POINTS_PER_PACKET {
            let off = 6 + i * 3;
            raw[off..off + 2].copy_from_slice(&((distance_m * 1000.0) as u16).to_le_bytes());
            raw[off + 2] = intensity;
        }
        raw[42..44].copy_from_slice(&((end_deg * 100.0) as u16).to_le_bytes());
        raw[44..46].copy_from_slice(&((ts_sec * 1000.0) as u16).to_le_bytes());
        raw[46] = 0xA7; // CRC byte, not validated
        raw
    }

    #[test]
    fn test_decode_interpolates_angles() {
        let raw = build_packet(360.0, 10.0, 20.0, 1.234, 1.0, 100);
        let packet = decode_packet(&raw).unwrap();

        assert_eq!(packet.speed_deg_per_sec, 360.0);
        assert_eq!(packet.start_angle_deg, 10.0);
        assert_eq!(packet.end_angle_deg, 20.0);
        assert!((packet.sensor_timestamp_sec - 1.234).abs() < 1e-9);
        assert_eq!(packet.points.len(), POINTS_PER_PACKET);

        // Step = (20 - 10) / 11
        let step = 10.0 / 11.0;
        for (i, point) in packet.points.iter().enumerate() {
            assert!((point.angle_deg - (10.0 + i as f64 * step)).abs() < 1e-9);
            assert!((point.distance_m - 1.0).abs() < 1e-9);
            assert_eq!(point.intensity, 100);
        }
        assert!((packet.points[11].angle_deg - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_decode_unwraps_zero_crossing() {
        let raw = build_packet(360.0, 355.0, 5.0, 0.5, 2.0, 50);
        let packet = decode_packet(&raw).unwrap();

        assert_eq!(packet.start_angle_deg, 355.0);
        assert_eq!(packet.end_angle_deg, 5.0);

        // Angles are non-decreasing modulo 360 across the arc
        let step = 10.0 / 11.0;
        assert!((packet.points[5].angle_deg - (355.0 + 5.0 * step)).abs() < 1e-9);
        assert!((packet.points[11].angle_deg - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_decode_rejects_bad_marker() {
        let mut raw = build_packet(360.0, 0.0, 30.0, 0.0, 1.0, 0);
        raw[1] = 0x1C;
        assert!(matches!(decode_packet(&raw), Err(Error::Framing(_))));
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        let raw = build_packet(360.0, 0.0, 30.0, 0.0, 1.0, 0);
        assert!(decode_packet(&raw[..46]).is_err());
    }

    #[test]
    fn test_assembler_recovers_packets_between_garbage() {
        let mut assembler = FrameAssembler::new();
        let first = build_packet(360.0, 0.0, 30.0, 0.100, 1.0, 10);
        let second = build_packet(360.0, 30.0, 60.0, 0.200, 2.0, 20);

        assembler.extend(&[0x00, 0x11, 0x22, 0x33]);
        assembler.extend(&first);
        assembler.extend(&[0xDE, 0xAD, 0xBE, 0xEF, 0x99]);
        assembler.extend(&second);

        let got_first = loop {
            if let Some(p) = assembler.poll() {
                break p;
            }
        };
        assert!((got_first.sensor_timestamp_sec - 0.100).abs() < 1e-9);

        let got_second = loop {
            if let Some(p) = assembler.poll() {
                break p;
            }
        };
        assert!((got_second.sensor_timestamp_sec - 0.200).abs() < 1e-9);
        assert!(assembler.poll().is_none());
    }

    #[test]
    fn test_assembler_resyncs_past_stray_header() {
        let mut assembler = FrameAssembler::new();
        let packet = build_packet(360.0, 90.0, 120.0, 0.300, 1.5, 77);

        // Garbage containing a stray header byte followed by a non-marker
        // byte: the bad window is rejected and resync costs single-byte
        // advances, not the following packet.
        assembler.extend(&[0x54, 0x00, 0x01, 0x02]);
        assembler.extend(&packet);

        let got = loop {
            if let Some(p) = assembler.poll() {
                break p;
            }
        };
        assert!((got.sensor_timestamp_sec - 0.300).abs() < 1e-9);
    }

    #[test]
    fn test_assembler_handles_split_packet() {
        let mut assembler = FrameAssembler::new();
        let packet = build_packet(360.0, 0.0, 30.0, 0.400, 1.0, 1);

        assembler.extend(&packet[..20]);
        assert!(assembler.poll().is_none());
        assembler.extend(&packet[20..]);
        assert!(assembler.poll().is_some());
    }

    #[test]
    fn test_assembler_trims_headerless_garbage() {
        let mut assembler = FrameAssembler::new();
        // 100 bytes with no header byte anywhere
        assembler.extend(&[0xAA; 100]);
        assert!(assembler.poll().is_none());

        // Only a packet-minus-one prefix is retained, so a following packet
        // still decodes promptly.
        let packet = build_packet(360.0, 0.0, 30.0, 0.500, 1.0, 1);
        assembler.extend(&packet);
        let got = loop {
            if let Some(p) = assembler.poll() {
                break p;
            }
        };
        assert!((got.sensor_timestamp_sec - 0.500).abs() < 1e-9);
    }
}
