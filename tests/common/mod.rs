//! Shared fixtures for integration tests
//!
//! Each test binary uses its own subset of these helpers.
#![allow(dead_code)]

use sankalan::devices::lidar::{HEADER, PACKET_SIZE, POINT_COUNT_MARKER};
use sankalan::transport::{MockTransport, Transport, TransportFactory};
use sankalan::types::POINTS_PER_PACKET;

/// Build a valid 47-byte LiDAR packet from decoded-domain values
pub fn build_packet(
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
    raw[46] = 0x00; // CRC byte, not validated
    raw
}

/// One IMU JSON line with the given device time
pub fn imu_line(t: f64) -> String {
    format!(
        "{{\"t\": {}, \"acc\": [0.0, 0.1, 9.8], \"gyro\": [0.01, 0.0, -0.02]}}\n",
        t
    )
}

/// Factory handing out clones of one shared mock transport
pub fn factory_for(transport: &MockTransport) -> TransportFactory {
    let transport = transport.clone();
    Box::new(move || Ok(Box::new(transport.clone()) as Box<dyn Transport>))
}
