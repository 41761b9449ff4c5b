//! LiDAR packet types

/// Number of range/intensity samples carried by one packet
pub const POINTS_PER_PACKET: usize = 12;

/// A single LiDAR measurement point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LidarPoint {
    /// Angle in degrees, [0, 360)
    pub angle_deg: f64,
    /// Distance in meters
    pub distance_m: f64,
    /// Signal intensity (0-255)
    pub intensity: u8,
}

/// One decoded LiDAR transmission covering a sub-arc of rotation
///
/// Angles of the 12 points are evenly interpolated across
/// `[start_angle_deg, end_angle_deg)` and are non-decreasing modulo 360
/// within the packet.
#[derive(Debug, Clone, PartialEq)]
pub struct LidarPacket {
    /// Rotational speed in degrees per second
    pub speed_deg_per_sec: f64,
    /// Start angle of the arc in degrees, [0, 360)
    pub start_angle_deg: f64,
    /// End angle of the arc in degrees, [0, 360)
    pub end_angle_deg: f64,
    /// Device clock at packet emission, seconds (wraps; used for duplicate
    /// detection, not for ordering)
    pub sensor_timestamp_sec: f64,
    /// Exactly 12 measurement points
    pub points: Vec<LidarPoint>,
}
