//! Core data types shared across the acquisition pipeline

mod imu;
mod lidar;
mod sample;

pub use imu::ImuReading;
pub use lidar::{LidarPacket, LidarPoint, POINTS_PER_PACKET};
pub use sample::{
    capture_now_ns, CalibrationSample, CalibrationStep, RunKind, StereoFrame, Timestamped,
};
