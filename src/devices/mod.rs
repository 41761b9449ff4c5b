//! Sensor devices: serial LiDAR and IMU readers, camera collaborator

pub mod camera;
pub mod imu;
pub mod lidar;

pub use camera::{CameraDevice, MockCamera};
pub use imu::ImuSensor;
pub use lidar::LidarSensor;
