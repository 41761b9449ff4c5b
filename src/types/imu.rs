//! IMU data types

use serde::Deserialize;

/// One IMU record as reported over the serial link
///
/// The device emits one JSON object per line:
/// `{"t": <s>, "acc": [x,y,z], "gyro": [x,y,z], "mag": [x,y,z]?, "error": <str>?}`.
/// Records carrying an `error` field are device-reported faults and are
/// dropped by the reader before they reach this type's consumers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImuReading {
    /// Device clock at measurement, seconds
    #[serde(rename = "t")]
    pub device_time_sec: f64,
    /// Accelerometer [x, y, z] (m/s²)
    pub acc: [f64; 3],
    /// Gyroscope [x, y, z] (rad/s)
    pub gyro: [f64; 3],
    /// Magnetometer [x, y, z] (μT), absent on boards without one
    #[serde(default)]
    pub mag: Option<[f64; 3]>,
    /// Device-reported fault message, if any
    #[serde(default)]
    pub error: Option<String>,
}

impl ImuReading {
    /// True when the record is a device-reported fault rather than data
    pub fn is_fault(&self) -> bool {
        self.error.is_some()
    }
}
