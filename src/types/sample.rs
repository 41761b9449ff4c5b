//! Capture-clock stamped samples and calibration records

use super::{ImuReading, LidarPacket};
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds since the epoch at the point of capture.
///
/// All sensors are reconciled against this single capture clock; device
/// clocks ride along inside the payloads.
pub fn capture_now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// A payload stamped with the capture clock
#[derive(Debug, Clone, PartialEq)]
pub struct Timestamped<T> {
    /// Capture clock at the moment the payload was observed, ns since epoch
    pub capture_ns: i64,
    /// The sensor payload
    pub payload: T,
}

impl<T> Timestamped<T> {
    /// Stamp a payload with the current capture clock
    pub fn now(payload: T) -> Self {
        Self {
            capture_ns: capture_now_ns(),
            payload,
        }
    }
}

/// One sample recorded during a calibration phase.
///
/// The sync phase records joint samples where either source may have been
/// silent that cycle; the still/rotate phases record IMU-only samples.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationSample {
    /// Latest packet from each sensor during the sync phase; at least one
    /// side is present
    Joint {
        lidar: Option<LidarPacket>,
        imu: Option<ImuReading>,
    },
    /// IMU-only sample from the still/rotate phases
    Imu(ImuReading),
}

/// A timed, labeled data-collection window within a calibration run
#[derive(Debug, Clone)]
pub struct CalibrationStep {
    /// Phase label ("sync", "still", "rotate")
    pub label: &'static str,
    /// Capture clock at the first sample, ns
    pub start_ns: i64,
    /// Capture clock at the last sample, ns
    pub end_ns: i64,
    /// Samples in capture order
    pub samples: Vec<Timestamped<CalibrationSample>>,
}

impl CalibrationStep {
    /// Build a step from collected samples, deriving the window bounds from
    /// the first and last capture stamps
    pub fn from_samples(label: &'static str, samples: Vec<Timestamped<CalibrationSample>>) -> Self {
        let start_ns = samples.first().map(|s| s.capture_ns).unwrap_or(0);
        let end_ns = samples.last().map(|s| s.capture_ns).unwrap_or(start_ns);
        Self {
            label,
            start_ns,
            end_ns,
            samples,
        }
    }
}

/// What a persisted run contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// Timed, labeled calibration phases
    Calibration,
    /// Free-running field scan
    Scan,
}

impl RunKind {
    /// Stable string stored in the run-metadata table
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Calibration => "calibration",
            RunKind::Scan => "scan",
        }
    }
}

/// One stereo frame pair from the camera collaborator.
///
/// Frame timestamps are assigned by the pipeline, not the camera; the frames
/// are already encoded for disk.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoFrame {
    /// Encoded left image
    pub left: Vec<u8>,
    /// Encoded right image
    pub right: Vec<u8>,
}
