//! Session configuration
//!
//! Loaded from a TOML file; every table has rig defaults so a bare
//! invocation works on the reference hardware. CLI flags override the
//! session/hardware fields after loading.

use crate::calibration::CalibrationConfig;
use crate::error::Result;
use crate::pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub session: SessionInfo,
    pub hardware: HardwareConfig,
    /// Stereo camera collaborator settings; absent means the pipeline runs
    /// its LiDAR/IMU lanes only
    pub camera: Option<CameraConfig>,
    pub calibration: CalibrationTiming,
    pub pipeline: PipelineTiming,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Session naming
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionInfo {
    /// Session name; also the session directory name (no spaces)
    pub name: String,
    /// Free-form description stored with the run metadata
    pub description: String,
}

/// Serial ports for the two sensors
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Spinning LiDAR serial port
    pub lidar_port: String,
    /// LiDAR baud rate
    pub lidar_baud: u32,
    /// IMU serial port
    pub imu_port: String,
    /// IMU baud rate
    pub imu_baud: u32,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            lidar_port: "/dev/ttyUSB0".to_string(),
            lidar_baud: 230_400,
            imu_port: "/dev/ttyACM0".to_string(),
            imu_baud: 115_200,
        }
    }
}

/// Camera collaborator configuration (passed through to the collaborator;
/// capture itself lives outside this crate)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Left camera device index
    pub left_index: u32,
    /// Right camera device index
    pub right_index: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            left_index: 2,
            right_index: 0,
        }
    }
}

/// Calibration phase timing, seconds/milliseconds as written in TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CalibrationTiming {
    pub sync_duration_s: f64,
    pub still_duration_s: f64,
    pub rotate_duration_s: f64,
    pub countdown_s: f64,
    pub still_countdown_s: f64,
    pub poll_interval_ms: u64,
}

impl Default for CalibrationTiming {
    fn default() -> Self {
        Self {
            sync_duration_s: 5.0,
            still_duration_s: 20.0,
            rotate_duration_s: 3.0,
            countdown_s: 3.0,
            still_countdown_s: 20.0,
            poll_interval_ms: 5,
        }
    }
}

impl CalibrationTiming {
    /// Convert to the sequencer's config
    pub fn to_config(&self) -> CalibrationConfig {
        CalibrationConfig {
            sync_duration: Duration::from_secs_f64(self.sync_duration_s),
            still_duration: Duration::from_secs_f64(self.still_duration_s),
            rotate_duration: Duration::from_secs_f64(self.rotate_duration_s),
            countdown: Duration::from_secs_f64(self.countdown_s),
            still_countdown: Duration::from_secs_f64(self.still_countdown_s),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

/// Pipeline loop timing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineTiming {
    pub producer_interval_ms: u64,
    pub writer_timeout_ms: u64,
}

impl Default for PipelineTiming {
    fn default() -> Self {
        Self {
            producer_interval_ms: 10,
            writer_timeout_ms: 100,
        }
    }
}

impl PipelineTiming {
    /// Convert to the pipeline's config
    pub fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            producer_interval: Duration::from_millis(self.producer_interval_ms),
            writer_timeout: Duration::from_millis(self.writer_timeout_ms),
        }
    }
}

/// Where session data lands
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory; each session gets a subdirectory named after it
    pub output_dir: String,
    /// Database file name inside the session directory
    pub db_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: "/media/admin/rig-data".to_string(),
            db_file: "data.db".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| crate::error::Error::Other(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session: SessionInfo::default(),
            hardware: HardwareConfig::default(),
            camera: None,
            calibration: CalibrationTiming::default(),
            pipeline: PipelineTiming::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
