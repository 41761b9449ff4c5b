//! Sankalan - acquisition pipeline for a Raspberry-Pi-hosted sensor rig
//!
//! Records synchronized calibration and field-scan datasets from a spinning
//! LiDAR, an IMU, and a stereo camera pair:
//!
//! - serial byte streams are framed and decoded by per-sensor reader threads
//! - each reader publishes into a single-slot latest-value cache, so slow
//!   consumers always see the freshest sample and producers never block
//! - the calibration sequencer runs timed, labeled collection phases
//! - the recording pipeline drains caches through bounded-latency queues
//!   into per-writer SQLite connections, with a graceful drain on shutdown

pub mod calibration;
pub mod config;
pub mod devices;
pub mod error;
pub mod mailbox;
pub mod pipeline;
pub mod storage;
pub mod transport;
pub mod types;

pub use calibration::{CalibrationConfig, CalibrationSequencer};
pub use config::SessionConfig;
pub use devices::{CameraDevice, ImuSensor, LidarSensor, MockCamera};
pub use error::{Error, Result};
pub use mailbox::LatestValueCache;
pub use pipeline::{AcquisitionPipeline, PipelineConfig, PipelineState};
pub use storage::StorageGateway;
