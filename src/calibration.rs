//! Calibration sequencer
//!
//! Runs three fixed, ordered data-collection phases, each preceded by an
//! operator countdown:
//!
//! 1. **sync** - joint LiDAR+IMU samples, for clock reconciliation
//! 2. **still** - IMU only, device resting on a surface (bias)
//! 3. **rotate** - IMU only, device turned through all orientations
//!
//! Both sensors are acquired before phase 1 and released after phase 3 on
//! every exit path, including an operator interrupt mid-phase; the release
//! is scoped around the whole sequence, not per phase.

use crate::devices::{ImuSensor, LidarSensor};
use crate::error::{Error, Result};
use crate::types::{capture_now_ns, CalibrationSample, CalibrationStep, Timestamped};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Phase durations and countdowns
#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    /// Joint-sampling phase duration
    pub sync_duration: Duration,
    /// Still-phase duration
    pub still_duration: Duration,
    /// Rotate-phase duration
    pub rotate_duration: Duration,
    /// Countdown before the sync and rotate phases
    pub countdown: Duration,
    /// Longer countdown before the still phase, giving the operator time to
    /// place the device
    pub still_countdown: Duration,
    /// Cache polling interval; slightly shorter than the shortest expected
    /// packet interval
    pub poll_interval: Duration,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            sync_duration: Duration::from_secs(5),
            still_duration: Duration::from_secs(20),
            rotate_duration: Duration::from_secs(3),
            countdown: Duration::from_secs(3),
            still_countdown: Duration::from_secs(20),
            poll_interval: Duration::from_millis(5),
        }
    }
}

/// Orchestrates the three timed calibration phases
pub struct CalibrationSequencer {
    config: CalibrationConfig,
}

impl CalibrationSequencer {
    /// Sequencer with the given phase timing
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// Run the full three-phase sequence.
    ///
    /// Connects both sensors, collects the labeled sample groups, and
    /// disconnects both sensors exactly once no matter how the sequence
    /// ends. The `stop` flag aborts between polls with [`Error::Interrupted`].
    pub fn run(
        &self,
        lidar: &mut LidarSensor,
        imu: &mut ImuSensor,
        stop: &AtomicBool,
    ) -> Result<Vec<CalibrationStep>> {
        log::info!("=== Starting calibration sequence ===");
        lidar.connect()?;
        if let Err(e) = imu.connect() {
            lidar.disconnect();
            return Err(e);
        }

        let result = self.run_phases(lidar, imu, stop);

        lidar.disconnect();
        imu.disconnect();
        match &result {
            Ok(steps) => log::info!(
                "Calibration complete: {} steps",
                steps.len()
            ),
            Err(e) => log::warn!("Calibration aborted: {}", e),
        }
        result
    }

    fn run_phases(
        &self,
        lidar: &LidarSensor,
        imu: &ImuSensor,
        stop: &AtomicBool,
    ) -> Result<Vec<CalibrationStep>> {
        self.countdown(
            "Step 1: collecting synchronized LiDAR + IMU data",
            self.config.countdown,
            stop,
        )?;
        let sync = self.collect_joint(lidar, imu, stop)?;
        log::info!("Collected {} joint samples", sync.len());

        self.countdown(
            "Step 2: place the device firmly on a surface",
            self.config.still_countdown,
            stop,
        )?;
        let still = self.collect_imu_only(imu, self.config.still_duration, stop)?;
        log::info!("Collected {} still samples", still.len());

        self.countdown(
            "Step 3: rotate the device in all directions",
            self.config.countdown,
            stop,
        )?;
        let rotate = self.collect_imu_only(imu, self.config.rotate_duration, stop)?;
        log::info!("Collected {} rotate samples", rotate.len());

        Ok(vec![
            CalibrationStep::from_samples("sync", sync),
            CalibrationStep::from_samples("still", still),
            CalibrationStep::from_samples("rotate", rotate),
        ])
    }

    /// Operator countdown with per-second feedback; interrupt-aware
    fn countdown(&self, message: &str, wait: Duration, stop: &AtomicBool) -> Result<()> {
        log::info!("{}", message);
        let mut remaining = wait;
        while !remaining.is_zero() {
            if stop.load(Ordering::Relaxed) {
                return Err(Error::Interrupted);
            }
            if remaining >= Duration::from_secs(1) {
                log::info!("  starting in {} s", remaining.as_secs());
            }
            let tick = remaining.min(Duration::from_secs(1));
            thread::sleep(tick);
            remaining -= tick;
        }
        log::info!("  collecting calibration data");
        Ok(())
    }

    /// Phase 1: poll both caches; record a joint sample whenever either
    /// source yielded a value this cycle
    fn collect_joint(
        &self,
        lidar: &LidarSensor,
        imu: &ImuSensor,
        stop: &AtomicBool,
    ) -> Result<Vec<Timestamped<CalibrationSample>>> {
        let mut samples = Vec::new();
        let deadline = Instant::now() + self.config.sync_duration;

        while Instant::now() < deadline {
            if stop.load(Ordering::Relaxed) {
                return Err(Error::Interrupted);
            }
            let capture_ns = capture_now_ns();
            let lidar_packet = lidar.take_latest().map(|s| s.payload);
            let imu_reading = imu.take_latest().map(|s| s.payload);

            if lidar_packet.is_some() || imu_reading.is_some() {
                samples.push(Timestamped {
                    capture_ns,
                    payload: CalibrationSample::Joint {
                        lidar: lidar_packet,
                        imu: imu_reading,
                    },
                });
            }
            thread::sleep(self.config.poll_interval);
        }
        Ok(samples)
    }

    /// Phases 2 and 3: poll the IMU cache only
    fn collect_imu_only(
        &self,
        imu: &ImuSensor,
        duration: Duration,
        stop: &AtomicBool,
    ) -> Result<Vec<Timestamped<CalibrationSample>>> {
        let mut samples = Vec::new();
        let deadline = Instant::now() + duration;

        while Instant::now() < deadline {
            if stop.load(Ordering::Relaxed) {
                return Err(Error::Interrupted);
            }
            let capture_ns = capture_now_ns();
            if let Some(reading) = imu.take_latest() {
                samples.push(Timestamped {
                    capture_ns,
                    payload: CalibrationSample::Imu(reading.payload),
                });
            }
            thread::sleep(self.config.poll_interval);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, Transport};

    fn mock_factory(transport: MockTransport) -> crate::transport::TransportFactory {
        Box::new(move || Ok(Box::new(transport.clone()) as Box<dyn Transport>))
    }

    #[test]
    fn test_interrupt_before_first_phase_releases_sensors() {
        let mut lidar = LidarSensor::with_transport_factory(mock_factory(MockTransport::new()));
        let mut imu = ImuSensor::with_transport_factory(mock_factory(MockTransport::new()));
        let stop = AtomicBool::new(true);

        let sequencer = CalibrationSequencer::new(CalibrationConfig::default());
        let result = sequencer.run(&mut lidar, &mut imu, &stop);

        assert!(matches!(result, Err(Error::Interrupted)));
        assert!(!lidar.is_connected());
        assert!(!imu.is_connected());
    }

    #[test]
    fn test_failed_imu_connect_releases_lidar() {
        let mut lidar = LidarSensor::with_transport_factory(mock_factory(MockTransport::new()));
        let mut imu = ImuSensor::with_transport_factory(Box::new(|| {
            Err(Error::Other("no such port".into()))
        }));
        let stop = AtomicBool::new(false);

        let sequencer = CalibrationSequencer::new(CalibrationConfig::default());
        let result = sequencer.run(&mut lidar, &mut imu, &stop);

        assert!(result.is_err());
        assert!(!lidar.is_connected());
        assert!(!imu.is_connected());
    }
}
