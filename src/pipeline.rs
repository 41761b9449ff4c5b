//! Steady-state concurrent recording pipeline
//!
//! One producer loop per sensor type drains the latest-value caches (and the
//! camera collaborator) into FIFO queues; one writer loop per sensor type
//! drains its queue into storage through a connection it owns exclusively.
//! The stop signal is cooperative: producers quit immediately, writers keep
//! draining until their queue is observed empty, so no already-enqueued
//! sample is lost.

use crate::devices::{CameraDevice, ImuSensor, LidarSensor};
use crate::error::Result;
use crate::mailbox::LatestValueCache;
use crate::storage::StorageGateway;
use crate::types::{ImuReading, LidarPacket, StereoFrame, Timestamped};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Pipeline lifecycle; `Closed` is reached only after every writer has
/// emptied its queue and every sensor connection has been released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Connected,
    Recording,
    Draining,
    Closed,
}

/// Loop timing
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Producer polling cadence
    pub producer_interval: Duration,
    /// Writer dequeue timeout; bounds how long a writer can go without
    /// observing the stop signal
    pub writer_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            producer_interval: Duration::from_millis(10),
            writer_timeout: Duration::from_millis(100),
        }
    }
}

/// Concurrent multi-sensor recorder for one scan run
pub struct AcquisitionPipeline {
    config: PipelineConfig,
    db_path: PathBuf,
    image_dir: PathBuf,
    state: Arc<Mutex<PipelineState>>,
}

impl AcquisitionPipeline {
    /// Pipeline writing to the session database, with stereo frames saved
    /// under `image_dir`
    pub fn new<P: AsRef<Path>>(db_path: P, image_dir: P, config: PipelineConfig) -> Self {
        Self {
            config,
            db_path: db_path.as_ref().to_path_buf(),
            image_dir: image_dir.as_ref().to_path_buf(),
            state: Arc::new(Mutex::new(PipelineState::Idle)),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    fn set_state(&self, state: PipelineState) {
        log::debug!("Pipeline: state -> {:?}", state);
        *self.state.lock() = state;
    }

    /// Record until the stop signal is raised, then drain and release.
    ///
    /// Connects all sensors (a connect failure releases whatever was already
    /// acquired and surfaces hard), records, and on stop drains every writer
    /// queue before disconnecting and reporting `Closed`.
    pub fn run(
        &self,
        run_id: i64,
        lidar: &mut LidarSensor,
        imu: &mut ImuSensor,
        mut camera: Option<&mut dyn CameraDevice>,
        stop: &AtomicBool,
    ) -> Result<()> {
        lidar.connect()?;
        if let Err(e) = imu.connect() {
            lidar.disconnect();
            return Err(e);
        }
        if let Some(cam) = camera.as_deref_mut() {
            if let Err(e) = cam.connect() {
                lidar.disconnect();
                imu.disconnect();
                return Err(e);
            }
        }
        self.set_state(PipelineState::Connected);

        let result = self.record(run_id, lidar, imu, camera.as_deref_mut(), stop);

        lidar.disconnect();
        imu.disconnect();
        if let Some(cam) = camera {
            cam.disconnect();
        }
        self.set_state(PipelineState::Closed);
        log::info!("Pipeline: closed");
        result
    }

    fn record(
        &self,
        run_id: i64,
        lidar: &LidarSensor,
        imu: &ImuSensor,
        camera: Option<&mut (dyn CameraDevice + '_)>,
        stop: &AtomicBool,
    ) -> Result<()> {
        // Each writer owns its connection for its whole lifetime; open them
        // up front so failures surface before any thread starts.
        let lidar_store = StorageGateway::open(&self.db_path)?;
        let imu_store = StorageGateway::open(&self.db_path)?;
        let cam_store = match camera {
            Some(_) => {
                fs::create_dir_all(&self.image_dir)?;
                Some(StorageGateway::open(&self.db_path)?)
            }
            None => None,
        };

        let (lidar_tx, lidar_rx) = unbounded::<Timestamped<LidarPacket>>();
        let (imu_tx, imu_rx) = unbounded::<Timestamped<ImuReading>>();
        let (cam_tx, cam_rx) = unbounded::<Timestamped<StereoFrame>>();

        let lidar_cache = lidar.cache();
        let imu_cache = imu.cache();
        let interval = self.config.producer_interval;
        let timeout = self.config.writer_timeout;
        let image_dir = self.image_dir.clone();

        self.set_state(PipelineState::Recording);
        log::info!("Pipeline: recording (run {})", run_id);

        thread::scope(|s| {
            s.spawn(|| lidar_producer(lidar_cache, lidar_tx, stop, interval));
            s.spawn(|| imu_producer(imu_cache, imu_tx, stop, interval));
            match camera {
                Some(cam) => {
                    s.spawn(move || camera_producer(cam, cam_tx, stop, interval));
                }
                None => drop(cam_tx),
            }

            s.spawn(move || lidar_writer(lidar_rx, lidar_store, run_id, stop, timeout));
            s.spawn(move || imu_writer(imu_rx, imu_store, run_id, stop, timeout));
            if let Some(store) = cam_store {
                s.spawn(move || camera_writer(cam_rx, store, run_id, image_dir, stop, timeout));
            } else {
                drop(cam_rx);
            }

            // Producers observe the stop signal themselves; this thread just
            // marks the transition for observers.
            while !stop.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(20));
            }
            self.set_state(PipelineState::Draining);
            log::info!("Pipeline: stop observed, draining writers");
        });

        Ok(())
    }
}

/// LiDAR producer: forward the latest packet unless it repeats the previous
/// device timestamp (the duplicate filter for re-reads of the same physical
/// packet)
fn lidar_producer(
    cache: LatestValueCache<Timestamped<LidarPacket>>,
    tx: Sender<Timestamped<LidarPacket>>,
    stop: &AtomicBool,
    interval: Duration,
) {
    let mut last_device_ts: Option<f64> = None;
    while !stop.load(Ordering::Relaxed) {
        if let Some(sample) = cache.take() {
            let device_ts = sample.payload.sensor_timestamp_sec;
            if last_device_ts != Some(device_ts) {
                last_device_ts = Some(device_ts);
                if tx.send(sample).is_err() {
                    break;
                }
            }
        }
        thread::sleep(interval);
    }
}

fn imu_producer(
    cache: LatestValueCache<Timestamped<ImuReading>>,
    tx: Sender<Timestamped<ImuReading>>,
    stop: &AtomicBool,
    interval: Duration,
) {
    while !stop.load(Ordering::Relaxed) {
        if let Some(sample) = cache.take() {
            if tx.send(sample).is_err() {
                break;
            }
        }
        thread::sleep(interval);
    }
}

/// Camera producer: synchronous capture each cycle; a failed capture skips
/// that cycle only
fn camera_producer(
    camera: &mut dyn CameraDevice,
    tx: Sender<Timestamped<StereoFrame>>,
    stop: &AtomicBool,
    interval: Duration,
) {
    while !stop.load(Ordering::Relaxed) {
        match camera.capture() {
            Ok(frame) => {
                if tx.send(Timestamped::now(frame)).is_err() {
                    break;
                }
            }
            Err(e) => log::debug!("Camera: capture skipped: {}", e),
        }
        thread::sleep(interval);
    }
}

/// Drain condition shared by all writers: keep dequeuing until the stop
/// signal is up AND the queue is observed empty (or all producers are gone
/// and the channel is drained)
fn writer_loop<T>(
    rx: Receiver<T>,
    stop: &AtomicBool,
    timeout: Duration,
    mut persist: impl FnMut(T),
) {
    loop {
        match rx.recv_timeout(timeout) {
            Ok(item) => persist(item),
            Err(RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::Relaxed) && rx.is_empty() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn lidar_writer(
    rx: Receiver<Timestamped<LidarPacket>>,
    mut store: StorageGateway,
    run_id: i64,
    stop: &AtomicBool,
    timeout: Duration,
) {
    let mut written = 0u64;
    writer_loop(rx, stop, timeout, |sample| {
        match store.insert_lidar_scan(run_id, sample.capture_ns, &sample.payload) {
            Ok(()) => written += 1,
            Err(e) => log::warn!("Lidar: scan write failed: {}", e),
        }
    });
    log::info!("Lidar: writer drained ({} scans)", written);
}

fn imu_writer(
    rx: Receiver<Timestamped<ImuReading>>,
    store: StorageGateway,
    run_id: i64,
    stop: &AtomicBool,
    timeout: Duration,
) {
    let mut written = 0u64;
    writer_loop(rx, stop, timeout, |sample| {
        match store.insert_imu(run_id, sample.capture_ns, &sample.payload) {
            Ok(()) => written += 1,
            Err(e) => log::warn!("IMU: write failed: {}", e),
        }
    });
    log::info!("IMU: writer drained ({} readings)", written);
}

fn camera_writer(
    rx: Receiver<Timestamped<StereoFrame>>,
    store: StorageGateway,
    run_id: i64,
    image_dir: PathBuf,
    stop: &AtomicBool,
    timeout: Duration,
) {
    let mut written = 0u64;
    writer_loop(rx, stop, timeout, |sample| {
        let left = image_dir.join(format!("{}_left.jpg", sample.capture_ns));
        let right = image_dir.join(format!("{}_right.jpg", sample.capture_ns));

        let saved = fs::write(&left, &sample.payload.left)
            .and_then(|_| fs::write(&right, &sample.payload.right));
        if let Err(e) = saved {
            log::warn!("Camera: frame save failed: {}", e);
            return;
        }
        match store.insert_stereo_paths(
            run_id,
            sample.capture_ns,
            &left.to_string_lossy(),
            &right.to_string_lossy(),
        ) {
            Ok(()) => written += 1,
            Err(e) => log::warn!("Camera: path write failed: {}", e),
        }
    });
    log::info!("Camera: writer drained ({} stereo pairs)", written);
}
