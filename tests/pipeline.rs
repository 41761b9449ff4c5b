//! Recording pipeline: dedup, drain-on-shutdown, camera lane, and state
//! machine, against a real on-disk SQLite session database.

mod common;

use common::{build_packet, factory_for, imu_line};
use sankalan::devices::{CameraDevice, ImuSensor, LidarSensor, MockCamera};
use sankalan::transport::MockTransport;
use sankalan::types::RunKind;
use sankalan::{AcquisitionPipeline, PipelineConfig, PipelineState, StorageGateway};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        producer_interval: Duration::from_millis(5),
        writer_timeout: Duration::from_millis(20),
    }
}

#[test]
fn records_dedups_and_drains_to_closed() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data.db");
    let image_dir = dir.path().join("images");

    let master = StorageGateway::open(&db_path).unwrap();
    let run_id = master.begin_run("desk:scan", "", RunKind::Scan).unwrap();

    let lidar_link = MockTransport::new();
    let imu_link = MockTransport::new();
    let mut lidar = LidarSensor::with_transport_factory(factory_for(&lidar_link));
    let mut imu = ImuSensor::with_transport_factory(factory_for(&imu_link));
    let mut camera = MockCamera::new();

    let stop = Arc::new(AtomicBool::new(false));

    // Feed the links while the pipeline runs: the same physical packet
    // (device timestamp 0.100) is delivered twice, then a fresh one.
    let feeder_lidar = lidar_link.clone();
    let feeder_imu = imu_link.clone();
    let feeder_stop = Arc::clone(&stop);
    let feeder = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        feeder_lidar.inject(&build_packet(360.0, 0.0, 30.0, 0.100, 1.0, 10));
        feeder_imu.inject(imu_line(0.01).as_bytes());
        thread::sleep(Duration::from_millis(60));
        feeder_lidar.inject(&build_packet(360.0, 0.0, 30.0, 0.100, 1.0, 10));
        feeder_imu.inject(imu_line(0.02).as_bytes());
        thread::sleep(Duration::from_millis(60));
        feeder_lidar.inject(&build_packet(360.0, 30.0, 60.0, 0.200, 1.0, 10));
        thread::sleep(Duration::from_millis(60));
        feeder_stop.store(true, Ordering::Relaxed);
    });

    let pipeline = AcquisitionPipeline::new(&db_path, &image_dir, fast_config());
    assert_eq!(pipeline.state(), PipelineState::Idle);

    pipeline
        .run(
            run_id,
            &mut lidar,
            &mut imu,
            Some(&mut camera as &mut dyn CameraDevice),
            &stop,
        )
        .unwrap();
    feeder.join().unwrap();

    // Closed means: every writer drained, every sensor released.
    assert_eq!(pipeline.state(), PipelineState::Closed);
    assert!(!lidar.is_connected());
    assert!(!imu.is_connected());

    let check = StorageGateway::open(&db_path).unwrap();
    // Two distinct device timestamps -> exactly two scan rows, each with its
    // 12 point rows committed atomically.
    assert_eq!(check.count("lidar_data").unwrap(), 2);
    assert_eq!(check.count("lidar_points").unwrap(), 24);
    assert!(check.count("imu_data").unwrap() >= 2);

    // Camera lane captured frames and recorded their paths
    let stereo_rows = check.count("stereo_images").unwrap();
    assert!(stereo_rows > 0);
    let images = std::fs::read_dir(&image_dir).unwrap().count();
    assert_eq!(images as i64, stereo_rows * 2);
}

#[test]
fn runs_without_camera_lane() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data.db");
    let image_dir = dir.path().join("images");

    let master = StorageGateway::open(&db_path).unwrap();
    let run_id = master.begin_run("bare:scan", "", RunKind::Scan).unwrap();

    let imu_link = MockTransport::new();
    let mut lidar = LidarSensor::with_transport_factory(factory_for(&MockTransport::new()));
    let mut imu = ImuSensor::with_transport_factory(factory_for(&imu_link));

    let stop = Arc::new(AtomicBool::new(false));
    let feeder_imu = imu_link.clone();
    let feeder_stop = Arc::clone(&stop);
    let feeder = thread::spawn(move || {
        for i in 0..10 {
            feeder_imu.inject(imu_line(0.01 * (i + 1) as f64).as_bytes());
            thread::sleep(Duration::from_millis(10));
        }
        feeder_stop.store(true, Ordering::Relaxed);
    });

    let pipeline = AcquisitionPipeline::new(&db_path, &image_dir, fast_config());
    pipeline.run(run_id, &mut lidar, &mut imu, None, &stop).unwrap();
    feeder.join().unwrap();

    assert_eq!(pipeline.state(), PipelineState::Closed);
    let check = StorageGateway::open(&db_path).unwrap();
    assert!(check.count("imu_data").unwrap() > 0);
    assert_eq!(check.count("stereo_images").unwrap(), 0);
    // No camera lane, no image directory
    assert!(!image_dir.exists());
}

#[test]
fn connect_failure_surfaces_and_releases() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data.db");
    let image_dir = dir.path().join("images");

    let mut lidar = LidarSensor::with_transport_factory(factory_for(&MockTransport::new()));
    // IMU link cannot be opened
    let mut imu = ImuSensor::with_transport_factory(Box::new(|| {
        Err(sankalan::Error::Other("no such port".into()))
    }));

    let stop = AtomicBool::new(false);
    let pipeline = AcquisitionPipeline::new(&db_path, &image_dir, fast_config());
    let result = pipeline.run(1, &mut lidar, &mut imu, None, &stop);

    assert!(result.is_err());
    assert!(!lidar.is_connected());
    assert!(!imu.is_connected());
}

#[test]
fn camera_capture_failures_skip_cycles_only() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data.db");
    let image_dir = dir.path().join("images");

    let master = StorageGateway::open(&db_path).unwrap();
    let run_id = master.begin_run("flaky:scan", "", RunKind::Scan).unwrap();

    let mut lidar = LidarSensor::with_transport_factory(factory_for(&MockTransport::new()));
    let mut imu = ImuSensor::with_transport_factory(factory_for(&MockTransport::new()));
    let mut camera = MockCamera::failing_every(2);

    let stop = Arc::new(AtomicBool::new(false));
    let timer_stop = Arc::clone(&stop);
    let timer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        timer_stop.store(true, Ordering::Relaxed);
    });

    let pipeline = AcquisitionPipeline::new(&db_path, &image_dir, fast_config());
    pipeline
        .run(
            run_id,
            &mut lidar,
            &mut imu,
            Some(&mut camera as &mut dyn CameraDevice),
            &stop,
        )
        .unwrap();
    timer.join().unwrap();

    assert_eq!(pipeline.state(), PipelineState::Closed);
    // Roughly half the cycles fail; the rest still land
    let check = StorageGateway::open(&db_path).unwrap();
    assert!(check.count("stereo_images").unwrap() > 0);
}
