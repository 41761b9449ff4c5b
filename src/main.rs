//! Sankalan session runner
//!
//! Performs a calibration run, then records continuous scan data until the
//! operator presses ENTER or Ctrl-C. All data lands in one SQLite database
//! under `<output_dir>/<session_name>/`.

use clap::Parser;
use sankalan::devices::{CameraDevice, ImuSensor, LidarSensor, MockCamera};
use sankalan::{
    AcquisitionPipeline, CalibrationSequencer, Error, Result, SessionConfig, StorageGateway,
};
use sankalan::types::RunKind;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Parser, Debug)]
#[command(name = "sankalan", about = "Sensor rig calibration + recording session")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Session name (no spaces); prompted for when omitted
    #[arg(long)]
    name: Option<String>,

    /// Session description
    #[arg(long)]
    desc: Option<String>,

    /// LiDAR serial port override
    #[arg(long)]
    lidar_port: Option<String>,

    /// IMU serial port override
    #[arg(long)]
    imu_port: Option<String>,

    /// Output root directory override
    #[arg(long)]
    output: Option<PathBuf>,

    /// Use the synthetic stereo camera instead of real hardware
    #[arg(long)]
    mock_camera: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::default(),
    };
    apply_overrides(&mut config, &args)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    let session_dir = PathBuf::from(&config.storage.output_dir).join(&config.session.name);
    std::fs::create_dir_all(&session_dir)?;
    let db_path = session_dir.join(&config.storage.db_file);
    let image_dir = session_dir.join("images");

    log::info!(
        "Session '{}' -> {}",
        config.session.name,
        session_dir.display()
    );

    // One master handle for run metadata and calibration results; the
    // pipeline's writers open their own connections.
    let mut master = StorageGateway::open(&db_path)?;

    let stop = Arc::new(AtomicBool::new(false));
    let ctrlc_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        ctrlc_stop.store(true, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Failed to set Ctrl-C handler: {}", e)))?;

    let mut lidar = LidarSensor::open(&config.hardware.lidar_port, config.hardware.lidar_baud);
    let mut imu = ImuSensor::open(&config.hardware.imu_port, config.hardware.imu_baud);

    // A [camera] table enables the camera lane at its configured indexes;
    // --mock-camera enables it at the rig defaults.
    let mut camera: Option<MockCamera> = match (&config.camera, args.mock_camera) {
        (Some(cam), _) => Some(MockCamera::with_indices(cam.left_index, cam.right_index)),
        (None, true) => Some(MockCamera::new()),
        (None, false) => None,
    };

    // ── calibration run ──────────────────────────────────────────────────
    let calib_run = master.begin_run(
        &config.session.name,
        &config.session.description,
        RunKind::Calibration,
    )?;
    let sequencer = CalibrationSequencer::new(config.calibration.to_config());
    match sequencer.run(&mut lidar, &mut imu, &stop) {
        Ok(steps) => {
            master.write_calibration(calib_run, &steps)?;
            master.finish_run(calib_run)?;
        }
        Err(Error::Interrupted) => {
            master.finish_run(calib_run)?;
            log::info!("Session aborted during calibration");
            return Ok(());
        }
        Err(e) => return Err(e),
    }

    // ── continuous scan run ──────────────────────────────────────────────
    let scan_run = master.begin_run(
        &format!("{}:scan", config.session.name),
        &config.session.description,
        RunKind::Scan,
    )?;

    spawn_enter_listener(Arc::clone(&stop));
    log::info!("Recording... press ENTER or Ctrl-C to stop");

    let pipeline = AcquisitionPipeline::new(&db_path, &image_dir, config.pipeline.to_config());
    pipeline.run(
        scan_run,
        &mut lidar,
        &mut imu,
        camera.as_mut().map(|c| c as &mut dyn CameraDevice),
        &stop,
    )?;

    master.finish_run(scan_run)?;
    log::info!(
        "Session '{}' complete; data saved in {}",
        config.session.name,
        session_dir.display()
    );
    Ok(())
}

fn apply_overrides(config: &mut SessionConfig, args: &Args) -> Result<()> {
    if let Some(name) = &args.name {
        config.session.name = name.clone();
    }
    if let Some(desc) = &args.desc {
        config.session.description = desc.clone();
    }
    if let Some(port) = &args.lidar_port {
        config.hardware.lidar_port = port.clone();
    }
    if let Some(port) = &args.imu_port {
        config.hardware.imu_port = port.clone();
    }
    if let Some(output) = &args.output {
        config.storage.output_dir = output.to_string_lossy().into_owned();
    }

    if config.session.name.is_empty() {
        config.session.name = prompt_session_name()?;
    }
    if config.session.name.contains(char::is_whitespace) {
        return Err(Error::InvalidConfig(
            "session name must not contain spaces".to_string(),
        ));
    }
    Ok(())
}

fn prompt_session_name() -> Result<String> {
    print!("Enter a session name (no spaces): ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let name = line.trim().to_string();
    if name.is_empty() {
        return Err(Error::InvalidConfig("empty session name".to_string()));
    }
    Ok(name)
}

/// ENTER on stdin raises the stop signal, mirroring Ctrl-C
fn spawn_enter_listener(stop: Arc<AtomicBool>) {
    thread::Builder::new()
        .name("stdin-listener".to_string())
        .spawn(move || {
            let mut line = String::new();
            if std::io::stdin().lock().read_line(&mut line).is_ok() {
                stop.store(true, Ordering::Relaxed);
            }
        })
        .ok();
}
