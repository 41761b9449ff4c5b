//! SQLite persistence for session data
//!
//! One `StorageGateway` wraps one connection. Writer threads each open their
//! own gateway against the same database file (WAL journal), so transactions
//! never interleave across threads. A LiDAR scan row and its 12 point rows
//! are committed atomically, as is each calibration step with its samples.

use crate::error::Result;
use crate::types::{
    capture_now_ns, CalibrationSample, CalibrationStep, ImuReading, LidarPacket, RunKind,
};
use rusqlite::{params, Connection};
use std::path::Path;

/// Storage gateway owning a single SQLite connection
pub struct StorageGateway {
    conn: Connection,
}

impl StorageGateway {
    /// Open (or create) the session database and ensure the schema exists.
    ///
    /// WAL journal mode lets the per-writer connections work concurrently.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let gateway = Self { conn };
        gateway.init_schema()?;
        Ok(gateway)
    }

    /// In-memory database for tests
    pub fn open_in_memory() -> Result<Self> {
        let gateway = Self {
            conn: Connection::open_in_memory()?,
        };
        gateway.init_schema()?;
        Ok(gateway)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS run_metadata (
                id INTEGER PRIMARY KEY, name TEXT, description TEXT,
                type TEXT CHECK(type IN ('calibration','scan')),
                start_time_ns BIGINT, end_time_ns BIGINT
            );
            CREATE TABLE IF NOT EXISTS calibration_steps (
                id INTEGER PRIMARY KEY, run_id INTEGER, step_name TEXT, instruction TEXT,
                start_time_ns BIGINT, end_time_ns BIGINT,
                FOREIGN KEY(run_id) REFERENCES run_metadata(id)
            );
            CREATE TABLE IF NOT EXISTS calibration_imu_data (
                id INTEGER PRIMARY KEY, step_id INTEGER, capture_time_ns BIGINT,
                device_timestamp_s REAL,
                acc_x REAL, acc_y REAL, acc_z REAL,
                gyro_x REAL, gyro_y REAL, gyro_z REAL,
                mag_x REAL, mag_y REAL, mag_z REAL,
                FOREIGN KEY(step_id) REFERENCES calibration_steps(id)
            );
            CREATE TABLE IF NOT EXISTS calibration_lidar_data (
                id INTEGER PRIMARY KEY, step_id INTEGER, capture_time_ns BIGINT,
                lidar_timestamp_s REAL, speed REAL, start_angle REAL, end_angle REAL,
                FOREIGN KEY(step_id) REFERENCES calibration_steps(id)
            );
            CREATE TABLE IF NOT EXISTS calibration_lidar_points (
                id INTEGER PRIMARY KEY, scan_id INTEGER,
                angle REAL, distance REAL, intensity INTEGER,
                FOREIGN KEY(scan_id) REFERENCES calibration_lidar_data(id)
            );
            CREATE TABLE IF NOT EXISTS imu_data (
                id INTEGER PRIMARY KEY, run_id INTEGER, capture_time_ns BIGINT,
                device_timestamp_s REAL,
                acc_x REAL, acc_y REAL, acc_z REAL,
                gyro_x REAL, gyro_y REAL, gyro_z REAL,
                mag_x REAL, mag_y REAL, mag_z REAL,
                FOREIGN KEY(run_id) REFERENCES run_metadata(id)
            );
            CREATE TABLE IF NOT EXISTS lidar_data (
                id INTEGER PRIMARY KEY, run_id INTEGER, capture_time_ns BIGINT,
                lidar_timestamp_s REAL, speed REAL, start_angle REAL, end_angle REAL,
                FOREIGN KEY(run_id) REFERENCES run_metadata(id)
            );
            CREATE TABLE IF NOT EXISTS lidar_points (
                id INTEGER PRIMARY KEY, scan_id INTEGER,
                angle REAL, distance REAL, intensity INTEGER,
                FOREIGN KEY(scan_id) REFERENCES lidar_data(id)
            );
            CREATE TABLE IF NOT EXISTS stereo_images (
                id INTEGER PRIMARY KEY, run_id INTEGER, capture_time_ns BIGINT,
                left_image_path TEXT, right_image_path TEXT,
                FOREIGN KEY(run_id) REFERENCES run_metadata(id)
            );",
        )?;
        Ok(())
    }

    /// Insert a run-metadata row stamped with the current capture clock;
    /// returns the run id
    pub fn begin_run(&self, name: &str, description: &str, kind: RunKind) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO run_metadata (name, description, type, start_time_ns)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, description, kind.as_str(), capture_now_ns()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Stamp the run's end time
    pub fn finish_run(&self, run_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE run_metadata SET end_time_ns = ?1 WHERE id = ?2",
            params![capture_now_ns(), run_id],
        )?;
        Ok(())
    }

    /// Persist the three labeled calibration steps, one transaction per step
    pub fn write_calibration(&mut self, run_id: i64, steps: &[CalibrationStep]) -> Result<()> {
        for step in steps {
            let tx = self.conn.transaction()?;
            tx.execute(
                "INSERT INTO calibration_steps
                 (run_id, step_name, instruction, start_time_ns, end_time_ns)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![run_id, step.label, step.label, step.start_ns, step.end_ns],
            )?;
            let step_id = tx.last_insert_rowid();

            for sample in &step.samples {
                let ts = sample.capture_ns;
                match &sample.payload {
                    CalibrationSample::Imu(reading) => {
                        insert_calibration_imu(&tx, step_id, ts, reading)?;
                    }
                    CalibrationSample::Joint { lidar, imu } => {
                        if let Some(reading) = imu {
                            insert_calibration_imu(&tx, step_id, ts, reading)?;
                        }
                        if let Some(packet) = lidar {
                            insert_calibration_lidar(&tx, step_id, ts, packet)?;
                        }
                    }
                }
            }
            tx.commit()?;
        }
        log::info!(
            "Storage: wrote {} calibration steps for run {}",
            steps.len(),
            run_id
        );
        Ok(())
    }

    /// Insert one IMU reading for a scan run
    pub fn insert_imu(&self, run_id: i64, capture_ns: i64, reading: &ImuReading) -> Result<()> {
        let mag = reading.mag.unwrap_or([f64::NAN; 3]);
        self.conn.execute(
            "INSERT INTO imu_data
             (run_id, capture_time_ns, device_timestamp_s,
              acc_x, acc_y, acc_z, gyro_x, gyro_y, gyro_z, mag_x, mag_y, mag_z)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                run_id,
                capture_ns,
                reading.device_time_sec,
                reading.acc[0],
                reading.acc[1],
                reading.acc[2],
                reading.gyro[0],
                reading.gyro[1],
                reading.gyro[2],
                opt(reading.mag.is_some(), mag[0]),
                opt(reading.mag.is_some(), mag[1]),
                opt(reading.mag.is_some(), mag[2]),
            ],
        )?;
        Ok(())
    }

    /// Insert one LiDAR scan and its 12 point rows atomically.
    ///
    /// An error anywhere rolls the whole scan back; orphaned point rows
    /// cannot exist.
    pub fn insert_lidar_scan(
        &mut self,
        run_id: i64,
        capture_ns: i64,
        packet: &LidarPacket,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO lidar_data
             (run_id, capture_time_ns, lidar_timestamp_s, speed, start_angle, end_angle)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                capture_ns,
                packet.sensor_timestamp_sec,
                packet.speed_deg_per_sec,
                packet.start_angle_deg,
                packet.end_angle_deg,
            ],
        )?;
        let scan_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO lidar_points (scan_id, angle, distance, intensity)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for point in &packet.points {
                stmt.execute(params![
                    scan_id,
                    point.angle_deg,
                    point.distance_m,
                    point.intensity
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Record where a stereo pair was written on disk
    pub fn insert_stereo_paths(
        &self,
        run_id: i64,
        capture_ns: i64,
        left_path: &str,
        right_path: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO stereo_images (run_id, capture_time_ns, left_image_path, right_image_path)
             VALUES (?1, ?2, ?3, ?4)",
            params![run_id, capture_ns, left_path, right_path],
        )?;
        Ok(())
    }

    /// Count rows in a table; test and diagnostics helper
    pub fn count(&self, table: &str) -> Result<i64> {
        // Table names come from this module's schema, not user input.
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let n = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(n)
    }
}

fn insert_calibration_imu(
    tx: &rusqlite::Transaction<'_>,
    step_id: i64,
    capture_ns: i64,
    reading: &ImuReading,
) -> Result<()> {
    let mag = reading.mag.unwrap_or([f64::NAN; 3]);
    tx.execute(
        "INSERT INTO calibration_imu_data
         (step_id, capture_time_ns, device_timestamp_s,
          acc_x, acc_y, acc_z, gyro_x, gyro_y, gyro_z, mag_x, mag_y, mag_z)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            step_id,
            capture_ns,
            reading.device_time_sec,
            reading.acc[0],
            reading.acc[1],
            reading.acc[2],
            reading.gyro[0],
            reading.gyro[1],
            reading.gyro[2],
            opt(reading.mag.is_some(), mag[0]),
            opt(reading.mag.is_some(), mag[1]),
            opt(reading.mag.is_some(), mag[2]),
        ],
    )?;
    Ok(())
}

fn insert_calibration_lidar(
    tx: &rusqlite::Transaction<'_>,
    step_id: i64,
    capture_ns: i64,
    packet: &LidarPacket,
) -> Result<()> {
    tx.execute(
        "INSERT INTO calibration_lidar_data
         (step_id, capture_time_ns, lidar_timestamp_s, speed, start_angle, end_angle)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            step_id,
            capture_ns,
            packet.sensor_timestamp_sec,
            packet.speed_deg_per_sec,
            packet.start_angle_deg,
            packet.end_angle_deg,
        ],
    )?;
    let scan_id = tx.last_insert_rowid();
    for point in &packet.points {
        tx.execute(
            "INSERT INTO calibration_lidar_points (scan_id, angle, distance, intensity)
             VALUES (?1, ?2, ?3, ?4)",
            params![scan_id, point.angle_deg, point.distance_m, point.intensity],
        )?;
    }
    Ok(())
}

/// NULL-able column helper: `Some(value)` when present, SQL NULL otherwise
fn opt(present: bool, value: f64) -> Option<f64> {
    present.then_some(value)
}
