//! IMU sensor reading newline-delimited JSON records
//!
//! The IMU stream self-delimits on newlines, so unlike the LiDAR link a
//! transient read error is survivable: the partial line is discarded by the
//! next newline and the loop backs off and retries.

use crate::error::{Error, Result};
use crate::mailbox::LatestValueCache;
use crate::transport::{SerialTransport, Transport, TransportFactory};
use crate::types::{ImuReading, Timestamped};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Idle backoff when the link has no pending bytes
const IDLE_BACKOFF: Duration = Duration::from_millis(1);
/// Backoff after a transient read error
const ERROR_BACKOFF: Duration = Duration::from_millis(100);
/// A line longer than this cannot be a valid record; drop it
const MAX_LINE_LEN: usize = 1024;

/// IMU sensor handle owning the serial reader thread and reading cache
pub struct ImuSensor {
    factory: TransportFactory,
    cache: LatestValueCache<Timestamped<ImuReading>>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl ImuSensor {
    /// Sensor bound to a serial port; the port is opened on connect
    pub fn open(port: &str, baud_rate: u32) -> Self {
        let port = port.to_string();
        Self::with_transport_factory(Box::new(move || {
            Ok(Box::new(SerialTransport::open(&port, baud_rate)?) as Box<dyn Transport>)
        }))
    }

    /// Sensor reading from transports produced by the given factory
    pub fn with_transport_factory(factory: TransportFactory) -> Self {
        Self {
            factory,
            cache: LatestValueCache::new(),
            stop: Arc::new(AtomicBool::new(false)),
            reader: None,
        }
    }

    /// Open the link and start the reader thread; no-op when already
    /// connected
    pub fn connect(&mut self) -> Result<()> {
        if self.reader.is_some() {
            return Ok(());
        }

        let mut transport = (self.factory)()?;
        transport.discard_input()?;

        self.stop = Arc::new(AtomicBool::new(false));
        let cache = self.cache.clone();
        let stop = Arc::clone(&self.stop);
        let handle = thread::Builder::new()
            .name("imu-reader".to_string())
            .spawn(move || reader_loop(transport, cache, stop))?;

        self.reader = Some(handle);
        log::info!("IMU: connected");
        Ok(())
    }

    /// Stop and join the reader thread and drop any pending sample.
    /// Idempotent; also invoked from Drop.
    pub fn disconnect(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                log::error!("IMU: reader thread panicked");
            }
            log::info!("IMU: disconnected");
        }
        self.cache.clear();
    }

    /// Pop the most recent reading, or `None` when nothing new arrived since
    /// the last call. Never blocks.
    pub fn take_latest(&self) -> Option<Timestamped<ImuReading>> {
        if !self.is_connected() {
            return None;
        }
        self.cache.take()
    }

    /// Handle to the sensor's latest-value cache; the pipeline's producer
    /// thread polls this directly
    pub(crate) fn cache(&self) -> LatestValueCache<Timestamped<ImuReading>> {
        self.cache.clone()
    }

    /// True while the reader thread is running
    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }
}

impl Drop for ImuSensor {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn reader_loop(
    mut transport: Box<dyn Transport>,
    cache: LatestValueCache<Timestamped<ImuReading>>,
    stop: Arc<AtomicBool>,
) {
    let mut chunk = [0u8; 256];
    let mut line = Vec::with_capacity(128);

    while !stop.load(Ordering::Relaxed) {
        match transport.read(&mut chunk) {
            Ok(0) => thread::sleep(IDLE_BACKOFF),
            Ok(n) => {
                for &byte in &chunk[..n] {
                    if byte == b'\n' {
                        handle_line(&line, &cache);
                        line.clear();
                    } else if line.len() < MAX_LINE_LEN {
                        line.push(byte);
                    } else {
                        // Runaway line without a newline; start over
                        line.clear();
                    }
                }
            }
            Err(e) => {
                log::warn!("IMU: read error (retrying): {}", e);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
}

/// Decode one line and publish it if it is a valid data record.
///
/// Skipped without fuss: lines that do not start with the JSON object
/// marker, lines that fail to decode, and records carrying a device-reported
/// `error` field.
fn handle_line(line: &[u8], cache: &LatestValueCache<Timestamped<ImuReading>>) {
    let text = match std::str::from_utf8(line) {
        Ok(t) => t.trim(),
        Err(_) => return,
    };
    if !text.starts_with('{') {
        return;
    }
    let reading = match decode_record(text) {
        Ok(r) => r,
        Err(e) => {
            log::debug!("IMU: undecodable line dropped: {}", e);
            return;
        }
    };
    if reading.is_fault() {
        log::debug!("IMU: device fault record dropped");
        return;
    }
    cache.publish(Timestamped::now(reading));
}

/// Decode one JSON record line
fn decode_record(text: &str) -> Result<ImuReading> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish_lines(lines: &str) -> Option<Timestamped<ImuReading>> {
        let cache = LatestValueCache::new();
        for line in lines.split_inclusive('\n') {
            handle_line(line.trim_end_matches('\n').as_bytes(), &cache);
        }
        cache.take()
    }

    #[test]
    fn test_valid_line_published() {
        let got = publish_lines("{\"t\": 3.5, \"acc\": [0,0,9.8], \"gyro\": [0,0,0]}\n");
        assert_eq!(got.unwrap().payload.device_time_sec, 3.5);
    }

    #[test]
    fn test_non_json_line_skipped() {
        assert!(publish_lines("IMU boot v1.2\n").is_none());
    }

    #[test]
    fn test_undecodable_line_skipped() {
        assert!(publish_lines("{\"t\": 3.5, \"acc\": [0,0\n").is_none());
    }

    #[test]
    fn test_decode_failure_maps_to_decode_error() {
        let result = decode_record("{\"t\": 3.5, \"acc\": [0,0");
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_error_record_skipped() {
        let got = publish_lines(
            "{\"t\": 1.0, \"acc\": [0,0,0], \"gyro\": [0,0,0], \"error\": \"overrun\"}\n",
        );
        assert!(got.is_none());
    }

    #[test]
    fn test_latest_record_wins() {
        let got = publish_lines(
            "{\"t\": 1.0, \"acc\": [0,0,9.8], \"gyro\": [0,0,0]}\n\
             {\"t\": 2.0, \"acc\": [0,0,9.8], \"gyro\": [0,0,0]}\n",
        );
        assert_eq!(got.unwrap().payload.device_time_sec, 2.0);
    }
}
