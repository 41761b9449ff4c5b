//! Spinning LiDAR sensor with an owned reader thread
//!
//! `connect()` opens the link and spawns the reader; the reader frames and
//! decodes packets and publishes each one into the sensor's latest-value
//! cache. `disconnect()` stops and joins the thread on every exit path, Drop
//! included, so no thread outlives its owning sensor.

mod protocol;
mod ring_buffer;

pub use protocol::{decode_packet, FrameAssembler, HEADER, PACKET_SIZE, POINT_COUNT_MARKER};

use crate::error::Result;
use crate::mailbox::LatestValueCache;
use crate::transport::{SerialTransport, Transport, TransportFactory};
use crate::types::{LidarPacket, Timestamped};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Idle backoff when the link has no pending bytes
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// LiDAR sensor handle owning the serial reader thread and packet cache
pub struct LidarSensor {
    factory: TransportFactory,
    cache: LatestValueCache<Timestamped<LidarPacket>>,
    stop: Arc<AtomicBool>,
    link_up: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl LidarSensor {
    /// Sensor bound to a serial port; the port is opened on connect
    pub fn open(port: &str, baud_rate: u32) -> Self {
        let port = port.to_string();
        Self::with_transport_factory(Box::new(move || {
            Ok(Box::new(SerialTransport::open(&port, baud_rate)?) as Box<dyn Transport>)
        }))
    }

    /// Sensor reading from transports produced by the given factory.
    ///
    /// Each connect asks the factory for a fresh transport; tests inject
    /// mocks this way.
    pub fn with_transport_factory(factory: TransportFactory) -> Self {
        Self {
            factory,
            cache: LatestValueCache::new(),
            stop: Arc::new(AtomicBool::new(false)),
            link_up: Arc::new(AtomicBool::new(false)),
            reader: None,
        }
    }

    /// Open the link and start the reader thread.
    ///
    /// A transport failure here is the one error that surfaces hard to the
    /// orchestrator. Connecting an already-connected sensor is a no-op.
    pub fn connect(&mut self) -> Result<()> {
        if self.reader.is_some() {
            return Ok(());
        }

        let mut transport = (self.factory)()?;
        transport.discard_input()?;

        self.stop = Arc::new(AtomicBool::new(false));
        self.link_up.store(true, Ordering::Relaxed);

        let cache = self.cache.clone();
        let stop = Arc::clone(&self.stop);
        let link_up = Arc::clone(&self.link_up);
        let handle = thread::Builder::new()
            .name("lidar-reader".to_string())
            .spawn(move || reader_loop(transport, cache, stop, link_up))?;

        self.reader = Some(handle);
        log::info!("Lidar: connected");
        Ok(())
    }

    /// Stop and join the reader thread and drop any pending sample.
    ///
    /// Idempotent; also invoked from Drop.
    pub fn disconnect(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                log::error!("Lidar: reader thread panicked");
            }
            log::info!("Lidar: disconnected");
        }
        self.link_up.store(false, Ordering::Relaxed);
        self.cache.clear();
    }

    /// Pop the most recent packet, or `None` when nothing new arrived since
    /// the last call. Never blocks.
    pub fn take_latest(&self) -> Option<Timestamped<LidarPacket>> {
        if !self.is_connected() {
            return None;
        }
        self.cache.take()
    }

    /// Handle to the sensor's latest-value cache.
    ///
    /// The pipeline's producer thread polls this directly; the cache is the
    /// reader-producer boundary and is safe to share.
    pub(crate) fn cache(&self) -> LatestValueCache<Timestamped<LidarPacket>> {
        self.cache.clone()
    }

    /// True while the reader thread is running and the link has not failed
    pub fn is_connected(&self) -> bool {
        self.reader.is_some() && self.link_up.load(Ordering::Relaxed)
    }
}

impl Drop for LidarSensor {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn reader_loop(
    mut transport: Box<dyn Transport>,
    cache: LatestValueCache<Timestamped<LidarPacket>>,
    stop: Arc<AtomicBool>,
    link_up: Arc<AtomicBool>,
) {
    let mut assembler = FrameAssembler::new();
    let mut chunk = [0u8; 512];

    while !stop.load(Ordering::Relaxed) {
        let pending = match transport.available() {
            Ok(0) => {
                thread::sleep(IDLE_BACKOFF);
                continue;
            }
            Ok(n) => n.min(chunk.len()),
            Err(e) => {
                log::error!("Lidar: link lost: {}", e);
                break;
            }
        };

        match transport.read(&mut chunk[..pending]) {
            Ok(0) => thread::sleep(IDLE_BACKOFF),
            Ok(n) => {
                assembler.extend(&chunk[..n]);
                // Malformed windows are dropped inside the assembler; they
                // are not fatal.
                while let Some(packet) = assembler.poll() {
                    cache.publish(Timestamped::now(packet));
                }
            }
            Err(e) => {
                log::error!("Lidar: read failed: {}", e);
                break;
            }
        }
    }

    link_up.store(false, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn mock_sensor(transport: MockTransport) -> LidarSensor {
        LidarSensor::with_transport_factory(Box::new(move || {
            Ok(Box::new(transport.clone()) as Box<dyn Transport>)
        }))
    }

    #[test]
    fn test_take_latest_before_connect_is_none() {
        let sensor = mock_sensor(MockTransport::new());
        assert!(sensor.take_latest().is_none());
    }

    #[test]
    fn test_connect_is_idempotent() {
        let mut sensor = mock_sensor(MockTransport::new());
        sensor.connect().unwrap();
        sensor.connect().unwrap();
        assert!(sensor.is_connected());
        sensor.disconnect();
        sensor.disconnect();
        assert!(!sensor.is_connected());
    }

    #[test]
    fn test_read_error_marks_link_down() {
        let transport = MockTransport::new();
        let mut sensor = mock_sensor(transport.clone());
        sensor.connect().unwrap();

        transport.inject(&[0x54]);
        transport.inject_read_error();

        // The reader loop observes the injected failure and exits.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while sensor.is_connected() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!sensor.is_connected());
        sensor.disconnect();
    }
}
