//! Transport layer for sensor I/O abstraction

use crate::error::Result;

mod mock;
mod serial;

pub use mock::MockTransport;
pub use serial::SerialTransport;

/// Byte-stream transport for a sensor link
///
/// The rig only listens to its sensors, so the surface is read-only.
pub trait Transport: Send {
    /// Read available bytes into the buffer, returns the number read.
    ///
    /// A timeout with no data is reported as `Ok(0)`, not an error.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Number of bytes waiting to be read
    fn available(&mut self) -> Result<usize> {
        Ok(0)
    }

    /// Discard any bytes buffered on the link.
    ///
    /// Called once after connect so a session never starts mid-packet in
    /// stale data.
    fn discard_input(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Factory producing a fresh transport per connect.
///
/// Sensors connect and disconnect more than once per session (calibration
/// run, then scan run), and each connect needs a newly opened link.
pub type TransportFactory = Box<dyn Fn() -> Result<Box<dyn Transport>> + Send>;
