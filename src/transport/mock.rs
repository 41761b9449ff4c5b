//! Mock transport for testing
//!
//! Reads can be chunked to exercise partial-read handling in the framer, and
//! an I/O fault can be injected to exercise reader-loop termination.

use super::Transport;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Mock transport backed by an injectable byte queue
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    /// Maximum bytes handed out per read call (simulates partial reads)
    max_chunk: usize,
    /// When set, the next read fails with an I/O error
    fail_next_read: bool,
}

impl MockTransport {
    /// Create a new mock transport with unbounded read chunks
    pub fn new() -> Self {
        Self::with_chunk_size(usize::MAX)
    }

    /// Create a mock transport that hands out at most `max_chunk` bytes per
    /// read call
    pub fn with_chunk_size(max_chunk: usize) -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                read_buffer: VecDeque::new(),
                max_chunk,
                fail_next_read: false,
            })),
        }
    }

    /// Inject data to be read
    pub fn inject(&self, data: &[u8]) {
        let mut inner = self.inner.lock();
        inner.read_buffer.extend(data);
    }

    /// Make the next read call fail with an I/O error
    pub fn inject_read_error(&self) {
        let mut inner = self.inner.lock();
        inner.fail_next_read = true;
    }

    /// Bytes still queued for reading
    pub fn pending(&self) -> usize {
        let inner = self.inner.lock();
        inner.read_buffer.len()
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();

        if inner.fail_next_read {
            inner.fail_next_read = false;
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "injected read failure",
            )));
        }

        let n = inner
            .read_buffer
            .len()
            .min(buffer.len())
            .min(inner.max_chunk);
        for slot in buffer.iter_mut().take(n) {
            *slot = inner.read_buffer.pop_front().unwrap_or(0);
        }
        Ok(n)
    }

    fn available(&mut self) -> Result<usize> {
        let inner = self.inner.lock();
        Ok(inner.read_buffer.len().min(inner.max_chunk))
    }

    fn discard_input(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.read_buffer.clear();
        Ok(())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}
