//! Byte ring buffer for packet framing
//!
//! O(1) consume instead of Vec::drain's O(n) shift; resynchronization
//! advances the buffer one byte at a time, so consume cost matters.

use crate::types::POINTS_PER_PACKET;

/// Staging area size; must hold one packet (47 bytes)
const STAGING: usize = 4 * POINTS_PER_PACKET + 16;

/// Fixed-capacity byte ring with O(1) advance
///
/// Generic const parameter `N` sets buffer capacity.
pub struct RingBuffer<const N: usize = 4096> {
    data: [u8; N],
    head: usize, // write position (next empty slot)
    tail: usize, // read position (first valid byte)
    len: usize,
    staging: [u8; STAGING], // for windows that wrap around the end
}

impl<const N: usize> RingBuffer<N> {
    /// Create a new empty ring buffer
    pub const fn new() -> Self {
        Self {
            data: [0u8; N],
            head: 0,
            tail: 0,
            len: 0,
            staging: [0u8; STAGING],
        }
    }

    /// Append bytes to the buffer.
    ///
    /// Bytes that would overflow are silently dropped; the framer drains the
    /// buffer every pass so overflow means the producer is badly stalled.
    #[inline]
    pub fn extend(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.len < N {
                self.data[self.head] = b;
                self.head = (self.head + 1) % N;
                self.len += 1;
            }
        }
    }

    /// Consume n bytes from the front - O(1)
    #[inline]
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.len);
        self.tail = (self.tail + n) % N;
        self.len -= n;
    }

    /// Number of bytes available to read
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no bytes are buffered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read byte at logical index (handles wraparound)
    #[inline]
    pub fn get(&self, index: usize) -> Option<u8> {
        if index < self.len {
            Some(self.data[(self.tail + index) % N])
        } else {
            None
        }
    }

    /// Find the first occurrence of a sync byte, returns offset from tail
    pub fn find_byte(&self, needle: u8) -> Option<usize> {
        (0..self.len).find(|&i| self.data[(self.tail + i) % N] == needle)
    }

    /// Contiguous view of `len` bytes starting at logical offset `start`.
    ///
    /// Returns a slice into the main buffer when the window is contiguous,
    /// or into the staging copy when it spans the wraparound point.
    pub fn window(&mut self, start: usize, len: usize) -> Option<&[u8]> {
        if start + len > self.len || len > STAGING {
            return None;
        }

        let real_start = (self.tail + start) % N;
        if real_start + len <= N {
            Some(&self.data[real_start..real_start + len])
        } else {
            for i in 0..len {
                self.staging[i] = self.data[(real_start + i) % N];
            }
            Some(&self.staging[..len])
        }
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
