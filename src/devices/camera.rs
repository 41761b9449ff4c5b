//! Stereo camera collaborator interface
//!
//! Frame capture itself lives outside this crate (hardware cameras, focus
//! heuristics); the pipeline only needs the scoped lifecycle and a capture
//! call that may fail. `MockCamera` is the in-tree stand-in used by tests and
//! desk bring-up.

use crate::error::{Error, Result};
use crate::types::StereoFrame;

/// External stereo camera collaborator.
///
/// Frame timestamps are assigned by the pipeline at capture time, never by
/// the camera.
pub trait CameraDevice: Send {
    /// Open both cameras; a failure here surfaces to the orchestrator
    fn connect(&mut self) -> Result<()>;

    /// Grab one stereo pair. Failures are per-cycle: the caller skips that
    /// cycle's camera sample and carries on.
    fn capture(&mut self) -> Result<StereoFrame>;

    /// Release both cameras; idempotent
    fn disconnect(&mut self);
}

/// Synthetic stereo camera producing small deterministic frames
pub struct MockCamera {
    connected: bool,
    frame_seq: u32,
    /// Device indexes the camera pretends to open, reported at connect
    left_index: u32,
    right_index: u32,
    /// Every n-th capture fails, when set (exercises skip-on-failure)
    fail_every: Option<u32>,
}

impl MockCamera {
    /// Camera at the rig's default device indexes, always capturing
    /// successfully
    pub fn new() -> Self {
        Self::with_indices(2, 0)
    }

    /// Camera at the configured device indexes
    pub fn with_indices(left_index: u32, right_index: u32) -> Self {
        Self {
            connected: false,
            frame_seq: 0,
            left_index,
            right_index,
            fail_every: None,
        }
    }

    /// Camera whose every n-th capture fails
    pub fn failing_every(n: u32) -> Self {
        Self {
            fail_every: Some(n),
            ..Self::new()
        }
    }

    /// Device indexes this camera was configured with
    pub fn indices(&self) -> (u32, u32) {
        (self.left_index, self.right_index)
    }

    fn frame_bytes(&self, side: u8) -> Vec<u8> {
        // JPEG SOI marker followed by a recognizable payload; enough for
        // path-persistence tests without an image stack.
        let mut bytes = vec![0xFF, 0xD8, side];
        bytes.extend_from_slice(&self.frame_seq.to_le_bytes());
        bytes
    }
}

impl CameraDevice for MockCamera {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "Camera: mock cameras connected (left index {}, right index {})",
            self.left_index,
            self.right_index
        );
        Ok(())
    }

    fn capture(&mut self) -> Result<StereoFrame> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.frame_seq += 1;
        if let Some(n) = self.fail_every {
            if self.frame_seq % n == 0 {
                return Err(Error::Capture(format!(
                    "mock frame {} dropped",
                    self.frame_seq
                )));
            }
        }
        Ok(StereoFrame {
            left: self.frame_bytes(b'L'),
            right: self.frame_bytes(b'R'),
        })
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            log::info!("Camera: mock cameras released");
        }
    }
}

impl Default for MockCamera {
    fn default() -> Self {
        Self::new()
    }
}
