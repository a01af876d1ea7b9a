//! Latest-frame snapshot.

use daq_core::Frame;
use parking_lot::RwLock;
use std::sync::Arc;

/// Holds the most recently completed frame.
///
/// The counter lives inside the [`Frame`], so a reader can never observe a
/// counter that belongs to a different pixel buffer than the one it got.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    latest: RwLock<Option<Arc<Frame>>>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored frame.
    pub fn publish(&self, frame: Arc<Frame>) {
        *self.latest.write() = Some(frame);
    }

    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.latest.read().clone()
    }

    /// Counter of the stored frame, `None` before the first publish.
    pub fn counter(&self) -> Option<u64> {
        self.latest.read().as_ref().map(|frame| frame.counter())
    }

}
