//! "Give me the next N frames."
//!
//! A [`FutureFrameCollector`] registers a transient subscriber as soon as it
//! is created, so no frame delivered after construction can be missed. The
//! subscription is removed when the collector is dropped, which covers every
//! exit from [`FutureFrameCollector::wait`]: success, timeout, cancellation
//! and panics in the caller.

use crate::subscribers::{FrameCallback, SubscriberId, SubscriberRegistry};
use daq_core::{DaqError, DaqResult, Frame};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Progress {
    frames: Vec<Arc<Frame>>,
    cancelled: bool,
}

#[derive(Debug)]
struct Shared {
    expected: usize,
    progress: Mutex<Progress>,
    ready: Condvar,
}

impl Shared {
    fn accept(&self, frame: &Arc<Frame>) {
        let mut progress = self.progress.lock();
        if progress.cancelled || progress.frames.len() >= self.expected {
            return;
        }
        progress.frames.push(Arc::clone(frame));
        if progress.frames.len() == self.expected {
            self.ready.notify_all();
        }
    }
}

/// Cancels a pending [`FutureFrameCollector::wait`] from another thread.
#[derive(Debug, Clone)]
pub struct CollectionCanceller {
    shared: Arc<Shared>,
}

impl CollectionCanceller {
    pub fn cancel(&self) {
        self.shared.progress.lock().cancelled = true;
        self.shared.ready.notify_all();
    }
}

pub struct FutureFrameCollector {
    registry: Arc<SubscriberRegistry>,
    id: SubscriberId,
    shared: Arc<Shared>,
}

impl FutureFrameCollector {
    /// Start collecting the next `expected` frames published to `registry`.
    pub fn register(registry: &Arc<SubscriberRegistry>, expected: usize) -> Self {
        let shared = Arc::new(Shared {
            expected,
            progress: Mutex::new(Progress::default()),
            ready: Condvar::new(),
        });
        let sink = Arc::clone(&shared);
        let callback: FrameCallback = Arc::new(move |frame: &Arc<Frame>| -> anyhow::Result<()> {
            sink.accept(frame);
            Ok(())
        });
        let id = registry.register(callback);
        debug!(%id, expected, "Future-frame collector registered");
        Self {
            registry: Arc::clone(registry),
            id,
            shared,
        }
    }

    pub fn canceller(&self) -> CollectionCanceller {
        CollectionCanceller {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn expected(&self) -> usize {
        self.shared.expected
    }

    /// Frames gathered so far.
    pub fn received(&self) -> usize {
        self.shared.progress.lock().frames.len()
    }

    /// Block until `expected` frames have arrived, the timeout passes or the
    /// collection is cancelled.
    pub fn wait(self, timeout: Duration) -> DaqResult<Vec<Arc<Frame>>> {
        let expected = self.shared.expected;
        // Timeouts too large to represent as an instant wait without a deadline.
        let deadline = Instant::now().checked_add(timeout);
        let mut progress = self.shared.progress.lock();
        loop {
            if progress.cancelled {
                debug!(id = %self.id, received = progress.frames.len(), "Collection cancelled");
                return Err(DaqError::Cancelled);
            }
            if progress.frames.len() >= expected {
                return Ok(std::mem::take(&mut progress.frames));
            }
            let Some(deadline) = deadline else {
                self.shared.ready.wait(&mut progress);
                continue;
            };
            if self.shared.ready.wait_until(&mut progress, deadline).timed_out() {
                if progress.frames.len() >= expected && !progress.cancelled {
                    return Ok(std::mem::take(&mut progress.frames));
                }
                let received = progress.frames.len();
                warn!(expected, received, ?timeout, "Timed out collecting future frames");
                return Err(DaqError::Timeout {
                    expected,
                    received,
                    timeout,
                });
            }
        }
    }
}

impl Drop for FutureFrameCollector {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}
