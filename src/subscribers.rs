//! Ordered frame subscribers.
//!
//! The registry is copy-on-write: delivery clones an `Arc` of the current
//! list and iterates it without holding any lock, so callbacks may register
//! or unregister subscribers (including themselves) while a frame is being
//! fanned out. Such changes take effect from the next frame.

use daq_core::Frame;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Subscriber callback, invoked on the hardware delivery thread.
///
/// Must return quickly and must not call back into controller control
/// operations.
pub type FrameCallback = Arc<dyn Fn(&Arc<Frame>) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`SubscriberRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

#[derive(Clone)]
struct Entry {
    id: SubscriberId,
    callback: FrameCallback,
}

/// Result of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct SubscriberRegistry {
    entries: Mutex<Arc<Vec<Entry>>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber. Delivery order is registration order.
    pub fn register(&self, callback: FrameCallback) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        // Clones the list only while a fan-out still holds the old snapshot.
        Arc::make_mut(&mut *self.entries.lock()).push(Entry { id, callback });
        debug!(%id, "subscriber registered");
        id
    }

    /// Returns `false` if `id` was not registered.
    ///
    /// Ids are handed out in increasing order and entries are only ever
    /// appended, so the list stays sorted by id and lookup is a binary
    /// search. Removal shifts the tail, and copies the list if a fan-out
    /// still holds the previous snapshot.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut entries = self.entries.lock();
        let Ok(position) = entries.binary_search_by_key(&id, |entry| entry.id) else {
            return false;
        };
        Arc::make_mut(&mut *entries).remove(position);
        debug!(%id, "subscriber unregistered");
        true
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Arc<Vec<Entry>> {
        Arc::clone(&self.entries.lock())
    }

    /// Invoke every subscriber in order. Errors and panics are logged and
    /// counted; they never stop delivery to later subscribers.
    pub fn notify(&self, frame: &Arc<Frame>) -> FanOut {
        let mut outcome = FanOut::default();
        for entry in self.snapshot().iter() {
            match panic::catch_unwind(AssertUnwindSafe(|| (entry.callback)(frame))) {
                Ok(Ok(())) => outcome.delivered += 1,
                Ok(Err(e)) => {
                    outcome.failed += 1;
                    warn!(subscriber = %entry.id, counter = frame.counter(), error = %e, "Subscriber failed");
                }
                Err(payload) => {
                    outcome.failed += 1;
                    warn!(
                        subscriber = %entry.id,
                        counter = frame.counter(),
                        panic = panic_message(payload.as_ref()),
                        "Subscriber panicked"
                    );
                }
            }
        }
        outcome
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Bounded-queue bridge from the delivery thread to an async consumer.
pub struct FrameChannel {
    pub callback: FrameCallback,
    pub receiver: mpsc::Receiver<Arc<Frame>>,
    dropped: Arc<AtomicU64>,
}

impl FrameChannel {
    /// Frames discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Subscriber that forwards frames into a `tokio` channel of `capacity`.
///
/// The delivery thread never blocks on the queue: a full queue drops the
/// frame and counts it. Once the receiver is gone the callback reports an
/// error on every frame, so the subscriber should be unregistered.
pub fn channel_subscriber(capacity: usize) -> FrameChannel {
    let (tx, receiver) = mpsc::channel(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&dropped);
    let callback: FrameCallback = Arc::new(move |frame: &Arc<Frame>| -> anyhow::Result<()> {
        match tx.try_send(Arc::clone(frame)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let total = counter.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(counter = frame.counter(), dropped = total, "Frame queue full, frame dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(anyhow::anyhow!("frame receiver closed"))
            }
        }
    });
    FrameChannel {
        callback,
        receiver,
        dropped,
    }
}
