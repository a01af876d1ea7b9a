//! Simulated streaming engine.
//!
//! Mirrors a vendor engine with a fixed set of announced buffers: a buffer is
//! filled only when it has been queued back by the previous consumer, so a
//! driver that forgets to re-queue starves the stream just as real hardware
//! would.

use crate::node_map::NodeMap;
use daq_core::{DaqError, DaqResult};
use daq_driver_genicam::features::FRAME_STATUS_COMPLETE;
use daq_driver_genicam::{FrameQueue, StreamHandler, VendorFrame};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace};

/// Vendor status reported for frames with missing packets.
pub const FRAME_STATUS_INCOMPLETE: i32 = -1;

/// Counters shared between the transport, its delivery thread and probes.
#[derive(Debug, Default)]
pub struct SimStats {
    pub connects: AtomicU64,
    pub disconnects: AtomicU64,
    pub starts: AtomicU64,
    pub stops: AtomicU64,
    pub delivered: AtomicU64,
    pub incomplete: AtomicU64,
    pub requeued: AtomicU64,
    pub starved: AtomicU64,
}

/// Point-in-time copy of [`SimStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimCounters {
    pub connects: u64,
    pub disconnects: u64,
    pub starts: u64,
    pub stops: u64,
    pub delivered: u64,
    pub incomplete: u64,
    pub requeued: u64,
    pub starved: u64,
}

impl SimStats {
    pub fn snapshot(&self) -> SimCounters {
        SimCounters {
            connects: self.connects.load(Ordering::SeqCst),
            disconnects: self.disconnects.load(Ordering::SeqCst),
            starts: self.starts.load(Ordering::SeqCst),
            stops: self.stops.load(Ordering::SeqCst),
            delivered: self.delivered.load(Ordering::SeqCst),
            incomplete: self.incomplete.load(Ordering::SeqCst),
            requeued: self.requeued.load(Ordering::SeqCst),
            starved: self.starved.load(Ordering::SeqCst),
        }
    }
}

/// State shared by everything that touches one simulated camera.
#[derive(Debug, Default)]
pub(crate) struct SimShared {
    pub(crate) reachable: AtomicBool,
    pub(crate) connected: AtomicBool,
    pub(crate) fail_next_start: AtomicBool,
    /// Every k-th hardware frame is delivered incomplete; 0 disables.
    pub(crate) incomplete_every: AtomicU64,
    pub(crate) hardware_frames: AtomicU64,
    pub(crate) stats: SimStats,
}

/// Free-list of announced buffers.
pub(crate) struct BufferQueue {
    free: Mutex<VecDeque<usize>>,
    stats: Arc<SimShared>,
}

impl BufferQueue {
    fn new(buffer_count: usize, shared: Arc<SimShared>) -> Self {
        Self {
            free: Mutex::new((0..buffer_count).collect()),
            stats: shared,
        }
    }

    fn take(&self) -> Option<usize> {
        self.free.lock().pop_front()
    }
}

impl FrameQueue for BufferQueue {
    fn queue_frame(&self, buffer_id: usize) {
        self.free.lock().push_back(buffer_id);
        self.stats.stats.requeued.fetch_add(1, Ordering::SeqCst);
    }
}

/// Everything needed to produce frames into a handler.
pub(crate) struct Producer {
    handler: StreamHandler,
    buffers: Vec<Vec<u16>>,
    queue: BufferQueue,
    node_map: Arc<Mutex<NodeMap>>,
    shared: Arc<SimShared>,
}

impl Producer {
    pub(crate) fn new(
        handler: StreamHandler,
        buffer_count: usize,
        node_map: Arc<Mutex<NodeMap>>,
        shared: Arc<SimShared>,
    ) -> Self {
        Self {
            handler,
            buffers: vec![Vec::new(); buffer_count],
            queue: BufferQueue::new(buffer_count, Arc::clone(&shared)),
            node_map,
            shared,
        }
    }

    fn scheduled_status(&self, hardware_frame: u64) -> i32 {
        let every = self.shared.incomplete_every.load(Ordering::SeqCst);
        if every > 0 && (hardware_frame + 1) % every == 0 {
            FRAME_STATUS_INCOMPLETE
        } else {
            FRAME_STATUS_COMPLETE
        }
    }

    /// Fill the next free buffer and hand it to the handler. Returns `false`
    /// when every buffer is still held by the consumer.
    pub(crate) fn produce(&mut self, forced_status: Option<i32>) -> bool {
        let Some(buffer_id) = self.queue.take() else {
            self.shared.stats.starved.fetch_add(1, Ordering::SeqCst);
            trace!("no queued buffer available, frame skipped");
            return false;
        };

        let (rows, cols) = self.node_map.lock().readout();
        let hardware_frame = self.shared.hardware_frames.fetch_add(1, Ordering::SeqCst);
        let status = forced_status.unwrap_or_else(|| self.scheduled_status(hardware_frame));

        let buffer = &mut self.buffers[buffer_id];
        fill_pattern(buffer, rows, cols, hardware_frame);

        let frame = VendorFrame {
            buffer_id,
            pixels: buffer,
            width: cols,
            height: rows,
            status,
            timestamp_ns: Some(hardware_frame * 1_000_000),
        };
        (self.handler)(&frame, &self.queue);

        let stats = &self.shared.stats;
        stats.delivered.fetch_add(1, Ordering::SeqCst);
        if status != FRAME_STATUS_COMPLETE {
            stats.incomplete.fetch_add(1, Ordering::SeqCst);
        }
        true
    }

    fn period(&self) -> Duration {
        let hz = self.node_map.lock().frame_rate().max(1.0);
        Duration::from_secs_f64(1.0 / hz)
    }
}

/// Mono12 diagonal ramp that shifts by one every hardware frame.
fn fill_pattern(buffer: &mut Vec<u16>, rows: u32, cols: u32, hardware_frame: u64) {
    buffer.clear();
    buffer.extend((0..rows).flat_map(|r| {
        (0..cols).map(move |c| ((u64::from(r) + u64::from(c) + hardware_frame) & 0x0FFF) as u16)
    }));
}

/// Background thread delivering frames at the node map's frame rate.
pub(crate) struct TimedStream {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl TimedStream {
    pub(crate) fn spawn(mut producer: Producer) -> DaqResult<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name("sim-camera-delivery".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(producer.period()) {
                    Err(RecvTimeoutError::Timeout) => {
                        producer.produce(None);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        debug!("simulated delivery thread exiting");
                        break;
                    }
                }
            })
            .map_err(|e| DaqError::Device(format!("failed to spawn delivery thread: {e}")))?;
        Ok(Self { stop_tx, handle })
    }

    /// Signal the thread and wait until its last handler call has returned.
    pub(crate) fn stop(self) -> DaqResult<()> {
        let _ = self.stop_tx.send(());
        self.handle
            .join()
            .map_err(|_| DaqError::Device("simulated delivery thread panicked".into()))
    }
}
