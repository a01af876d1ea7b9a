//! Frame acceptance on the hardware delivery thread.
//!
//! [`FrameDispatch`] is the only state the delivery thread touches. It never
//! takes the controller's control lock: geometry is mirrored into a separate
//! `RwLock`, the counter is atomic and the latest frame sits in a
//! [`FrameBuffer`].

use crate::frame_buffer::FrameBuffer;
use crate::subscribers::SubscriberRegistry;
use daq_core::{limits, DaqError, DaqResult, Frame, FrameSink, Geometry, RawFrame};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Counts kept by the acceptance path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    /// Frames published with a counter.
    pub complete: u64,
    pub incomplete: u64,
    /// Complete frames whose shape or size did not match the geometry.
    pub rejected: u64,
    pub subscriber_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    complete: AtomicU64,
    incomplete: AtomicU64,
    rejected: AtomicU64,
    subscriber_failures: AtomicU64,
}

pub struct FrameDispatch {
    /// Counter the next accepted frame receives.
    next_counter: AtomicU64,
    geometry: RwLock<Option<Geometry>>,
    buffer: FrameBuffer,
    subscribers: Arc<SubscriberRegistry>,
    counters: Counters,
}

impl Default for FrameDispatch {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDispatch {
    pub fn new() -> Self {
        Self {
            next_counter: AtomicU64::new(0),
            geometry: RwLock::new(None),
            buffer: FrameBuffer::new(),
            subscribers: Arc::new(SubscriberRegistry::new()),
            counters: Counters::default(),
        }
    }

    /// Sink handed to the adapter's `start_streaming`.
    pub fn sink(self: &Arc<Self>) -> FrameSink {
        let dispatch = Arc::clone(self);
        Arc::new(move |raw: RawFrame<'_>| dispatch.on_frame(raw))
    }

    /// Shape subsequent frames must have. Only updated while the device is
    /// not streaming.
    pub fn set_geometry(&self, geometry: Geometry) {
        *self.geometry.write() = Some(geometry);
    }

    /// Skip one counter value so subscribers can see where a restart
    /// happened. Does nothing before the first frame.
    pub fn mark_discontinuity(&self) {
        let _ = self
            .next_counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| {
                (next > 0).then_some(next + 1)
            });
    }

    /// Accept one delivery: drop it if incomplete or misshapen, otherwise
    /// copy, number, publish and fan out.
    pub fn on_frame(&self, raw: RawFrame<'_>) {
        if !raw.is_complete() {
            let dropped = self.counters.incomplete.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                rows = raw.rows,
                cols = raw.cols,
                dropped,
                "Incomplete frame dropped"
            );
            return;
        }

        if let Err(e) = self.check_shape(&raw) {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Frame rejected");
            return;
        }

        let counter = self.next_counter.fetch_add(1, Ordering::SeqCst);
        let frame = match Frame::copy_from_raw(&raw, counter) {
            Ok(frame) => Arc::new(frame),
            Err(e) => {
                // Shape was checked above; a failure here has consumed a counter.
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(counter, error = %e, "Frame copy failed");
                return;
            }
        };

        self.buffer.publish(Arc::clone(&frame));
        self.counters.complete.fetch_add(1, Ordering::Relaxed);

        let outcome = self.subscribers.notify(&frame);
        if outcome.failed > 0 {
            self.counters
                .subscriber_failures
                .fetch_add(outcome.failed as u64, Ordering::Relaxed);
        }
        trace!(counter, delivered = outcome.delivered, "Frame published");
    }

    fn check_shape(&self, raw: &RawFrame<'_>) -> DaqResult<()> {
        let size = limits::frame_size(raw.rows, raw.cols)?;
        if raw.pixels.len() != size.pixels {
            return Err(DaqError::IncompleteFrame(format!(
                "buffer holds {} pixels, header says {}x{}",
                raw.pixels.len(),
                raw.rows,
                raw.cols
            )));
        }
        if let Some(geometry) = *self.geometry.read() {
            if geometry.shape() != (raw.rows, raw.cols) {
                return Err(DaqError::UnsupportedGeometry(format!(
                    "frame is {}x{}, configured geometry is {}x{}",
                    raw.rows, raw.cols, geometry.rows, geometry.cols
                )));
            }
        }
        Ok(())
    }

    /// Counter of the latest published frame; 0 before the first one.
    pub fn frame_counter(&self) -> u64 {
        self.buffer.counter().unwrap_or(0)
    }

    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.buffer.latest()
    }

    pub fn subscribers(&self) -> &Arc<SubscriberRegistry> {
        &self.subscribers
    }

    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            complete: self.counters.complete.load(Ordering::Relaxed),
            incomplete: self.counters.incomplete.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            subscriber_failures: self.counters.subscriber_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscribers::FrameCallback;
    use daq_core::FrameStatus;
    use parking_lot::Mutex;
    use tracing_test::traced_test;

    fn raw(pixels: &[u16], rows: u32, cols: u32, status: FrameStatus) -> RawFrame<'_> {
        RawFrame {
            pixels,
            rows,
            cols,
            status,
            timestamp_ns: Some(42),
        }
    }

    fn counting(seen: &Arc<Mutex<Vec<u64>>>) -> FrameCallback {
        let seen = Arc::clone(seen);
        Arc::new(move |frame: &Arc<Frame>| -> anyhow::Result<()> {
            seen.lock().push(frame.counter());
            Ok(())
        })
    }

    #[test]
    fn test_counters_start_at_zero() {
        let dispatch = FrameDispatch::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        dispatch.subscribers().register(counting(&seen));

        let pixels = [1u16; 6];
        for _ in 0..3 {
            dispatch.on_frame(raw(&pixels, 2, 3, FrameStatus::Complete));
        }
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
        assert_eq!(dispatch.frame_counter(), 2);
        assert_eq!(dispatch.latest_frame().unwrap().timestamp_ns(), Some(42));
    }

    #[test]
    fn test_incomplete_frames_do_not_advance() {
        let dispatch = FrameDispatch::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        dispatch.subscribers().register(counting(&seen));

        let pixels = [0u16; 4];
        dispatch.on_frame(raw(&pixels, 2, 2, FrameStatus::Complete));
        dispatch.on_frame(raw(&pixels, 2, 2, FrameStatus::Incomplete));
        dispatch.on_frame(raw(&pixels, 2, 2, FrameStatus::Complete));

        assert_eq!(*seen.lock(), vec![0, 1]);
        let stats = dispatch.stats();
        assert_eq!(stats.complete, 2);
        assert_eq!(stats.incomplete, 1);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let dispatch = FrameDispatch::new();
        dispatch.set_geometry(Geometry {
            rows: 2,
            cols: 2,
            binning: 1,
        });
        let wrong = [0u16; 6];
        dispatch.on_frame(raw(&wrong, 2, 3, FrameStatus::Complete));
        let short = [0u16; 3];
        dispatch.on_frame(raw(&short, 2, 2, FrameStatus::Complete));

        assert!(dispatch.latest_frame().is_none());
        assert_eq!(dispatch.stats().rejected, 2);

        let right = [0u16; 4];
        dispatch.on_frame(raw(&right, 2, 2, FrameStatus::Complete));
        assert_eq!(dispatch.latest_frame().unwrap().counter(), 0);
    }

    #[test]
    fn test_discontinuity_leaves_gap() {
        let dispatch = FrameDispatch::new();
        dispatch.mark_discontinuity();
        let pixels = [0u16; 4];
        dispatch.on_frame(raw(&pixels, 2, 2, FrameStatus::Complete));
        assert_eq!(dispatch.frame_counter(), 0);

        dispatch.mark_discontinuity();
        dispatch.on_frame(raw(&pixels, 2, 2, FrameStatus::Complete));
        assert_eq!(dispatch.frame_counter(), 2);
    }

    #[test]
    fn test_subscriber_failures_counted() {
        let dispatch = FrameDispatch::new();
        dispatch
            .subscribers()
            .register(Arc::new(|_: &Arc<Frame>| -> anyhow::Result<()> {
                anyhow::bail!("rejecting")
            }));
        let pixels = [0u16; 4];
        dispatch.on_frame(raw(&pixels, 2, 2, FrameStatus::Complete));
        assert_eq!(dispatch.stats().subscriber_failures, 1);
        assert_eq!(dispatch.frame_counter(), 0);
    }

    #[test]
    #[traced_test]
    fn test_dropped_frames_are_logged() {
        let dispatch = FrameDispatch::new();
        let pixels = [0u16; 4];
        dispatch.on_frame(raw(&pixels, 2, 2, FrameStatus::Incomplete));
        assert!(logs_contain("Incomplete frame dropped"));

        dispatch.set_geometry(Geometry {
            rows: 4,
            cols: 4,
            binning: 1,
        });
        dispatch.on_frame(raw(&pixels, 2, 2, FrameStatus::Complete));
        assert!(logs_contain("Frame rejected"));
    }
}
