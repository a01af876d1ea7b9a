use crate::node_map::{Feature, NodeMap};
use crate::stream::{Producer, SimCounters, SimShared, FRAME_STATUS_INCOMPLETE};
use daq_core::DaqResult;
use daq_driver_genicam::features::FRAME_STATUS_COMPLETE;
use daq_driver_genicam::FeatureValue;
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Test-side handle onto a [`crate::SimulatedTransport`].
///
/// Stays valid after the transport has been moved into an adapter and a
/// controller, which is the point: tests keep the probe and hand the
/// transport away.
#[derive(Clone)]
pub struct SimulatedProbe {
    node_map: Arc<Mutex<NodeMap>>,
    shared: Arc<SimShared>,
    manual: Arc<Mutex<Option<Producer>>>,
}

impl SimulatedProbe {
    pub(crate) fn new(
        node_map: Arc<Mutex<NodeMap>>,
        shared: Arc<SimShared>,
        manual: Arc<Mutex<Option<Producer>>>,
    ) -> Self {
        Self {
            node_map,
            shared,
            manual,
        }
    }

    /// Produce one frame with the given vendor status in manual mode.
    ///
    /// Returns `false` when no manual stream is running or no buffer is
    /// queued. Runs the handler on the calling thread.
    pub fn deliver(&self, status: i32) -> bool {
        match self.manual.lock().as_mut() {
            Some(producer) => producer.produce(Some(status)),
            None => false,
        }
    }

    pub fn deliver_complete(&self) -> bool {
        self.deliver(FRAME_STATUS_COMPLETE)
    }

    pub fn deliver_incomplete(&self) -> bool {
        self.deliver(FRAME_STATUS_INCOMPLETE)
    }

    /// Deliver `n` complete frames, returning how many went out.
    pub fn deliver_many(&self, n: usize) -> usize {
        (0..n).filter(|_| self.deliver_complete()).count()
    }

    /// Whether the transport currently holds a connection.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SimCounters {
        self.shared.stats.snapshot()
    }

    /// Current node-map value, bypassing the connection check.
    pub fn feature(&self, name: &str) -> DaqResult<FeatureValue> {
        self.node_map.lock().get(name)
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.node_map.lock().float(name)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.node_map.lock().int(name)
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.shared.reachable.store(reachable, Ordering::SeqCst);
    }

    /// The next `start_streaming` call fails with a device error.
    pub fn fail_next_start(&self) {
        self.shared.fail_next_start.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes_to(&self, name: &str) {
        self.node_map.lock().fail_writes_to(name);
    }

    /// Replace a feature's value with no range or type check, the way a
    /// misbehaving device reports garbage.
    pub fn overwrite(&self, name: &str, value: FeatureValue) {
        let mut map = self.node_map.lock();
        let range = map.range(name).ok().flatten();
        map.insert(name, Feature { value, range });
    }

    pub fn clear_faults(&self) {
        self.node_map.lock().clear_faults();
    }
}
