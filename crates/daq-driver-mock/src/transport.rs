//! Simulated GenICam transport.

use crate::node_map::NodeMap;
use crate::probe::SimulatedProbe;
use crate::stream::{Producer, SimShared, TimedStream};
use daq_core::{DaqError, DaqResult, ParameterRange};
use daq_driver_genicam::features as f;
use daq_driver_genicam::{FeatureValue, GenicamTransport, StreamHandler};
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_SENSOR_ROWS: u32 = 120;
pub const DEFAULT_SENSOR_COLS: u32 = 160;

enum StreamState {
    Idle,
    Timed(TimedStream),
    /// Frames are produced only when a probe asks for them.
    Manual,
}

/// In-process stand-in for a GigE Vision camera.
///
/// Frames come either from a background thread pacing itself on the node
/// map's frame-rate register, or, in manual mode, one at a time through
/// [`SimulatedProbe::deliver`].
pub struct SimulatedTransport {
    node_map: Arc<Mutex<NodeMap>>,
    shared: Arc<SimShared>,
    manual: Arc<Mutex<Option<Producer>>>,
    manual_delivery: bool,
    stream: StreamState,
    model: String,
    device_id: String,
}

impl SimulatedTransport {
    pub fn builder() -> SimulatedTransportBuilder {
        SimulatedTransportBuilder::default()
    }

    /// Timed camera with the default node map.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Handle for observing and steering this transport from tests.
    pub fn probe(&self) -> SimulatedProbe {
        SimulatedProbe::new(
            Arc::clone(&self.node_map),
            Arc::clone(&self.shared),
            Arc::clone(&self.manual),
        )
    }

    pub fn is_streaming(&self) -> bool {
        !matches!(self.stream, StreamState::Idle)
    }

    fn connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> DaqResult<()> {
        if self.connected() {
            Ok(())
        } else {
            Err(DaqError::DeviceUnavailable(format!(
                "{} is not connected",
                self.device_id
            )))
        }
    }

    fn halt(&mut self) -> DaqResult<()> {
        match std::mem::replace(&mut self.stream, StreamState::Idle) {
            StreamState::Idle => Ok(()),
            StreamState::Timed(stream) => {
                self.shared.stats.stops.fetch_add(1, Ordering::SeqCst);
                stream.stop()
            }
            StreamState::Manual => {
                self.shared.stats.stops.fetch_add(1, Ordering::SeqCst);
                // Waits for an in-flight probe delivery to finish.
                self.manual.lock().take();
                Ok(())
            }
        }
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SimulatedTransport {
    fn drop(&mut self) {
        if let Err(e) = self.halt() {
            warn!(error = %e, "simulated stream did not stop cleanly");
        }
    }
}

impl GenicamTransport for SimulatedTransport {
    fn connect(&mut self) -> DaqResult<()> {
        if !self.shared.reachable.load(Ordering::SeqCst) {
            return Err(DaqError::DeviceUnavailable(format!(
                "no camera answered at {}",
                self.device_id
            )));
        }
        self.shared.connected.store(true, Ordering::SeqCst);
        self.shared.stats.connects.fetch_add(1, Ordering::SeqCst);
        debug!(device = %self.device_id, "simulated camera connected");
        Ok(())
    }

    fn disconnect(&mut self) -> DaqResult<()> {
        self.halt()?;
        if self.shared.connected.swap(false, Ordering::SeqCst) {
            self.shared.stats.disconnects.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }

    fn device_id(&self) -> String {
        self.device_id.clone()
    }

    fn has_feature(&self, name: &str) -> bool {
        self.connected() && self.node_map.lock().contains(name)
    }

    fn feature_names(&self) -> Vec<String> {
        if self.connected() {
            self.node_map.lock().names()
        } else {
            Vec::new()
        }
    }

    fn feature(&self, name: &str) -> DaqResult<FeatureValue> {
        self.ensure_connected()?;
        self.node_map.lock().get(name)
    }

    fn set_feature(&mut self, name: &str, value: FeatureValue) -> DaqResult<()> {
        self.ensure_connected()?;
        self.node_map.lock().set(name, value)
    }

    fn feature_range(&self, name: &str) -> DaqResult<Option<ParameterRange>> {
        self.ensure_connected()?;
        self.node_map.lock().range(name)
    }

    fn execute(&mut self, command: &str) -> DaqResult<()> {
        self.ensure_connected()?;
        let mut map = self.node_map.lock();
        if !map.is_command(command) {
            return Err(DaqError::UnsupportedControl(command.to_string()));
        }
        if command == f::GVSP_ADJUST_PACKET_SIZE {
            // Negotiation settles on the largest packet the link accepts.
            let max = map
                .range(f::GVSP_PACKET_SIZE)?
                .map_or(f::DEFAULT_PACKET_SIZE as f64, |range| range.max);
            map.set(f::GVSP_PACKET_SIZE, FeatureValue::Int(max as i64))?;
        }
        Ok(())
    }

    fn is_command_done(&self, command: &str) -> DaqResult<bool> {
        self.ensure_connected()?;
        if self.node_map.lock().is_command(command) {
            Ok(true)
        } else {
            Err(DaqError::UnsupportedControl(command.to_string()))
        }
    }

    fn start_streaming(&mut self, handler: StreamHandler, buffer_count: usize) -> DaqResult<()> {
        self.ensure_connected()?;
        if self.is_streaming() {
            return Err(DaqError::Device("stream already running".into()));
        }
        if self.shared.fail_next_start.swap(false, Ordering::SeqCst) {
            return Err(DaqError::Device("simulated stream start failure".into()));
        }

        let producer = Producer::new(
            handler,
            buffer_count.max(1),
            Arc::clone(&self.node_map),
            Arc::clone(&self.shared),
        );
        self.stream = if self.manual_delivery {
            *self.manual.lock() = Some(producer);
            StreamState::Manual
        } else {
            StreamState::Timed(TimedStream::spawn(producer)?)
        };
        self.shared.stats.starts.fetch_add(1, Ordering::SeqCst);
        debug!(buffers = buffer_count, manual = self.manual_delivery, "simulated stream started");
        Ok(())
    }

    fn stop_streaming(&mut self) -> DaqResult<()> {
        self.halt()
    }
}

/// Shapes the simulated node map to resemble different camera families.
#[derive(Debug, Clone)]
pub struct SimulatedTransportBuilder {
    rows: u32,
    cols: u32,
    frame_rate_hz: Option<f64>,
    decimation_only: bool,
    without_binning: bool,
    plain_register_names: bool,
    without_throughput: bool,
    link_throughput_name: bool,
    manual_delivery: bool,
    incomplete_every: u64,
    reachable: bool,
    device_id: String,
}

impl Default for SimulatedTransportBuilder {
    fn default() -> Self {
        Self {
            rows: DEFAULT_SENSOR_ROWS,
            cols: DEFAULT_SENSOR_COLS,
            frame_rate_hz: None,
            decimation_only: false,
            without_binning: false,
            plain_register_names: false,
            without_throughput: false,
            link_throughput_name: false,
            manual_delivery: false,
            incomplete_every: 0,
            reachable: true,
            device_id: "sim-0".to_string(),
        }
    }
}

impl SimulatedTransportBuilder {
    pub fn with_sensor(mut self, rows: u32, cols: u32) -> Self {
        self.rows = rows.max(1);
        self.cols = cols.max(1);
        self
    }

    /// Initial value of the frame-rate register.
    pub fn with_frame_rate(mut self, hz: f64) -> Self {
        self.frame_rate_hz = Some(hz);
        self
    }

    /// Replace `Binning*` with `Decimation*`.
    pub fn with_decimation_only(mut self) -> Self {
        self.decimation_only = true;
        self
    }

    /// Remove every binning and decimation register.
    pub fn without_binning(mut self) -> Self {
        self.without_binning = true;
        self
    }

    /// Use `ExposureTime` / `AcquisitionFrameRate` instead of the `*Abs` names.
    pub fn with_plain_register_names(mut self) -> Self {
        self.plain_register_names = true;
        self
    }

    pub fn without_throughput_control(mut self) -> Self {
        self.without_throughput = true;
        self
    }

    /// Expose the throughput cap as `DeviceLinkThroughputLimit`.
    pub fn with_link_throughput_name(mut self) -> Self {
        self.link_throughput_name = true;
        self
    }

    /// Deliver frames only on [`SimulatedProbe::deliver`].
    pub fn manual_delivery(mut self) -> Self {
        self.manual_delivery = true;
        self
    }

    /// Report every `k`-th hardware frame as incomplete.
    pub fn incomplete_every(mut self, k: u64) -> Self {
        self.incomplete_every = k;
        self
    }

    /// `connect` fails until the probe marks the camera reachable.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    pub fn build(self) -> SimulatedTransport {
        let mut map = NodeMap::gige(self.rows, self.cols);

        if self.without_binning {
            map.remove(f::BINNING_HORIZONTAL);
            map.remove(f::BINNING_VERTICAL);
        } else if self.decimation_only {
            map.rename(f::BINNING_HORIZONTAL, f::DECIMATION_HORIZONTAL);
            map.rename(f::BINNING_VERTICAL, f::DECIMATION_VERTICAL);
        }
        if self.plain_register_names {
            map.rename(f::EXPOSURE_TIME[0], f::EXPOSURE_TIME[1]);
            map.rename(f::ACQUISITION_FRAME_RATE[0], f::ACQUISITION_FRAME_RATE[1]);
        }
        if self.without_throughput {
            map.remove(f::STREAM_THROUGHPUT[0]);
        } else if self.link_throughput_name {
            map.rename(f::STREAM_THROUGHPUT[0], f::STREAM_THROUGHPUT[1]);
        }
        if let Some(hz) = self.frame_rate_hz {
            for name in f::ACQUISITION_FRAME_RATE {
                if map.contains(name) {
                    let _ = map.set(name, FeatureValue::Float(hz));
                }
            }
        }

        let shared = SimShared::default();
        shared.reachable.store(self.reachable, Ordering::SeqCst);
        shared
            .incomplete_every
            .store(self.incomplete_every, Ordering::SeqCst);

        SimulatedTransport {
            node_map: Arc::new(Mutex::new(map)),
            shared: Arc::new(shared),
            manual: Arc::new(Mutex::new(None)),
            manual_delivery: self.manual_delivery,
            stream: StreamState::Idle,
            model: "SimCam Mono12".to_string(),
            device_id: self.device_id,
        }
    }
}
