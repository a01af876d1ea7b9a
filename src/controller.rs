//! Camera controller
//!
//! [`CameraController`] owns one [`DeviceCapability`] and serializes every
//! control operation behind a single mutex. The controller, not the adapter,
//! is the source of truth for geometry and the acquisition state.
//!
//! ## Threads
//!
//! - Caller threads take the control lock for the full duration of an
//!   operation, including any stop/restart of the hardware stream.
//! - State, sensor, geometry and binnings are mirrored in a status lock that
//!   is only ever held for a copy. Accessors read it without touching the
//!   control lock, so subscribers may call them from the delivery thread.
//! - The adapter's delivery thread otherwise only enters [`FrameDispatch`],
//!   which has its own locks. Subscribers must not call control operations:
//!   those wait on the control lock while it is held across a stream stop.
//!
//! ## State machine
//!
//! ```text
//! Idle --start_acquisition--> Streaming --stop_acquisition--> Idle
//! Streaming --set_binning--> (stop, reconfigure, start) --> Streaming
//! any --deinitialize--> released
//! ```
//!
//! Every failure while reconfiguring or starting leaves the device Idle.

use crate::collector::FutureFrameCollector;
use crate::config::CameraConfig;
use crate::dispatch::{DeliveryStats, FrameDispatch};
use crate::subscribers::{FrameCallback, SubscriberId};
use daq_core::{DaqError, DaqResult, DeviceCapability, Frame, Geometry, ParameterRange, SensorSize};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AcquisitionState {
    Idle,
    Streaming,
}

/// Snapshot returned by [`CameraController::describe`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraInfo {
    pub name: String,
    pub model: String,
    pub sensor: SensorSize,
    pub bits_per_pixel: Option<u32>,
    pub pixel_format: Option<String>,
    pub geometry: Geometry,
    pub supported_binnings: Vec<u32>,
    pub state: AcquisitionState,
    pub frame_counter: u64,
}

struct ControlState {
    device: Box<dyn DeviceCapability>,
    /// Set once the hardware handle has been closed.
    released: bool,
}

/// Written only while the control lock is held.
#[derive(Debug, Clone)]
struct Status {
    state: AcquisitionState,
    sensor: SensorSize,
    geometry: Geometry,
    binnings: Vec<u32>,
}

pub struct CameraController {
    name: String,
    config: CameraConfig,
    control: Mutex<ControlState>,
    status: RwLock<Status>,
    dispatch: Arc<FrameDispatch>,
}

impl std::fmt::Debug for CameraController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraController")
            .field("name", &self.name)
            .field("frame_counter", &self.frame_counter())
            .finish_non_exhaustive()
    }
}

impl CameraController {
    /// Open `device` and bring it to the configured binning and throughput.
    ///
    /// The device is closed again if any step after `open` fails.
    pub fn new(mut device: Box<dyn DeviceCapability>, config: CameraConfig) -> DaqResult<Self> {
        config
            .validate()
            .map_err(|e| DaqError::InvalidConfig(e.to_string()))?;

        if let Err(e) = device.open() {
            if let Err(close_err) = device.close() {
                warn!(error = %close_err, "Close after failed open also failed");
            }
            return Err(e);
        }
        let status = match Self::initialize(device.as_mut(), &config) {
            Ok((sensor, geometry, binnings)) => Status {
                state: AcquisitionState::Idle,
                sensor,
                geometry,
                binnings,
            },
            Err(e) => {
                if let Err(close_err) = device.close() {
                    warn!(error = %close_err, "Close after failed initialization also failed");
                }
                return Err(e);
            }
        };

        let dispatch = Arc::new(FrameDispatch::new());
        dispatch.set_geometry(status.geometry);
        info!(
            camera = %config.name,
            model = %device.model(),
            rows = status.geometry.rows,
            cols = status.geometry.cols,
            binning = status.geometry.binning,
            "Camera initialized"
        );

        Ok(Self {
            name: config.name.clone(),
            config,
            control: Mutex::new(ControlState {
                device,
                released: false,
            }),
            status: RwLock::new(status),
            dispatch,
        })
    }

    fn initialize(
        device: &mut dyn DeviceCapability,
        config: &CameraConfig,
    ) -> DaqResult<(SensorSize, Geometry, Vec<u32>)> {
        let sensor = device.sensor_size()?;
        let binnings = match device.supported_binnings() {
            Ok(binnings) => binnings,
            Err(e) if e.is_unsupported() => {
                debug!(error = %e, "Device has no binning control, fixed at 1");
                vec![1]
            }
            Err(e) => return Err(e),
        };
        let geometry = Self::checked_geometry(sensor, &binnings, config.binning)?;
        match device.set_geometry(geometry) {
            Ok(()) => {}
            Err(DaqError::UnsupportedGeometry(reason)) if geometry.binning == 1 => {
                debug!(%reason, "Keeping device readout window at binning 1");
            }
            Err(e) => return Err(e),
        }

        if let Some(bytes_per_second) = config.stream_bytes_per_second {
            if !device.set_stream_throughput(bytes_per_second)? {
                debug!("Device has no stream throughput control");
            }
        }
        Ok((sensor, geometry, binnings))
    }

    fn checked_geometry(sensor: SensorSize, binnings: &[u32], binning: u32) -> DaqResult<Geometry> {
        if !binnings.contains(&binning) {
            return Err(DaqError::UnsupportedGeometry(format!(
                "binning {binning} not in supported set {binnings:?}"
            )));
        }
        Geometry::binned(sensor, binning)
    }

    /// Run `op` with the control lock held, refusing once released.
    fn with_device<T>(&self, op: impl FnOnce(&mut ControlState) -> DaqResult<T>) -> DaqResult<T> {
        let mut control = self.control.lock();
        if control.released {
            return Err(DaqError::DeviceUnavailable(format!(
                "{} has been deinitialized",
                self.name
            )));
        }
        op(&mut control)
    }

    /// Stop the stream if running, apply `mutate`, restart if it was running.
    ///
    /// The state is Idle from the moment the stream is stopped, so an error
    /// anywhere leaves the device Idle.
    fn reconfigure<T>(
        &self,
        control: &mut ControlState,
        mutate: impl FnOnce(&mut ControlState) -> DaqResult<T>,
    ) -> DaqResult<T> {
        let was_streaming = self.state() == AcquisitionState::Streaming;
        if was_streaming {
            self.set_state(AcquisitionState::Idle);
            control.device.stop_streaming()?;
            debug!(camera = %self.name, "Stream stopped for reconfiguration");
        }
        let output = mutate(control)?;
        if was_streaming {
            self.dispatch.mark_discontinuity();
            self.begin_streaming(control)?;
            info!(camera = %self.name, "Stream restarted after reconfiguration");
        }
        Ok(output)
    }

    fn begin_streaming(&self, control: &mut ControlState) -> DaqResult<()> {
        control.device.configure_continuous()?;
        if self.config.start_at_max_frame_rate {
            let range = control.device.frame_rate_range()?;
            let rate = self.capped_frame_rate(range);
            control.device.set_frame_rate(rate)?;
            debug!(frame_rate_hz = rate, "Running at capped maximum frame rate");
        }
        control.device.start_streaming(self.dispatch.sink())?;
        self.set_state(AcquisitionState::Streaming);
        Ok(())
    }

    fn set_state(&self, state: AcquisitionState) {
        self.status.write().state = state;
    }

    fn capped_frame_rate(&self, range: ParameterRange) -> f64 {
        (range.max * (1.0 - self.config.frame_rate_headroom)).max(range.min)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn state(&self) -> AcquisitionState {
        self.status.read().state
    }

    pub fn is_streaming(&self) -> bool {
        self.state() == AcquisitionState::Streaming
    }

    /// Cached geometry; always `(sensor.rows / binning, sensor.cols / binning)`.
    pub fn geometry(&self) -> Geometry {
        self.status.read().geometry
    }

    pub fn binning(&self) -> u32 {
        self.geometry().binning
    }

    pub fn sensor_size(&self) -> SensorSize {
        self.status.read().sensor
    }

    pub fn supported_binnings(&self) -> Vec<u32> {
        self.status.read().binnings.clone()
    }

    /// Change binning, restarting a running stream around the change.
    pub fn set_binning(&self, binning: u32) -> DaqResult<()> {
        self.with_device(|control| {
            let current = self.status.read().clone();
            let geometry = Self::checked_geometry(current.sensor, &current.binnings, binning)?;
            if geometry == current.geometry {
                debug!(binning, "Binning unchanged");
                return Ok(());
            }
            self.reconfigure(control, |control| {
                control.device.set_geometry(geometry)?;
                let readback = control.device.geometry()?;
                if readback.shape() != geometry.shape() {
                    return Err(DaqError::UnsupportedGeometry(format!(
                        "device reports {}x{} after applying {}x{}",
                        readback.rows, readback.cols, geometry.rows, geometry.cols
                    )));
                }
                self.status.write().geometry = geometry;
                self.dispatch.set_geometry(geometry);
                Ok(())
            })?;
            info!(
                camera = %self.name,
                binning,
                rows = geometry.rows,
                cols = geometry.cols,
                "Binning changed"
            );
            Ok(())
        })
    }

    pub fn exposure_time(&self) -> DaqResult<f64> {
        self.with_device(|control| control.device.exposure_time_ms())
    }

    pub fn exposure_range(&self) -> DaqResult<ParameterRange> {
        self.with_device(|control| control.device.exposure_range_ms())
    }

    /// Set exposure in milliseconds. Out-of-range values are rejected
    /// before the device is touched.
    pub fn set_exposure_time(&self, exposure_ms: f64) -> DaqResult<()> {
        self.with_device(|control| {
            let range = control.device.exposure_range_ms()?;
            range.check("exposure_time_ms", exposure_ms)?;
            control.device.set_exposure_time_ms(exposure_ms)?;
            info!(camera = %self.name, exposure_ms, "Exposure time set");
            Ok(())
        })
    }

    pub fn frame_rate(&self) -> DaqResult<f64> {
        self.with_device(|control| control.device.frame_rate())
    }

    /// Usable frame-rate bounds: the device range with headroom taken off
    /// the maximum.
    pub fn frame_rate_range(&self) -> DaqResult<ParameterRange> {
        self.with_device(|control| {
            let range = control.device.frame_rate_range()?;
            Ok(ParameterRange::new(range.min, self.capped_frame_rate(range)))
        })
    }

    /// Set the frame rate, capped at the device maximum minus the configured
    /// headroom. Returns the rate actually applied.
    pub fn set_frame_rate(&self, frame_rate_hz: f64) -> DaqResult<f64> {
        self.with_device(|control| {
            let range = control.device.frame_rate_range()?;
            let cap = self.capped_frame_rate(range);
            if frame_rate_hz.is_nan() || frame_rate_hz < range.min {
                return Err(DaqError::ParameterOutOfRange {
                    name: "frame_rate_hz".into(),
                    value: frame_rate_hz,
                    min: range.min,
                    max: cap,
                });
            }
            let applied = frame_rate_hz.min(cap);
            control.device.set_frame_rate(applied)?;
            if applied < frame_rate_hz {
                info!(
                    camera = %self.name,
                    requested = frame_rate_hz,
                    applied,
                    device_max = range.max,
                    "Frame rate capped"
                );
            } else {
                info!(camera = %self.name, frame_rate_hz = applied, "Frame rate set");
            }
            Ok(applied)
        })
    }

    /// Begin continuous acquisition. Already streaming is a no-op.
    pub fn start_acquisition(&self) -> DaqResult<()> {
        self.with_device(|control| {
            if self.state() == AcquisitionState::Streaming {
                warn!(camera = %self.name, "Acquisition already running");
                return Ok(());
            }
            self.begin_streaming(control)?;
            info!(camera = %self.name, "Acquisition started");
            Ok(())
        })
    }

    /// Stop acquisition. The state is Idle afterwards even if the device
    /// reports an error while stopping, and stopping an idle or released
    /// controller is a no-op.
    pub fn stop_acquisition(&self) -> DaqResult<()> {
        let mut control = self.control.lock();
        if control.released || self.state() == AcquisitionState::Idle {
            debug!(camera = %self.name, "Acquisition not running");
            return Ok(());
        }
        self.set_state(AcquisitionState::Idle);
        control.device.stop_streaming().inspect_err(|e| {
            warn!(camera = %self.name, error = %e, "Device error while stopping stream");
        })?;
        info!(camera = %self.name, "Acquisition stopped");
        Ok(())
    }

    /// Counter of the most recent frame; 0 before the first frame.
    pub fn frame_counter(&self) -> u64 {
        self.dispatch.frame_counter()
    }

    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.dispatch.latest_frame()
    }

    pub fn delivery_stats(&self) -> DeliveryStats {
        self.dispatch.stats()
    }

    /// Add a subscriber called with every published frame on the delivery
    /// thread. The callback must not call controller control operations.
    pub fn register_subscriber<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&Arc<Frame>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatch.subscribers().register(Arc::new(callback))
    }

    pub fn register_callback(&self, callback: FrameCallback) -> SubscriberId {
        self.dispatch.subscribers().register(callback)
    }

    pub fn unregister_subscriber(&self, id: SubscriberId) -> bool {
        self.dispatch.subscribers().unregister(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.dispatch.subscribers().len()
    }

    /// Subscribe a collector for the next `n` frames without waiting yet.
    pub fn future_frames(&self, n: usize) -> FutureFrameCollector {
        FutureFrameCollector::register(self.dispatch.subscribers(), n)
    }

    /// Wait for the next `n` frames. Does not start or stop acquisition.
    pub fn collect_future_frames(&self, n: usize, timeout: Duration) -> DaqResult<Vec<Arc<Frame>>> {
        self.future_frames(n).wait(timeout)
    }

    /// [`Self::collect_future_frames`] for async callers. The subscription
    /// is taken on the first poll, before the wait moves to a blocking
    /// thread.
    pub async fn collect_future_frames_async(
        &self,
        n: usize,
        timeout: Duration,
    ) -> DaqResult<Vec<Arc<Frame>>> {
        let collector = self.future_frames(n);
        tokio::task::spawn_blocking(move || collector.wait(timeout))
            .await
            .map_err(|e| DaqError::Device(format!("frame collection task failed: {e}")))?
    }

    /// Write a named device control, validated against its range.
    ///
    /// Geometry controls are refused; use [`Self::set_binning`].
    pub fn set_parameter(&self, name: &str, value: f64) -> DaqResult<()> {
        self.with_device(|control| {
            if control.device.is_geometry_control(name) {
                return Err(DaqError::UnsupportedControl(format!(
                    "{name} is managed by the controller"
                )));
            }
            let range = control.device.control_range(name)?;
            range.check(name, value)?;
            control.device.set_control(name, value)?;
            debug!(camera = %self.name, parameter = name, value, "Parameter set");
            Ok(())
        })
    }

    pub fn parameter(&self, name: &str) -> DaqResult<f64> {
        self.with_device(|control| control.device.control(name))
    }

    /// Every readable numeric device control.
    pub fn parameters(&self) -> DaqResult<BTreeMap<String, f64>> {
        self.with_device(|control| control.device.controls())
    }

    /// Cap the link throughput. `Ok(false)` when the device has no such
    /// control.
    pub fn set_stream_bytes_per_second(&self, bytes_per_second: u64) -> DaqResult<bool> {
        self.with_device(|control| control.device.set_stream_throughput(bytes_per_second))
    }

    /// Current link throughput cap, `None` when the device has no such
    /// control.
    pub fn stream_bytes_per_second(&self) -> DaqResult<Option<u64>> {
        self.with_device(|control| control.device.stream_throughput())
    }

    pub fn describe(&self) -> DaqResult<CameraInfo> {
        self.with_device(|control| {
            let status = self.status.read().clone();
            Ok(CameraInfo {
                name: self.name.clone(),
                model: control.device.model(),
                sensor: status.sensor,
                bits_per_pixel: control.device.bits_per_pixel()?,
                pixel_format: control.device.pixel_format()?,
                geometry: status.geometry,
                supported_binnings: status.binnings,
                state: status.state,
                frame_counter: self.dispatch.frame_counter(),
            })
        })
    }

    /// Stop acquisition and release the hardware handle.
    ///
    /// Safe to call repeatedly and after earlier failures. The handle is
    /// released even when stopping fails; the first error is returned.
    pub fn deinitialize(&self) -> DaqResult<()> {
        let mut control = self.control.lock();
        if control.released {
            return Ok(());
        }
        let mut first_error = None;
        if self.state() == AcquisitionState::Streaming {
            self.set_state(AcquisitionState::Idle);
            if let Err(e) = control.device.stop_streaming() {
                warn!(camera = %self.name, error = %e, "Stream stop failed during deinitialize");
                first_error = Some(e);
            }
        }
        if let Err(e) = control.device.close() {
            warn!(camera = %self.name, error = %e, "Device close failed");
            first_error.get_or_insert(e);
        }
        control.released = true;
        info!(camera = %self.name, "Camera released");
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        if let Err(e) = self.deinitialize() {
            warn!(camera = %self.name, error = %e, "Camera did not release cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daq_driver_mock::{
        simulated_camera, SimulatedProbe, SimulatedTransport, SimulatedTransportBuilder,
    };
    use std::sync::atomic::{AtomicU64, Ordering};

    fn controller(
        builder: SimulatedTransportBuilder,
        config: CameraConfig,
    ) -> (CameraController, SimulatedProbe) {
        let transport = builder.with_sensor(48, 64).manual_delivery().build();
        let probe = transport.probe();
        let camera = CameraController::new(Box::new(simulated_camera(transport)), config).unwrap();
        (camera, probe)
    }

    fn default_controller() -> (CameraController, SimulatedProbe) {
        controller(SimulatedTransport::builder(), CameraConfig::default())
    }

    #[test]
    fn test_construction_applies_config() {
        let config = CameraConfig {
            name: "left".into(),
            binning: 2,
            stream_bytes_per_second: Some(20_000_000),
            ..CameraConfig::default()
        };
        let (camera, probe) = controller(SimulatedTransport::builder(), config);
        assert_eq!(camera.name(), "left");
        assert_eq!(
            camera.geometry(),
            Geometry {
                rows: 24,
                cols: 32,
                binning: 2
            }
        );
        assert_eq!(probe.int("StreamBytesPerSecond"), Some(20_000_000));
        assert_eq!(camera.state(), AcquisitionState::Idle);
    }

    #[test]
    fn test_construction_rejects_unsupported_binning_and_closes() {
        let transport = SimulatedTransport::builder().with_sensor(48, 64).build();
        let config = CameraConfig {
            binning: 16,
            ..CameraConfig::default()
        };
        let err = CameraController::new(Box::new(simulated_camera(transport)), config).unwrap_err();
        assert!(matches!(err, DaqError::UnsupportedGeometry(_)));
    }

    #[test]
    fn test_invalid_config_rejected_before_open() {
        let transport = SimulatedTransport::builder().unreachable().build();
        let config = CameraConfig {
            collect_timeout_ms: 0,
            ..CameraConfig::default()
        };
        let err = CameraController::new(Box::new(simulated_camera(transport)), config).unwrap_err();
        assert!(matches!(err, DaqError::InvalidConfig(_)));
    }

    #[test]
    fn test_unreachable_device() {
        let transport = SimulatedTransport::builder().unreachable().build();
        let err = CameraController::new(Box::new(simulated_camera(transport)), CameraConfig::default())
            .unwrap_err();
        assert!(matches!(err, DaqError::DeviceUnavailable(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_without_binning_registers_stays_at_one() {
        let (camera, _probe) = controller(
            SimulatedTransport::builder().without_binning(),
            CameraConfig::default(),
        );
        assert_eq!(camera.supported_binnings(), vec![1]);
        assert!(matches!(
            camera.set_binning(2),
            Err(DaqError::UnsupportedGeometry(_))
        ));
        assert_eq!(camera.binning(), 1);
    }

    #[test]
    fn test_frame_rate_capped_with_headroom() {
        let (camera, probe) = default_controller();
        let applied = camera.set_frame_rate(1000.0).unwrap();
        assert!((applied - 198.0).abs() < 1e-9);
        assert_eq!(probe.float("AcquisitionFrameRateAbs"), Some(applied));
        assert_eq!(camera.set_frame_rate(50.0).unwrap(), 50.0);

        let err = camera.set_frame_rate(0.5).unwrap_err();
        assert!(matches!(err, DaqError::ParameterOutOfRange { min, .. } if min == 1.0));
        assert!(camera.set_frame_rate(f64::NAN).is_err());
        assert_eq!(camera.frame_rate().unwrap(), 50.0);
    }

    #[test]
    fn test_configurable_headroom() {
        let config = CameraConfig {
            frame_rate_headroom: 0.1,
            ..CameraConfig::default()
        };
        let (camera, _probe) = controller(SimulatedTransport::builder(), config);
        assert!((camera.frame_rate_range().unwrap().max - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_start_at_max_frame_rate() {
        let (camera, probe) = default_controller();
        camera.start_acquisition().unwrap();
        let rate = probe.float("AcquisitionFrameRateAbs").unwrap();
        assert!((rate - 198.0).abs() < 1e-9);
    }

    #[test]
    fn test_start_keeps_frame_rate_when_disabled() {
        let config = CameraConfig {
            start_at_max_frame_rate: false,
            ..CameraConfig::default()
        };
        let (camera, probe) = controller(SimulatedTransport::builder(), config);
        camera.set_frame_rate(40.0).unwrap();
        camera.start_acquisition().unwrap();
        assert_eq!(probe.float("AcquisitionFrameRateAbs"), Some(40.0));
    }

    #[test]
    fn test_start_is_idempotent() {
        let (camera, probe) = default_controller();
        camera.start_acquisition().unwrap();
        camera.start_acquisition().unwrap();
        assert_eq!(probe.stats().starts, 1);
        assert!(camera.is_streaming());
    }

    #[test]
    fn test_failed_start_leaves_idle() {
        let (camera, probe) = default_controller();
        probe.fail_next_start();
        assert!(camera.start_acquisition().is_err());
        assert_eq!(camera.state(), AcquisitionState::Idle);
        camera.start_acquisition().unwrap();
        assert!(camera.is_streaming());
    }

    #[test]
    fn test_failed_restart_after_binning_leaves_idle() {
        let (camera, probe) = default_controller();
        camera.start_acquisition().unwrap();
        probe.fail_next_start();
        assert!(camera.set_binning(2).is_err());
        assert_eq!(camera.state(), AcquisitionState::Idle);
        // Geometry was applied before the restart failed.
        assert_eq!(camera.binning(), 2);
    }

    #[test]
    fn test_failed_geometry_write_leaves_idle_and_old_geometry() {
        let (camera, probe) = default_controller();
        camera.start_acquisition().unwrap();
        probe.fail_writes_to("Height");
        assert!(matches!(camera.set_binning(4), Err(DaqError::Device(_))));
        assert_eq!(camera.state(), AcquisitionState::Idle);
        assert_eq!(camera.binning(), 1);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (camera, probe) = default_controller();
        camera.stop_acquisition().unwrap();
        assert_eq!(probe.stats().stops, 0);
    }

    #[test]
    fn test_set_parameter_validates_and_refuses_geometry() {
        let (camera, probe) = default_controller();
        camera.set_parameter("GVSPPacketSize", 8000.0).unwrap();
        assert_eq!(probe.int("GVSPPacketSize"), Some(8000));

        assert!(matches!(
            camera.set_parameter("GVSPPacketSize", 100.0),
            Err(DaqError::ParameterOutOfRange { .. })
        ));
        assert!(matches!(
            camera.set_parameter("Width", 10.0),
            Err(DaqError::UnsupportedControl(_))
        ));
        assert!(matches!(
            camera.set_parameter("NoSuchRegister", 1.0),
            Err(DaqError::UnsupportedControl(_))
        ));
        assert_eq!(camera.parameter("GVSPPacketSize").unwrap(), 8000.0);
        assert!(camera.parameters().unwrap().contains_key("ExposureTimeAbs"));
    }

    #[test]
    fn test_throughput_without_register() {
        let (camera, _probe) = controller(
            SimulatedTransport::builder().without_throughput_control(),
            CameraConfig::default(),
        );
        assert!(!camera.set_stream_bytes_per_second(1_000_000).unwrap());
    }

    #[test]
    fn test_describe() {
        let (camera, _probe) = default_controller();
        let info = camera.describe().unwrap();
        assert_eq!(info.name, "camera");
        assert!(info.model.starts_with("SimCam"));
        assert_eq!(info.sensor, SensorSize { rows: 48, cols: 64 });
        assert_eq!(info.state, AcquisitionState::Idle);
        assert_eq!(info.supported_binnings, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn test_operations_after_deinitialize() {
        let (camera, probe) = default_controller();
        camera.start_acquisition().unwrap();
        camera.deinitialize().unwrap();
        camera.deinitialize().unwrap();
        assert_eq!(probe.stats().stops, 1);
        assert!(matches!(
            camera.set_binning(2),
            Err(DaqError::DeviceUnavailable(_))
        ));
        assert!(camera.stop_acquisition().is_ok());
        assert!(!probe.deliver_complete());
    }

    #[test]
    fn test_subscriber_sees_frames_with_current_geometry() {
        let (camera, probe) = default_controller();
        let pixels = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&pixels);
        camera.register_subscriber(move |frame: &Arc<Frame>| {
            seen.store(frame.pixels().len() as u64, Ordering::SeqCst);
            Ok(())
        });
        camera.set_binning(2).unwrap();
        camera.start_acquisition().unwrap();
        assert!(probe.deliver_complete());
        assert_eq!(pixels.load(Ordering::SeqCst), 24 * 32);
    }
}
