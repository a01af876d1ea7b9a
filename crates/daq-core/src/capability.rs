//! Device capability contract
//!
//! Every vendor adapter implements [`DeviceCapability`]. The trait is the only
//! surface the controller uses to reach hardware. Adapters report missing
//! registers as `UnsupportedControl` / `UnsupportedGeometry` instead of
//! letting callers probe for them.
//!
//! # Ownership
//!
//! Adapters are owned by exactly one controller and are only ever called
//! while the controller's control lock is held, hence `&mut self` and
//! `Send` (not `Sync`). The streaming callback is the one exception: the
//! adapter invokes the [`FrameSink`] from its own delivery thread.
//!
//! # Source of truth
//!
//! The controller caches geometry and the acquisition flag. Adapters must not
//! treat their own copies of these as authoritative; `geometry()` is a
//! hardware readback used to verify a reconfiguration, nothing more.

use crate::error::{DaqError, DaqResult};
use crate::frame::{Geometry, RawFrame, SensorSize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Frame acceptance callback invoked on the hardware delivery thread.
///
/// The borrowed buffer is only valid for the duration of the call; the
/// adapter re-queues it once the sink returns.
pub type FrameSink = Arc<dyn Fn(RawFrame<'_>) + Send + Sync>;

/// Inclusive `[min, max]` bounds reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
}

impl ParameterRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Range for controls that report no bounds.
    pub fn unbounded() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    /// NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Reject `value` with `ParameterOutOfRange` unless it lies within bounds.
    pub fn check(&self, name: &str, value: f64) -> DaqResult<f64> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(DaqError::ParameterOutOfRange {
                name: name.to_string(),
                value,
                min: self.min,
                max: self.max,
            })
        }
    }
}

/// Per-vendor camera adapter.
pub trait DeviceCapability: Send {
    /// Human-readable model/identifier string.
    fn model(&self) -> String;

    /// Connect to the hardware. `DeviceUnavailable` if it cannot be reached.
    fn open(&mut self) -> DaqResult<()>;

    /// Release the hardware handle. Idempotent.
    fn close(&mut self) -> DaqResult<()>;

    fn sensor_size(&self) -> DaqResult<SensorSize>;

    /// Binning factors this device can represent, ascending.
    fn supported_binnings(&self) -> DaqResult<Vec<u32>>;

    /// Hardware readback of the current readout shape.
    fn geometry(&self) -> DaqResult<Geometry>;

    /// Program binning (or decimation), offsets and the readout window.
    fn set_geometry(&mut self, geometry: Geometry) -> DaqResult<()>;

    /// Read a named control. `UnsupportedControl` if the register is missing.
    fn control(&self, name: &str) -> DaqResult<f64>;

    /// Write a named control. `UnsupportedControl` if the register is missing.
    fn set_control(&mut self, name: &str, value: f64) -> DaqResult<()>;

    /// Bounds of a named control; [`ParameterRange::unbounded`] if the
    /// device does not report any.
    fn control_range(&self, name: &str) -> DaqResult<ParameterRange>;

    /// Snapshot of every readable numeric control.
    fn controls(&self) -> DaqResult<BTreeMap<String, f64>>;

    /// Controls the controller manages itself (binning, window, offsets).
    /// `set_parameter` refuses to write these directly.
    fn is_geometry_control(&self, _name: &str) -> bool {
        false
    }

    fn exposure_time_ms(&self) -> DaqResult<f64>;

    fn set_exposure_time_ms(&mut self, exposure_ms: f64) -> DaqResult<()>;

    fn exposure_range_ms(&self) -> DaqResult<ParameterRange>;

    fn frame_rate(&self) -> DaqResult<f64>;

    fn set_frame_rate(&mut self, frame_rate_hz: f64) -> DaqResult<()>;

    /// Bounds for the frame rate; `max` is the device-reported hardware limit.
    fn frame_rate_range(&self) -> DaqResult<ParameterRange>;

    /// Apply trigger and pixel-format defaults for continuous acquisition.
    fn configure_continuous(&mut self) -> DaqResult<()> {
        Ok(())
    }

    /// Cap the link data rate. Returns `false` when the device has no such
    /// control, which callers treat as success.
    fn set_stream_throughput(&mut self, _bytes_per_second: u64) -> DaqResult<bool> {
        Ok(false)
    }

    /// Current link data-rate cap, `None` when the device has no such control.
    fn stream_throughput(&self) -> DaqResult<Option<u64>> {
        Ok(None)
    }

    /// Active pixel format entry name, `None` if the device does not report one.
    fn pixel_format(&self) -> DaqResult<Option<String>> {
        Ok(None)
    }

    fn bits_per_pixel(&self) -> DaqResult<Option<u32>> {
        Ok(None)
    }

    /// Begin continuous delivery into `sink`. Never called while streaming.
    fn start_streaming(&mut self, sink: FrameSink) -> DaqResult<()>;

    /// Stop delivery. When this returns, `sink` will not be invoked again.
    fn stop_streaming(&mut self) -> DaqResult<()>;
}

/// Run `op` against each register name in turn until one is supported.
///
/// Only `UnsupportedControl` moves on to the next name; any other error is
/// returned immediately. When every name is unsupported the error lists all
/// of them.
pub fn with_fallback<T>(
    names: &[&str],
    mut op: impl FnMut(&str) -> DaqResult<T>,
) -> DaqResult<T> {
    for name in names {
        match op(name) {
            Err(DaqError::UnsupportedControl(_)) => {
                tracing::trace!(register = %name, "register not supported, trying next name");
            }
            other => return other,
        }
    }
    Err(DaqError::UnsupportedControl(names.join(" | ")))
}
