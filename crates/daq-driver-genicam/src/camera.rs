//! GenICam camera adapter
//!
//! Implements [`DeviceCapability`] on top of any [`GenicamTransport`].
//! Vendor naming differences are absorbed here:
//!
//! - binning through `Binning*`, falling back to `Decimation*`
//! - exposure through `ExposureTimeAbs`, falling back to `ExposureTime`
//!   (both in microseconds; the public API is milliseconds)
//! - frame rate through `AcquisitionFrameRateAbs` / `AcquisitionFrameRate`,
//!   bounded above by `AcquisitionFrameRateLimit` when present
//! - link throughput through `StreamBytesPerSecond` /
//!   `DeviceLinkThroughputLimit`, skipped when neither exists

use crate::features as f;
use crate::transport::{FeatureValue, FrameQueue, GenicamTransport, StreamHandler, VendorFrame};
use daq_core::{
    with_fallback, DaqError, DaqResult, DeviceCapability, FrameSink, FrameStatus, Geometry,
    ParameterRange, RawFrame, SensorSize,
};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Buffers announced to the streaming engine.
pub const DEFAULT_BUFFER_COUNT: usize = 10;

/// Upper bound on waiting for packet-size negotiation to finish.
const PACKET_SIZE_ADJUST_TIMEOUT: Duration = Duration::from_millis(500);

/// Which register pair implements binning on this camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinningRegisters {
    Binning,
    Decimation,
}

impl BinningRegisters {
    fn names(self) -> (&'static str, &'static str) {
        match self {
            BinningRegisters::Binning => (f::BINNING_HORIZONTAL, f::BINNING_VERTICAL),
            BinningRegisters::Decimation => (f::DECIMATION_HORIZONTAL, f::DECIMATION_VERTICAL),
        }
    }
}

pub struct GenicamCamera<T: GenicamTransport> {
    transport: T,
    connected: bool,
    buffer_count: usize,
}

impl<T: GenicamTransport> GenicamCamera<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            connected: false,
            buffer_count: DEFAULT_BUFFER_COUNT,
        }
    }

    pub fn with_buffer_count(mut self, buffer_count: usize) -> Self {
        self.buffer_count = buffer_count.max(1);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn binning_registers(&self) -> DaqResult<BinningRegisters> {
        let has_pair =
            |(h, v): (&str, &str)| self.transport.has_feature(h) && self.transport.has_feature(v);
        if has_pair(BinningRegisters::Binning.names()) {
            Ok(BinningRegisters::Binning)
        } else if has_pair(BinningRegisters::Decimation.names()) {
            Ok(BinningRegisters::Decimation)
        } else {
            Err(DaqError::UnsupportedGeometry(
                "neither binning nor decimation available".into(),
            ))
        }
    }

    fn int_feature(&self, name: &str) -> DaqResult<i64> {
        match self.transport.feature(name)? {
            FeatureValue::Int(v) => Ok(v),
            other => Err(DaqError::Device(format!(
                "feature {name} is not an integer: {other:?}"
            ))),
        }
    }

    fn set_int(&mut self, name: &str, value: i64) -> DaqResult<()> {
        self.transport.set_feature(name, FeatureValue::Int(value))
    }

    fn set_enum(&mut self, name: &str, entry: &str) -> DaqResult<()> {
        self.transport
            .set_feature(name, FeatureValue::Enum(entry.to_string()))
    }

    fn adjust_packet_size(&mut self) -> DaqResult<()> {
        if !self.transport.has_feature(f::GVSP_ADJUST_PACKET_SIZE) {
            return Ok(());
        }
        self.transport.execute(f::GVSP_ADJUST_PACKET_SIZE)?;
        let started = Instant::now();
        while !self.transport.is_command_done(f::GVSP_ADJUST_PACKET_SIZE)? {
            if started.elapsed() > PACKET_SIZE_ADJUST_TIMEOUT {
                warn!("Packet size negotiation did not finish, keeping current packet size");
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }

    /// Packet size and Mono12 on a fresh connection.
    fn apply_connection_defaults(&mut self) -> DaqResult<SensorSize> {
        if self.transport.has_feature(f::GVSP_PACKET_SIZE) {
            self.set_int(f::GVSP_PACKET_SIZE, f::DEFAULT_PACKET_SIZE)?;
        }
        if self.transport.has_feature(f::PIXEL_FORMAT) {
            self.set_enum(f::PIXEL_FORMAT, f::PIXEL_FORMAT_MONO12)?;
        }
        self.sensor_size()
    }

    fn u32_feature(&self, name: &str) -> DaqResult<u32> {
        let value = self.int_feature(name)?;
        u32::try_from(value).map_err(|_| DaqError::Device(format!("invalid {name} {value}")))
    }
}

fn translate_status(status: i32) -> FrameStatus {
    if status == f::FRAME_STATUS_COMPLETE {
        FrameStatus::Complete
    } else {
        FrameStatus::Incomplete
    }
}

impl<T: GenicamTransport> DeviceCapability for GenicamCamera<T> {
    fn model(&self) -> String {
        format!(
            "{} ({})",
            self.transport.model_name(),
            self.transport.device_id()
        )
    }

    fn open(&mut self) -> DaqResult<()> {
        if self.connected {
            return Ok(());
        }
        self.transport.connect().map_err(|e| match e {
            DaqError::DeviceUnavailable(_) => e,
            other => DaqError::DeviceUnavailable(other.to_string()),
        })?;

        let sensor = match self.apply_connection_defaults() {
            Ok(sensor) => sensor,
            Err(e) => {
                if let Err(disconnect_err) = self.transport.disconnect() {
                    warn!(error = %disconnect_err, "Disconnect after failed setup also failed");
                }
                return Err(DaqError::DeviceUnavailable(format!(
                    "camera setup failed: {e}"
                )));
            }
        };
        self.connected = true;
        info!(
            camera = %self.model(),
            sensor_rows = sensor.rows,
            sensor_cols = sensor.cols,
            bits = self.bits_per_pixel().ok().flatten(),
            "GenICam camera opened"
        );
        Ok(())
    }

    fn close(&mut self) -> DaqResult<()> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.transport.disconnect()
    }

    fn sensor_size(&self) -> DaqResult<SensorSize> {
        Ok(SensorSize {
            rows: self.u32_feature(f::SENSOR_HEIGHT)?,
            cols: self.u32_feature(f::SENSOR_WIDTH)?,
        })
    }

    fn supported_binnings(&self) -> DaqResult<Vec<u32>> {
        let (horizontal, vertical) = self.binning_registers()?.names();
        let bound = |name: &str| -> DaqResult<(u32, u32)> {
            match self.transport.feature_range(name)? {
                Some(range) => Ok((range.min.max(1.0) as u32, range.max.max(1.0) as u32)),
                None => Ok((1, 1)),
            }
        };
        let (h_min, h_max) = bound(horizontal)?;
        let (v_min, v_max) = bound(vertical)?;
        Ok((h_min.max(v_min)..=h_max.min(v_max)).collect())
    }

    fn geometry(&self) -> DaqResult<Geometry> {
        let binning = match self.binning_registers() {
            Ok(registers) => self.u32_feature(registers.names().1)?,
            Err(_) => 1,
        };
        Ok(Geometry {
            rows: self.u32_feature(f::HEIGHT)?,
            cols: self.u32_feature(f::WIDTH)?,
            binning,
        })
    }

    fn set_geometry(&mut self, geometry: Geometry) -> DaqResult<()> {
        let registers = self.binning_registers()?;
        let (horizontal, vertical) = registers.names();
        let binning = i64::from(geometry.binning);
        self.set_int(horizontal, binning)?;
        self.set_int(vertical, binning)?;

        for offset in [f::OFFSET_X, f::OFFSET_Y] {
            if self.transport.has_feature(offset) {
                self.set_int(offset, 0)?;
            }
        }
        self.set_int(f::HEIGHT, i64::from(geometry.rows))?;
        self.set_int(f::WIDTH, i64::from(geometry.cols))?;

        info!(
            binning = geometry.binning,
            rows = geometry.rows,
            cols = geometry.cols,
            decimation = registers == BinningRegisters::Decimation,
            "Geometry applied"
        );
        Ok(())
    }

    fn control(&self, name: &str) -> DaqResult<f64> {
        self.transport
            .feature(name)?
            .as_f64()
            .ok_or_else(|| DaqError::UnsupportedControl(format!("{name} is not numeric")))
    }

    fn set_control(&mut self, name: &str, value: f64) -> DaqResult<()> {
        let current = self.transport.feature(name)?;
        let value = current
            .numeric_like(value)
            .ok_or_else(|| DaqError::UnsupportedControl(format!("{name} is not numeric")))?;
        self.transport.set_feature(name, value)
    }

    fn control_range(&self, name: &str) -> DaqResult<ParameterRange> {
        if !self.transport.has_feature(name) {
            return Err(DaqError::UnsupportedControl(name.to_string()));
        }
        Ok(self
            .transport
            .feature_range(name)?
            .unwrap_or_else(ParameterRange::unbounded))
    }

    fn controls(&self) -> DaqResult<BTreeMap<String, f64>> {
        let mut out = BTreeMap::new();
        for name in self.transport.feature_names() {
            match self.transport.feature(&name) {
                Ok(value) => {
                    if let Some(v) = value.as_f64() {
                        out.insert(name, v);
                    }
                }
                Err(e) => debug!(feature = %name, error = %e, "skipping unreadable feature"),
            }
        }
        Ok(out)
    }

    fn is_geometry_control(&self, name: &str) -> bool {
        f::GEOMETRY_FEATURES.contains(&name)
    }

    fn exposure_time_ms(&self) -> DaqResult<f64> {
        with_fallback(&f::EXPOSURE_TIME, |name| self.control(name)).map(|us| us / 1000.0)
    }

    fn set_exposure_time_ms(&mut self, exposure_ms: f64) -> DaqResult<()> {
        with_fallback(&f::EXPOSURE_TIME, |name| {
            self.set_control(name, exposure_ms * 1000.0)
        })
    }

    fn exposure_range_ms(&self) -> DaqResult<ParameterRange> {
        with_fallback(&f::EXPOSURE_TIME, |name| self.control_range(name))
            .map(|us| ParameterRange::new(us.min / 1000.0, us.max / 1000.0))
    }

    fn frame_rate(&self) -> DaqResult<f64> {
        with_fallback(&f::ACQUISITION_FRAME_RATE, |name| self.control(name))
    }

    fn set_frame_rate(&mut self, frame_rate_hz: f64) -> DaqResult<()> {
        with_fallback(&f::ACQUISITION_FRAME_RATE, |name| {
            self.set_control(name, frame_rate_hz)
        })
    }

    fn frame_rate_range(&self) -> DaqResult<ParameterRange> {
        let mut range =
            with_fallback(&f::ACQUISITION_FRAME_RATE, |name| self.control_range(name))?;
        if self.transport.has_feature(f::ACQUISITION_FRAME_RATE_LIMIT) {
            range.max = range
                .max
                .min(self.control(f::ACQUISITION_FRAME_RATE_LIMIT)?);
        }
        Ok(range)
    }

    fn configure_continuous(&mut self) -> DaqResult<()> {
        self.adjust_packet_size()?;
        self.set_enum(f::TRIGGER_SELECTOR, "FrameStart")?;
        self.set_enum(f::TRIGGER_SOURCE, "FixedRate")?;
        self.set_enum(f::ACQUISITION_MODE, "Continuous")?;
        if self.transport.has_feature(f::SYNC_OUT_SELECTOR)
            && self.transport.has_feature(f::SYNC_OUT_SOURCE)
        {
            self.set_enum(f::SYNC_OUT_SELECTOR, "SyncOut1")?;
            self.set_enum(f::SYNC_OUT_SOURCE, "Exposing")?;
        }
        Ok(())
    }

    fn set_stream_throughput(&mut self, bytes_per_second: u64) -> DaqResult<bool> {
        match with_fallback(&f::STREAM_THROUGHPUT, |name| {
            self.set_control(name, bytes_per_second as f64)
        }) {
            Ok(()) => Ok(true),
            Err(DaqError::UnsupportedControl(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn stream_throughput(&self) -> DaqResult<Option<u64>> {
        match with_fallback(&f::STREAM_THROUGHPUT, |name| self.int_feature(name)) {
            Ok(value) => u64::try_from(value).map(Some).map_err(|_| {
                DaqError::Device(format!("invalid stream throughput {value}"))
            }),
            Err(DaqError::UnsupportedControl(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn pixel_format(&self) -> DaqResult<Option<String>> {
        if !self.transport.has_feature(f::PIXEL_FORMAT) {
            return Ok(None);
        }
        match self.transport.feature(f::PIXEL_FORMAT)? {
            FeatureValue::Enum(entry) => Ok(Some(entry)),
            other => Err(DaqError::Device(format!(
                "feature {} is not an enumeration: {other:?}",
                f::PIXEL_FORMAT
            ))),
        }
    }

    fn bits_per_pixel(&self) -> DaqResult<Option<u32>> {
        if !self.transport.has_feature(f::SENSOR_BITS) {
            return Ok(None);
        }
        self.u32_feature(f::SENSOR_BITS).map(Some)
    }

    fn start_streaming(&mut self, sink: FrameSink) -> DaqResult<()> {
        let handler: StreamHandler =
            Box::new(move |frame: &VendorFrame<'_>, queue: &dyn FrameQueue| {
                sink(RawFrame {
                    pixels: frame.pixels,
                    rows: frame.height,
                    cols: frame.width,
                    status: translate_status(frame.status),
                    timestamp_ns: frame.timestamp_ns,
                });
                queue.queue_frame(frame.buffer_id);
            });
        self.transport.start_streaming(handler, self.buffer_count)?;
        debug!(buffers = self.buffer_count, "GenICam streaming started");
        Ok(())
    }

    fn stop_streaming(&mut self) -> DaqResult<()> {
        self.transport.stop_streaming()
    }
}
