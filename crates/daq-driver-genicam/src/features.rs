//! GenICam SFNC feature names used by the adapter.
//!
//! Where vendors disagree on a name, the alternatives are listed in the
//! order they are tried.

pub const SENSOR_HEIGHT: &str = "SensorHeight";
pub const SENSOR_WIDTH: &str = "SensorWidth";
pub const SENSOR_BITS: &str = "SensorBits";
pub const HEIGHT: &str = "Height";
pub const WIDTH: &str = "Width";
pub const OFFSET_X: &str = "OffsetX";
pub const OFFSET_Y: &str = "OffsetY";

pub const BINNING_HORIZONTAL: &str = "BinningHorizontal";
pub const BINNING_VERTICAL: &str = "BinningVertical";
pub const DECIMATION_HORIZONTAL: &str = "DecimationHorizontal";
pub const DECIMATION_VERTICAL: &str = "DecimationVertical";

/// Exposure registers, in microseconds.
pub const EXPOSURE_TIME: [&str; 2] = ["ExposureTimeAbs", "ExposureTime"];
pub const ACQUISITION_FRAME_RATE: [&str; 2] = ["AcquisitionFrameRateAbs", "AcquisitionFrameRate"];
pub const ACQUISITION_FRAME_RATE_LIMIT: &str = "AcquisitionFrameRateLimit";
pub const STREAM_THROUGHPUT: [&str; 2] = ["StreamBytesPerSecond", "DeviceLinkThroughputLimit"];

pub const PIXEL_FORMAT: &str = "PixelFormat";
pub const PIXEL_FORMAT_MONO12: &str = "Mono12";
pub const TRIGGER_SELECTOR: &str = "TriggerSelector";
pub const TRIGGER_SOURCE: &str = "TriggerSource";
pub const ACQUISITION_MODE: &str = "AcquisitionMode";
pub const SYNC_OUT_SELECTOR: &str = "SyncOutSelector";
pub const SYNC_OUT_SOURCE: &str = "SyncOutSource";

pub const GVSP_PACKET_SIZE: &str = "GVSPPacketSize";
/// Command feature negotiating the largest packet the link supports.
pub const GVSP_ADJUST_PACKET_SIZE: &str = "GVSPAdjustPacketSize";
pub const DEFAULT_PACKET_SIZE: i64 = 1500;

/// Features the controller owns; writing them directly would desynchronize
/// its cached geometry.
pub const GEOMETRY_FEATURES: [&str; 8] = [
    BINNING_HORIZONTAL,
    BINNING_VERTICAL,
    DECIMATION_HORIZONTAL,
    DECIMATION_VERTICAL,
    HEIGHT,
    WIDTH,
    OFFSET_X,
    OFFSET_Y,
];

/// Vendor frame status meaning "all packets received".
pub const FRAME_STATUS_COMPLETE: i32 = 0;
