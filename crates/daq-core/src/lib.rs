//! Core types and traits shared by cam_daq camera drivers and the controller.
//!
//! - [`error`]: the `DaqError` taxonomy
//! - [`frame`]: frames, raw hardware buffers and geometry
//! - [`capability`]: the `DeviceCapability` adapter contract
//! - [`limits`]: hard bounds on frame sizes

pub mod capability;
pub mod error;
pub mod frame;
pub mod limits;

pub use capability::{with_fallback, DeviceCapability, FrameSink, ParameterRange};
pub use error::{DaqError, DaqResult};
pub use frame::{Frame, FrameStatus, Geometry, RawFrame, SensorSize};
