//! # cam_daq
//!
//! Control and frame dispatch for area-scan scientific cameras.
//!
//! A [`CameraController`] wraps one vendor adapter (any
//! [`daq_core::DeviceCapability`]) and provides:
//!
//! - serialized control operations: binning, exposure, frame rate, named
//!   parameters, start/stop
//! - transparent stream restart when binning changes while streaming
//! - frame acceptance on the hardware delivery thread: incomplete frames are
//!   dropped, complete ones are copied, numbered 0, 1, 2, ... and fanned out
//!   to subscribers in registration order
//! - [`FutureFrameCollector`] for "give me the next N frames" requests
//!
//! ```rust,ignore
//! use cam_daq::{CameraConfig, CameraController};
//! use std::time::Duration;
//!
//! let config = CameraConfig::load_from("camera.toml")?;
//! cam_daq::logging::init(&config.log_filter);
//! let camera = CameraController::new(Box::new(adapter), config)?;
//! camera.set_binning(2)?;
//! camera.start_acquisition()?;
//! let frames = camera.collect_future_frames(5, Duration::from_secs(2))?;
//! camera.deinitialize()?;
//! ```

pub mod collector;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod frame_buffer;
pub mod logging;
pub mod subscribers;

pub use collector::{CollectionCanceller, FutureFrameCollector};
pub use config::{CameraConfig, ConfigError};
pub use controller::{AcquisitionState, CameraController, CameraInfo};
pub use dispatch::{DeliveryStats, FrameDispatch};
pub use frame_buffer::FrameBuffer;
pub use subscribers::{
    channel_subscriber, FanOut, FrameCallback, FrameChannel, SubscriberId, SubscriberRegistry,
};

pub use daq_core::{DaqError, DaqResult, DeviceCapability, Frame, Geometry, ParameterRange};
