//! GenICam / GigE Vision camera adapter for cam_daq.
//!
//! [`GenicamCamera`] turns any [`GenicamTransport`] (a vendor SDK binding or
//! the simulated transport in `daq-driver-mock`) into a
//! [`daq_core::DeviceCapability`].
//!
//! ```rust,ignore
//! use daq_driver_genicam::GenicamCamera;
//!
//! let camera = GenicamCamera::new(vimba_transport).with_buffer_count(10);
//! let controller = CameraController::new(Box::new(camera), config)?;
//! ```

pub mod camera;
pub mod features;
pub mod transport;

pub use camera::{GenicamCamera, DEFAULT_BUFFER_COUNT};
pub use transport::{FeatureValue, FrameQueue, GenicamTransport, StreamHandler, VendorFrame};
