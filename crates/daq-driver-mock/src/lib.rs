//! Simulated GenICam camera for cam_daq.
//!
//! [`SimulatedTransport`] implements [`daq_driver_genicam::GenicamTransport`]
//! over an in-memory node map, so the real adapter code runs unchanged
//! against it. Builder switches reproduce the register-name differences seen
//! across camera families, and a [`SimulatedProbe`] lets tests inject frames
//! and faults after the transport has been handed to a controller.
//!
//! ```rust,ignore
//! let transport = SimulatedTransport::builder().manual_delivery().build();
//! let probe = transport.probe();
//! let camera = simulated_camera(transport);
//! ```

pub mod node_map;
pub mod probe;
pub mod stream;
pub mod transport;

use daq_driver_genicam::GenicamCamera;

pub use node_map::{Feature, NodeMap};
pub use probe::SimulatedProbe;
pub use stream::{SimCounters, FRAME_STATUS_INCOMPLETE};
pub use transport::{
    SimulatedTransport, SimulatedTransportBuilder, DEFAULT_SENSOR_COLS, DEFAULT_SENSOR_ROWS,
};

/// Adapter over a simulated transport, ready to hand to a controller.
pub fn simulated_camera(transport: SimulatedTransport) -> GenicamCamera<SimulatedTransport> {
    GenicamCamera::new(transport).with_buffer_count(4)
}
