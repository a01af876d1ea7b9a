//! Vendor transport seam.
//!
//! A GenICam SDK binding (Vimba, pylon, Aravis, ...) exposes a node map of
//! named features and a streaming engine that hands filled buffers to a
//! callback. [`GenicamTransport`] is that surface and nothing more; the
//! adapter in [`crate::camera`] builds the camera semantics on top of it.

use daq_core::{DaqResult, ParameterRange};
use serde::{Deserialize, Serialize};

/// Value of a node-map feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Enumeration entry, by symbolic name.
    Enum(String),
}

impl FeatureValue {
    /// Numeric view used for generic control access. Enumerations have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Int(v) => Some(*v as f64),
            FeatureValue::Float(v) => Some(*v),
            FeatureValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            FeatureValue::Enum(_) => None,
        }
    }

    /// Same kind as `self`, carrying `value`.
    pub fn numeric_like(&self, value: f64) -> Option<FeatureValue> {
        match self {
            FeatureValue::Int(_) => Some(FeatureValue::Int(value.round() as i64)),
            FeatureValue::Float(_) => Some(FeatureValue::Float(value)),
            FeatureValue::Bool(_) => Some(FeatureValue::Bool(value != 0.0)),
            FeatureValue::Enum(_) => None,
        }
    }
}

/// One filled buffer as delivered by the vendor streaming engine.
#[derive(Debug)]
pub struct VendorFrame<'a> {
    /// Slot in the transport's announced buffer set.
    pub buffer_id: usize,
    pub pixels: &'a [u16],
    pub width: u32,
    pub height: u32,
    /// Raw vendor status code; see [`crate::features::FRAME_STATUS_COMPLETE`].
    pub status: i32,
    pub timestamp_ns: Option<u64>,
}

/// Hands a delivered buffer back to the transport for reuse.
pub trait FrameQueue {
    fn queue_frame(&self, buffer_id: usize);
}

/// Callback invoked by the transport's delivery thread for every buffer.
/// The handler is responsible for re-queueing the buffer.
pub type StreamHandler = Box<dyn FnMut(&VendorFrame<'_>, &dyn FrameQueue) + Send>;

pub trait GenicamTransport: Send {
    /// `DeviceUnavailable` when the camera cannot be reached.
    fn connect(&mut self) -> DaqResult<()>;

    fn disconnect(&mut self) -> DaqResult<()>;

    fn model_name(&self) -> String;

    fn device_id(&self) -> String;

    fn has_feature(&self, name: &str) -> bool;

    fn feature_names(&self) -> Vec<String>;

    /// `UnsupportedControl` for unknown features.
    fn feature(&self, name: &str) -> DaqResult<FeatureValue>;

    /// `UnsupportedControl` for unknown features, `ParameterOutOfRange` when
    /// the node map rejects the value.
    fn set_feature(&mut self, name: &str, value: FeatureValue) -> DaqResult<()>;

    /// Bounds of a numeric feature, `None` if the node map reports none.
    fn feature_range(&self, name: &str) -> DaqResult<Option<ParameterRange>>;

    /// Run a command feature.
    fn execute(&mut self, command: &str) -> DaqResult<()>;

    fn is_command_done(&self, command: &str) -> DaqResult<bool>;

    /// Announce `buffer_count` buffers and begin continuous delivery.
    fn start_streaming(&mut self, handler: StreamHandler, buffer_count: usize) -> DaqResult<()>;

    /// Stop delivery. Blocks until the handler has returned for the last time.
    fn stop_streaming(&mut self) -> DaqResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_views() {
        assert_eq!(FeatureValue::Int(4).as_f64(), Some(4.0));
        assert_eq!(FeatureValue::Bool(true).as_f64(), Some(1.0));
        assert_eq!(FeatureValue::Enum("Mono12".into()).as_f64(), None);
    }

    #[test]
    fn test_numeric_like_preserves_kind() {
        assert_eq!(
            FeatureValue::Int(1).numeric_like(2.6),
            Some(FeatureValue::Int(3))
        );
        assert_eq!(
            FeatureValue::Float(1.0).numeric_like(2.5),
            Some(FeatureValue::Float(2.5))
        );
        assert_eq!(FeatureValue::Enum("Continuous".into()).numeric_like(1.0), None);
    }
}
