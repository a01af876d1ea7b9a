//! Error taxonomy shared by camera drivers and the controller.
//!
//! `DaqError` is split along one line: errors a caller can recover from
//! (capability mismatch, validation, deadlines) and errors that make the
//! controller instance unusable (`DeviceUnavailable`). Frame-level failures
//! on the delivery thread (`IncompleteFrame`) exist so drivers and the
//! acceptance path can name them in logs; they are never returned from a
//! control operation.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the camera error type.
pub type DaqResult<T> = std::result::Result<T, DaqError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DaqError {
    /// Hardware or transport cannot be reached. Fatal for the controller instance.
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    #[error("Unsupported control: {0}")]
    UnsupportedControl(String),

    #[error("Parameter '{name}' value {value} outside valid range [{min}, {max}]")]
    ParameterOutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Timed out after {timeout:?} waiting for {expected} frames ({received} received)")]
    Timeout {
        expected: usize,
        received: usize,
        timeout: Duration,
    },

    #[error("Incomplete frame: {0}")]
    IncompleteFrame(String),

    #[error("Frame collection cancelled")]
    Cancelled,

    /// Vendor SDK call failed for a reason the driver could not classify.
    #[error("Device error: {0}")]
    Device(String),

    #[error("Frame dimensions {width}x{height} exceed maximum {max_dimension}")]
    FrameDimensionsTooLarge {
        width: u32,
        height: u32,
        max_dimension: u32,
    },

    #[error("Frame size {bytes} bytes exceeds maximum {max_bytes} bytes")]
    FrameTooLarge { bytes: usize, max_bytes: usize },

    #[error("Integer overflow computing {context}")]
    SizeOverflow { context: &'static str },

    /// Controller settings rejected before any hardware was touched.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DaqError {
    /// Whether the caller may retry or choose a fallback after this error.
    ///
    /// `DeviceUnavailable` and opaque `Device` failures are not recoverable
    /// at this layer.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DaqError::DeviceUnavailable(_) | DaqError::Device(_))
    }

    /// True for the capability-mismatch errors a caller answers with a fallback.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            DaqError::UnsupportedControl(_) | DaqError::UnsupportedGeometry(_)
        )
    }
}
