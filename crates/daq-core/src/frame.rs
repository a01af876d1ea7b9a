//! Frame and geometry types.
//!
//! A [`RawFrame`] borrows the driver's hardware buffer for the duration of one
//! delivery callback. The acceptance path copies it into an owned [`Frame`]
//! before the driver re-queues the buffer, so a published frame never aliases
//! memory the SDK may overwrite.

use crate::error::{DaqError, DaqResult};
use crate::limits;
use serde::{Deserialize, Serialize};

/// Outcome of one hardware delivery, after vendor status translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameStatus {
    Complete,
    Incomplete,
}

/// Sensor dimensions at binning 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSize {
    pub rows: u32,
    pub cols: u32,
}

/// Current readout shape of the device.
///
/// Always derived from a [`SensorSize`] and a binning factor, so
/// `rows == sensor.rows / binning` and `cols == sensor.cols / binning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub rows: u32,
    pub cols: u32,
    pub binning: u32,
}

impl Geometry {
    /// Compute the binned geometry of a sensor.
    ///
    /// Fails with `UnsupportedGeometry` for binning 0 or a factor that leaves
    /// no pixels, and with a limits error for shapes too large to allocate.
    pub fn binned(sensor: SensorSize, binning: u32) -> DaqResult<Self> {
        if binning == 0 {
            return Err(DaqError::UnsupportedGeometry(
                "binning factor must be at least 1".into(),
            ));
        }
        let rows = sensor.rows / binning;
        let cols = sensor.cols / binning;
        if rows == 0 || cols == 0 {
            return Err(DaqError::UnsupportedGeometry(format!(
                "binning {binning} leaves no pixels on a {}x{} sensor",
                sensor.rows, sensor.cols
            )));
        }
        limits::frame_size(rows, cols)?;
        Ok(Self {
            rows,
            cols,
            binning,
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    pub fn shape(&self) -> (u32, u32) {
        (self.rows, self.cols)
    }
}

/// Borrowed view of a hardware buffer handed to the acceptance sink.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub pixels: &'a [u16],
    pub rows: u32,
    pub cols: u32,
    pub status: FrameStatus,
    /// Hardware timestamp in nanoseconds, when the device provides one.
    pub timestamp_ns: Option<u64>,
}

impl RawFrame<'_> {
    pub fn is_complete(&self) -> bool {
        self.status == FrameStatus::Complete
    }
}

/// An immutable, owned camera frame with its sequence counter.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pixels: Vec<u16>,
    rows: u32,
    cols: u32,
    counter: u64,
    timestamp_ns: Option<u64>,
}

impl Frame {
    /// Build a frame from owned row-major pixels.
    pub fn new(pixels: Vec<u16>, rows: u32, cols: u32, counter: u64) -> DaqResult<Self> {
        let size = limits::frame_size(rows, cols)?;
        if pixels.len() != size.pixels {
            return Err(DaqError::IncompleteFrame(format!(
                "buffer holds {} pixels, shape {rows}x{cols} needs {}",
                pixels.len(),
                size.pixels
            )));
        }
        Ok(Self {
            pixels,
            rows,
            cols,
            counter,
            timestamp_ns: None,
        })
    }

    /// Copy a borrowed hardware buffer into a new frame.
    pub fn copy_from_raw(raw: &RawFrame<'_>, counter: u64) -> DaqResult<Self> {
        let mut frame = Self::new(raw.pixels.to_vec(), raw.rows, raw.cols, counter)?;
        frame.timestamp_ns = raw.timestamp_ns;
        Ok(frame)
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (u32, u32) {
        (self.rows, self.cols)
    }

    pub fn timestamp_ns(&self) -> Option<u64> {
        self.timestamp_ns
    }

    /// Row-major pixel data.
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn pixel(&self, row: u32, col: u32) -> Option<u16> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.pixels
            .get(row as usize * self.cols as usize + col as usize)
            .copied()
    }

    pub fn row(&self, row: u32) -> Option<&[u16]> {
        if row >= self.rows {
            return None;
        }
        let start = row as usize * self.cols as usize;
        self.pixels.get(start..start + self.cols as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENSOR: SensorSize = SensorSize {
        rows: 1200,
        cols: 1600,
    };

    #[test]
    fn test_binned_geometry_uses_integer_division() {
        let g = Geometry::binned(SENSOR, 1).unwrap();
        assert_eq!(g.shape(), (1200, 1600));

        let g = Geometry::binned(SENSOR, 3).unwrap();
        assert_eq!(g.shape(), (400, 533));
        assert_eq!(g.binning, 3);
    }

    #[test]
    fn test_zero_binning_rejected() {
        let err = Geometry::binned(SENSOR, 0).unwrap_err();
        assert!(matches!(err, DaqError::UnsupportedGeometry(_)));
    }

    #[test]
    fn test_oversized_binning_rejected() {
        let err = Geometry::binned(SENSOR, 2000).unwrap_err();
        assert!(matches!(err, DaqError::UnsupportedGeometry(_)));
    }

    #[test]
    fn test_frame_indexing() {
        let frame = Frame::new((0..12).collect(), 3, 4, 7).unwrap();
        assert_eq!(frame.shape(), (3, 4));
        assert_eq!(frame.counter(), 7);
        assert_eq!(frame.pixel(1, 2), Some(6));
        assert_eq!(frame.pixel(3, 0), None);
        assert_eq!(frame.row(2), Some(&[8u16, 9, 10, 11][..]));
        assert_eq!(frame.row(3), None);
    }

    #[test]
    fn test_frame_shape_mismatch_rejected() {
        let err = Frame::new(vec![0; 11], 3, 4, 0).unwrap_err();
        assert!(matches!(err, DaqError::IncompleteFrame(_)));
    }

    #[test]
    fn test_copy_from_raw_does_not_alias() {
        let mut hardware = vec![5u16; 4];
        let frame = {
            let raw = RawFrame {
                pixels: &hardware,
                rows: 2,
                cols: 2,
                status: FrameStatus::Complete,
                timestamp_ns: Some(99),
            };
            Frame::copy_from_raw(&raw, 0).unwrap()
        };
        hardware.fill(0);
        assert_eq!(frame.pixels(), &[5, 5, 5, 5]);
        assert_eq!(frame.timestamp_ns(), Some(99));
    }
}
