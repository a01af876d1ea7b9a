//! Hard limits on frame geometry, checked before a geometry reaches hardware.

use crate::error::{DaqError, DaqResult};

/// Pixels are stored as `u16` regardless of the sensor bit depth.
pub const BYTES_PER_PIXEL: usize = std::mem::size_of::<u16>();
/// Maximum frame payload in bytes (100MB).
pub const MAX_FRAME_BYTES: usize = 100 * 1024 * 1024;
/// Maximum supported rows or cols.
pub const MAX_FRAME_DIMENSION: u32 = 65_536;

/// Pixel and byte count of one frame of a given shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub pixels: usize,
    pub bytes: usize,
}

/// Size a `rows` x `cols` frame, rejecting shapes beyond the hard limits.
pub fn frame_size(rows: u32, cols: u32) -> DaqResult<FrameSize> {
    if rows > MAX_FRAME_DIMENSION || cols > MAX_FRAME_DIMENSION {
        return Err(DaqError::FrameDimensionsTooLarge {
            width: cols,
            height: rows,
            max_dimension: MAX_FRAME_DIMENSION,
        });
    }

    let pixels = (rows as usize)
        .checked_mul(cols as usize)
        .ok_or(DaqError::SizeOverflow {
            context: "frame pixel count",
        })?;
    let bytes = pixels
        .checked_mul(BYTES_PER_PIXEL)
        .ok_or(DaqError::SizeOverflow {
            context: "frame byte size",
        })?;

    if bytes > MAX_FRAME_BYTES {
        return Err(DaqError::FrameTooLarge {
            bytes,
            max_bytes: MAX_FRAME_BYTES,
        });
    }

    Ok(FrameSize { pixels, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typical_sensor_fits() {
        let size = frame_size(2048, 2048).unwrap();
        assert_eq!(size.pixels, 2048 * 2048);
        assert_eq!(size.bytes, 2048 * 2048 * 2);
    }

    #[test]
    fn test_dimension_limit() {
        let err = frame_size(16, MAX_FRAME_DIMENSION + 1).unwrap_err();
        assert!(matches!(err, DaqError::FrameDimensionsTooLarge { .. }));
    }

    #[test]
    fn test_byte_limit() {
        // 16384 x 16384 x 2 bytes = 512MB
        let err = frame_size(16_384, 16_384).unwrap_err();
        assert!(matches!(err, DaqError::FrameTooLarge { .. }));
    }
}
