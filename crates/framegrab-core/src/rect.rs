use crate::error::{ExtractError, Result};

/// A rectangle in absolute pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl PixelRect {
    /// Whether this rect lies entirely inside a `frame_width` x `frame_height` frame.
    pub fn fits_within(self, frame_width: u32, frame_height: u32) -> bool {
        self.x as u64 + self.w as u64 <= frame_width as u64
            && self.y as u64 + self.h as u64 <= frame_height as u64
    }
}

/// The `size` x `size` square taken from the center of a frame.
///
/// Margins are split with integer division, so an odd leftover pixel ends up on the
/// right/bottom edge. Both the streaming crop and the ffmpeg crop filter are built from
/// this rect, which keeps the two extraction paths pixel-identical.
pub fn centered_square(frame_width: u32, frame_height: u32, size: u32) -> Result<PixelRect> {
    if frame_width < size || frame_height < size {
        return Err(ExtractError::CropTooSmall {
            width: frame_width,
            height: frame_height,
            size,
        });
    }

    Ok(PixelRect {
        x: (frame_width - size) / 2,
        y: (frame_height - size) / 2,
        w: size,
        h: size,
    })
}
