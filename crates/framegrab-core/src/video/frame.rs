use image::RgbImage;

/// A single decoded video frame with metadata. Pixels are always packed RGB24.
pub struct Frame {
    /// The frame's image data.
    pub image: RgbImage,
    /// Position in the source's decoded sequence (0-based), counting every decoded frame.
    pub native_index: u64,
    /// Elapsed seconds from the start of the source.
    pub timestamp_seconds: f64,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
