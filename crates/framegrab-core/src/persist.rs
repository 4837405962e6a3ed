use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops;
use tracing::{debug, warn};

use crate::error::Result;
use crate::rect::centered_square;
use crate::video::frame::Frame;

/// JPEG quality used when no other is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Crop the centered `size` x `size` square out of `frame` and write it to `output_path` as
/// a JPEG.
///
/// A frame smaller than `size` in either dimension is an error and nothing is written. A
/// failed encode or write is not: it is logged and reported as `Ok(false)` so the caller can
/// leave it out of its saved count and keep going.
pub fn crop_and_save(frame: &Frame, size: u32, output_path: &Path, quality: u8) -> Result<bool> {
    let rect = centered_square(frame.width(), frame.height(), size)?;

    let cropped = imageops::crop_imm(&frame.image, rect.x, rect.y, rect.w, rect.h).to_image();

    match write_jpeg(&cropped, output_path, quality) {
        Ok(()) => {
            debug!(native_index = frame.native_index, ?output_path, "saved frame");
            Ok(true)
        }
        Err(e) => {
            warn!(
                native_index = frame.native_index,
                ?output_path,
                error = %e,
                "failed to write frame, skipping"
            );
            Ok(false)
        }
    }
}

fn write_jpeg(
    image: &image::RgbImage,
    output_path: &Path,
    quality: u8,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let file = File::create(output_path)?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100)).encode_image(image)?;
    writer.flush()?;
    Ok(())
}
