use crate::error::{ExtractError, Result};

/// Which frames to keep and how large to crop them.
///
/// Only constructible through [`SamplingPolicy::new`], so a policy in hand always has a
/// positive stride and crop size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    stride: u32,
    crop_size: u32,
}

impl SamplingPolicy {
    pub fn new(stride: i64, crop_size: i64) -> Result<Self> {
        if stride <= 0 {
            return Err(ExtractError::InvalidPolicy(format!(
                "stride must be a positive integer, got {stride}"
            )));
        }
        if crop_size <= 0 {
            return Err(ExtractError::InvalidPolicy(format!(
                "crop size must be a positive integer, got {crop_size}"
            )));
        }
        let stride = u32::try_from(stride)
            .map_err(|_| ExtractError::InvalidPolicy(format!("stride {stride} is too large")))?;
        let crop_size = u32::try_from(crop_size).map_err(|_| {
            ExtractError::InvalidPolicy(format!("crop size {crop_size} is too large"))
        })?;
        Ok(Self { stride, crop_size })
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn crop_size(&self) -> u32 {
        self.crop_size
    }

    /// Whether the frame at `native_index` is kept.
    pub fn selects(&self, native_index: u64) -> bool {
        native_index % self.stride as u64 == 0
    }

    /// Number of frames kept out of `frame_count` decoded frames.
    pub fn selected_count(&self, frame_count: u64) -> u64 {
        frame_count.div_ceil(self.stride as u64)
    }

    /// Native index of the `k`-th kept frame (0-based).
    pub fn native_index_of(&self, k: u64) -> u64 {
        k * self.stride as u64
    }
}
