pub mod decoder;
pub mod frame;
pub mod probe;

use std::path::{Path, PathBuf};

use crate::error::Result;
use frame::Frame;

/// One input video, identified by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    path: PathBuf,
}

impl VideoSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A stream of decoded frames in native order.
pub trait FrameSource {
    /// The next decoded frame, `Ok(None)` at end of stream, or `Err` on a decode failure
    /// the stream cannot recover from.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Opens a [`VideoSource`] for frame-by-frame decoding.
pub trait VideoOpener {
    fn open(&self, source: &VideoSource) -> Result<Box<dyn FrameSource>>;
}
