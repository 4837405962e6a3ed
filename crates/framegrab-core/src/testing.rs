//! Synthetic frame sources shared by unit tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use image::{Rgb, RgbImage};

use crate::error::{ExtractError, Result};
use crate::video::frame::Frame;
use crate::video::{FrameSource, VideoOpener, VideoSource};

#[derive(Debug, Clone, Copy)]
pub(crate) struct SyntheticVideo {
    frames: u64,
    width: u32,
    height: u32,
    fail_at: Option<u64>,
}

impl SyntheticVideo {
    pub(crate) fn new(frames: u64, width: u32, height: u32) -> Self {
        Self {
            frames,
            width,
            height,
            fail_at: None,
        }
    }

    /// Decoding the frame at `index` fails instead of producing it.
    pub(crate) fn failing_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }
}

struct SyntheticSource {
    path: PathBuf,
    video: SyntheticVideo,
    next: u64,
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.video.fail_at == Some(self.next) {
            return Err(ExtractError::Decode {
                path: self.path.clone(),
                diagnostics: format!("corrupt frame {}", self.next),
            });
        }
        if self.next >= self.video.frames {
            return Ok(None);
        }

        let shade = (self.next % 256) as u8;
        let image = RgbImage::from_pixel(self.video.width, self.video.height, Rgb([shade, 64, 128]));
        let frame = Frame {
            image,
            native_index: self.next,
            timestamp_seconds: self.next as f64 / 25.0,
        };
        self.next += 1;
        Ok(Some(frame))
    }
}

/// Serves [`SyntheticVideo`]s by path and records every open.
#[derive(Default)]
pub(crate) struct SyntheticOpener {
    videos: HashMap<PathBuf, SyntheticVideo>,
    opened: Rc<RefCell<Vec<PathBuf>>>,
}

impl SyntheticOpener {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_video(mut self, path: impl Into<PathBuf>, video: SyntheticVideo) -> Self {
        self.videos.insert(path.into(), video);
        self
    }

    /// Shared log of opened paths, still readable after the opener is boxed away.
    pub(crate) fn opened(&self) -> Rc<RefCell<Vec<PathBuf>>> {
        Rc::clone(&self.opened)
    }
}

impl VideoOpener for SyntheticOpener {
    fn open(&self, source: &VideoSource) -> Result<Box<dyn FrameSource>> {
        self.opened.borrow_mut().push(source.path().to_path_buf());
        let video = self
            .videos
            .get(source.path())
            .copied()
            .ok_or_else(|| ExtractError::Open {
                path: source.path().to_path_buf(),
                reason: "no such synthetic video".to_string(),
            })?;
        Ok(Box::new(SyntheticSource {
            path: source.path().to_path_buf(),
            video,
            next: 0,
        }))
    }
}

/// An opener for tests that must never reach decoding.
pub(crate) struct UnreachableOpener;

impl VideoOpener for UnreachableOpener {
    fn open(&self, source: &VideoSource) -> Result<Box<dyn FrameSource>> {
        panic!("video {} must not be opened", source.path().display());
    }
}
