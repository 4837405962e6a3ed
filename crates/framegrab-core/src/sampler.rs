use tracing::{debug, info, warn};

use crate::error::Result;
use crate::naming::ExtractionRun;
use crate::persist::{crop_and_save, DEFAULT_JPEG_QUALITY};
use crate::pipeline::Extractor;
use crate::policy::SamplingPolicy;
use crate::video::frame::Frame;
use crate::video::{FrameSource, VideoOpener, VideoSource};

/// Why a [`FrameSampler`] stopped producing frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The source ran out of frames.
    Exhausted,
    /// The source failed mid-stream. Frames yielded before the failure are still valid.
    DecodeFailed(String),
}

/// Lazily walks a decoded frame stream and yields every `stride`-th frame.
///
/// The sampler numbers frames itself: every successfully decoded frame advances the native
/// index, whether or not it is selected. The underlying source is dropped as soon as the
/// stream ends, so the decode handle is released even if the sampler is kept around.
pub struct FrameSampler {
    source: Option<Box<dyn FrameSource>>,
    policy: SamplingPolicy,
    decoded: u64,
    end: Option<StreamEnd>,
}

impl FrameSampler {
    /// Number of frames decoded so far, selected or not.
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Why the stream ended, or `None` while it is still live.
    pub fn end(&self) -> Option<&StreamEnd> {
        self.end.as_ref()
    }

    fn stop(&mut self, end: StreamEnd) {
        self.source = None;
        self.end = Some(end);
    }
}

impl Iterator for FrameSampler {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            let source = self.source.as_mut()?;
            match source.next_frame() {
                Ok(Some(mut frame)) => {
                    frame.native_index = self.decoded;
                    self.decoded += 1;
                    if self.policy.selects(frame.native_index) {
                        debug!(native_index = frame.native_index, "frame selected");
                        return Some(frame);
                    }
                }
                Ok(None) => {
                    info!(decoded = self.decoded, "frame stream exhausted");
                    self.stop(StreamEnd::Exhausted);
                    return None;
                }
                Err(e) => {
                    warn!(decoded = self.decoded, error = %e, "decode failed, stopping early");
                    self.stop(StreamEnd::DecodeFailed(e.to_string()));
                    return None;
                }
            }
        }
    }
}

/// Open `source` and return a sampler over its frames.
pub fn sample(
    opener: &dyn VideoOpener,
    source: &VideoSource,
    policy: SamplingPolicy,
) -> Result<FrameSampler> {
    let frames = opener.open(source)?;
    info!(path = ?source.path(), stride = policy.stride(), "sampling video");
    Ok(FrameSampler {
        source: Some(frames),
        policy,
        decoded: 0,
        end: None,
    })
}

/// Extraction where frames are decoded one at a time and cropped and encoded in process.
pub struct StreamExtractor {
    opener: Box<dyn VideoOpener>,
    quality: u8,
}

impl StreamExtractor {
    pub fn new(opener: Box<dyn VideoOpener>) -> Self {
        Self {
            opener,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }
}

impl Extractor for StreamExtractor {
    fn extract(
        &self,
        source: &VideoSource,
        run: &ExtractionRun,
        policy: &SamplingPolicy,
    ) -> Result<usize> {
        let mut sampler = sample(self.opener.as_ref(), source, *policy)?;
        let mut saved = 0;

        for frame in &mut sampler {
            let path = run.output_path(frame.native_index);
            if crop_and_save(&frame, policy.crop_size(), &path, self.quality)? {
                saved += 1;
            }
        }

        info!(
            path = ?source.path(),
            run_id = %run.run_id(),
            decoded = sampler.decoded(),
            saved,
            end = ?sampler.end(),
            "streaming extraction finished"
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;
    use crate::error::ExtractError;
    use crate::naming::RunId;
    use crate::testing::{SyntheticOpener, SyntheticVideo};

    fn indices(opener: &SyntheticOpener, path: &str, stride: i64) -> Vec<u64> {
        let policy = SamplingPolicy::new(stride, 1).unwrap();
        sample(opener, &VideoSource::new(path), policy)
            .unwrap()
            .map(|f| f.native_index)
            .collect()
    }

    #[test]
    fn selects_every_stride_th_frame() {
        let opener = SyntheticOpener::new().with_video("clip.mp4", SyntheticVideo::new(25, 8, 6));
        assert_eq!(indices(&opener, "clip.mp4", 10), vec![0, 10, 20]);
        assert_eq!(indices(&opener, "clip.mp4", 1).len(), 25);
        assert_eq!(indices(&opener, "clip.mp4", 30), vec![0]);
    }

    #[test]
    fn selected_count_is_ceil_of_frames_over_stride() {
        for frames in 0..23u64 {
            let opener =
                SyntheticOpener::new().with_video("v.mp4", SyntheticVideo::new(frames, 4, 4));
            for stride in 1..8i64 {
                let got = indices(&opener, "v.mp4", stride);
                let expected: Vec<u64> = (0..frames).step_by(stride as usize).collect();
                assert_eq!(got, expected, "{frames} frames, stride {stride}");
                assert_eq!(got.len() as u64, frames.div_ceil(stride as u64));
            }
        }
    }

    #[test]
    #[traced_test]
    fn decode_failure_keeps_earlier_frames() {
        let opener = SyntheticOpener::new()
            .with_video("broken.mp4", SyntheticVideo::new(30, 4, 4).failing_at(12));
        let policy = SamplingPolicy::new(5, 1).unwrap();

        let mut sampler = sample(&opener, &VideoSource::new("broken.mp4"), policy).unwrap();
        let got: Vec<u64> = (&mut sampler).map(|f| f.native_index).collect();

        assert_eq!(got, vec![0, 5, 10]);
        assert_eq!(sampler.decoded(), 12);
        assert!(matches!(sampler.end(), Some(StreamEnd::DecodeFailed(_))));
        assert!(sampler.next().is_none());
        assert!(logs_contain("decode failed, stopping early"));
    }

    #[test]
    fn unknown_video_is_open_error() {
        let opener = SyntheticOpener::new();
        let policy = SamplingPolicy::new(1, 1).unwrap();
        let result = sample(&opener, &VideoSource::new("missing.mp4"), policy);
        assert!(matches!(result, Err(ExtractError::Open { .. })));
    }

    #[test]
    fn extracts_scenario_a() {
        let dir = tempfile::tempdir().unwrap();
        let opener =
            SyntheticOpener::new().with_video("clip.mp4", SyntheticVideo::new(25, 800, 600));
        let extractor = StreamExtractor::new(Box::new(opener));
        let run = ExtractionRun::new(RunId::from_timestamp(1700000000), dir.path());
        let policy = SamplingPolicy::new(10, 640).unwrap();

        let saved = extractor
            .extract(&VideoSource::new("clip.mp4"), &run, &policy)
            .unwrap();
        assert_eq!(saved, 3);

        let outputs = run.list_outputs().unwrap();
        assert_eq!(outputs, vec![run.output_path(0), run.output_path(10), run.output_path(20)]);
        for path in outputs {
            let img = image::open(&path).unwrap();
            assert_eq!((img.width(), img.height()), (640, 640), "{}", path.display());
        }
    }

    #[test]
    fn extracts_scenario_b_crop_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let opener =
            SyntheticOpener::new().with_video("clip.mp4", SyntheticVideo::new(25, 800, 600));
        let extractor = StreamExtractor::new(Box::new(opener));
        let run = ExtractionRun::new(RunId::from_timestamp(1700000000), dir.path());
        let policy = SamplingPolicy::new(10, 900).unwrap();

        let result = extractor.extract(&VideoSource::new("clip.mp4"), &run, &policy);
        assert!(matches!(
            result,
            Err(ExtractError::CropTooSmall { width: 800, height: 600, size: 900 })
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
