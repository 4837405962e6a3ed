use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{ExtractError, Result};
use crate::filter::FilterExtractor;
use crate::naming::{ExtractionRun, RunId};
use crate::persist::DEFAULT_JPEG_QUALITY;
use crate::policy::SamplingPolicy;
use crate::sampler::StreamExtractor;
use crate::tooling::{ProcessRunner, Tooling, DEFAULT_TIMEOUT};
use crate::video::decoder::FfmpegOpener;
use crate::video::VideoSource;

/// File extensions picked up when the input is a directory.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "webm", "mov", "avi", "m4v", "mpg", "mpeg", "ts", "flv", "wmv",
];

/// Samples, crops and writes the frames of one video. Returns the number of images saved.
pub trait Extractor {
    fn extract(
        &self,
        source: &VideoSource,
        run: &ExtractionRun,
        policy: &SamplingPolicy,
    ) -> Result<usize>;
}

/// How frames get decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Decode frame by frame into memory, crop and encode here.
    #[default]
    Stream,
    /// Hand selection and cropping to an ffmpeg filtergraph, with decoder fallback.
    Filter,
}

/// Parameters for an extraction batch.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Directory every image is written to.
    pub output_dir: PathBuf,
    /// Edge length of the square crop.
    pub crop_size: i64,
    /// Keep every Nth decoded frame.
    pub stride: i64,
    pub backend: Backend,
    /// JPEG quality (1-100) for the streaming backend.
    pub jpeg_quality: u8,
    /// Upper bound on each ffmpeg/ffprobe invocation.
    pub tool_timeout: Duration,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("datasets/images"),
            crop_size: 640,
            stride: 10,
            backend: Backend::Stream,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            tool_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ExtractConfig {
    pub fn policy(&self) -> Result<SamplingPolicy> {
        SamplingPolicy::new(self.stride, self.crop_size)
    }

    /// Build the extractor for the configured backend on top of located ffmpeg tooling.
    pub fn build_extractor(&self, tooling: Tooling) -> Box<dyn Extractor> {
        let runner = ProcessRunner::new(self.tool_timeout);
        match self.backend {
            Backend::Stream => Box::new(
                StreamExtractor::new(Box::new(FfmpegOpener::new(tooling, runner)))
                    .with_quality(self.jpeg_quality),
            ),
            Backend::Filter => Box::new(FilterExtractor::new(tooling, Box::new(runner))),
        }
    }
}

/// Saved-image count for one video of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReport {
    pub video: PathBuf,
    pub run_id: RunId,
    pub saved: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub videos: Vec<VideoReport>,
}

impl BatchReport {
    pub fn total_saved(&self) -> usize {
        self.videos.iter().map(|v| v.saved).sum()
    }
}

/// Expand `input` into the ordered list of videos to process.
///
/// A file is taken as is. A directory contributes the files directly inside it that carry a
/// known video extension, sorted by file name.
pub fn resolve_inputs(input: &Path) -> Result<Vec<VideoSource>> {
    let no_input = || ExtractError::NoInput {
        path: input.to_path_buf(),
    };

    if input.is_file() {
        return Ok(vec![VideoSource::new(input)]);
    }
    if !input.is_dir() {
        return Err(no_input());
    }

    let entries = fs::read_dir(input)
        .map_err(|e| ExtractError::io(format!("failed to list {}", input.display()), e))?;
    let mut videos = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| ExtractError::io(format!("failed to list {}", input.display()), e))?;
        let path = entry.path();
        if path.is_file() && is_video_file(&path) {
            videos.push(path);
        }
    }
    videos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if videos.is_empty() {
        warn!(?input, "directory contains no video files");
        return Err(no_input());
    }

    info!(?input, count = videos.len(), "resolved input videos");
    Ok(videos.into_iter().map(VideoSource::new).collect())
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Run one extraction per input video, in order, into `config.output_dir`.
///
/// The sampling policy is validated before anything touches the filesystem or a decoder.
/// Each video gets a fresh id from `next_run_id`. The first fatal error aborts the batch.
pub fn run_pipeline(
    input: &Path,
    config: &ExtractConfig,
    extractor: &dyn Extractor,
    mut next_run_id: impl FnMut() -> RunId,
) -> Result<BatchReport> {
    let policy = config.policy()?;
    let videos = resolve_inputs(input)?;

    fs::create_dir_all(&config.output_dir).map_err(|e| {
        ExtractError::io(
            format!("failed to create output directory {}", config.output_dir.display()),
            e,
        )
    })?;

    info!(
        ?input,
        output_dir = ?config.output_dir,
        videos = videos.len(),
        stride = policy.stride(),
        crop_size = policy.crop_size(),
        backend = ?config.backend,
        "pipeline starting"
    );

    let mut report = BatchReport::default();
    for source in videos {
        let run = ExtractionRun::new(next_run_id(), &config.output_dir);
        info!(video = ?source.path(), run_id = %run.run_id(), "extraction run starting");

        let saved = extractor.extract(&source, &run, &policy)?;

        report.videos.push(VideoReport {
            video: source.path().to_path_buf(),
            run_id: run.run_id().clone(),
            saved,
        });
    }

    info!(total_saved = report.total_saved(), "pipeline complete");
    Ok(report)
}
