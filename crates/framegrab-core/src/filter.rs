use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{ExtractError, Result};
use crate::naming::{list_with_prefix, ExtractionRun};
use crate::pipeline::Extractor;
use crate::policy::SamplingPolicy;
use crate::rect::{centered_square, PixelRect};
use crate::tooling::{ToolRunner, Tooling};
use crate::video::probe::probe;
use crate::video::VideoSource;

const PENDING_MARKER: &str = "_pending_";

/// ffmpeg mjpeg qscale (2 is the best quality ffmpeg offers for JPEG output).
const JPEG_QSCALE: &str = "2";

/// One way of asking ffmpeg to decode the input: extra arguments placed before `-i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeStrategy {
    pub name: String,
    pub input_args: Vec<String>,
}

impl DecodeStrategy {
    pub fn new(name: impl Into<String>, input_args: &[&str]) -> Self {
        Self {
            name: name.into(),
            input_args: input_args.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Force the dav1d AV1 decoder and keep going past corrupt frames.
    pub fn av1_tolerant() -> Self {
        Self::new("av1-tolerant", &["-c:v", "libdav1d", "-err_detect", "ignore_err"])
    }

    /// Let ffmpeg pick the decoder.
    pub fn platform_default() -> Self {
        Self::new("default", &[])
    }

    /// The chain tried in order until one attempt succeeds.
    pub fn default_chain() -> Vec<Self> {
        vec![Self::av1_tolerant(), Self::platform_default()]
    }
}

/// ffmpeg filtergraph that keeps frames whose index is divisible by the stride and crops
/// them to `rect`.
pub fn filter_expression(policy: &SamplingPolicy, rect: PixelRect) -> String {
    format!(
        "select='not(mod(n\\,{}))',crop={}:{}:{}:{}",
        policy.stride(),
        rect.w,
        rect.h,
        rect.x,
        rect.y
    )
}

/// Extraction delegated to an ffmpeg filtergraph that selects, crops and writes images
/// itself.
///
/// ffmpeg numbers its outputs in emission order. Once an attempt succeeds, each output is
/// renamed to the native index of the frame it came from, so filenames match what the
/// streaming extractor would produce for the same video.
pub struct FilterExtractor {
    tooling: Tooling,
    runner: Box<dyn ToolRunner>,
    strategies: Vec<DecodeStrategy>,
}

impl FilterExtractor {
    pub fn new(tooling: Tooling, runner: Box<dyn ToolRunner>) -> Self {
        Self {
            tooling,
            runner,
            strategies: DecodeStrategy::default_chain(),
        }
    }

    pub fn with_strategies(mut self, strategies: Vec<DecodeStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    fn ffmpeg_args(
        &self,
        strategy: &DecodeStrategy,
        input: &Path,
        filter: &str,
        pattern: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-y"]
            .iter()
            .map(|s| OsString::from(*s))
            .collect();
        args.extend(strategy.input_args.iter().map(OsString::from));
        // Decode the stream ffprobe measured, in its coded orientation, so the crop fits.
        args.push("-noautorotate".into());
        args.push("-i".into());
        args.push(input.as_os_str().to_owned());
        for arg in [
            "-map", "0:v:0",
            "-vf", filter,
            "-vsync", "0",
            "-start_number", "0",
            "-q:v", JPEG_QSCALE,
        ] {
            args.push(arg.into());
        }
        args.push(pattern.as_os_str().to_owned());
        args
    }
}

impl Extractor for FilterExtractor {
    fn extract(
        &self,
        source: &VideoSource,
        run: &ExtractionRun,
        policy: &SamplingPolicy,
    ) -> Result<usize> {
        let path = source.path();
        let info = probe(self.runner.as_ref(), &self.tooling.ffprobe, path)?;
        let rect = centered_square(info.width, info.height, policy.crop_size())?;
        let filter = filter_expression(policy, rect);
        let pattern = output_pattern(run);

        info!(?path, %filter, run_id = %run.run_id(), "starting filter extraction");

        let mut last_diagnostics = None;
        for (attempt, strategy) in self.strategies.iter().enumerate() {
            // A failed attempt may have left images behind.
            clear_pending(run)?;

            let args = self.ffmpeg_args(strategy, path, &filter, &pattern);
            info!(strategy = %strategy.name, attempt = attempt + 1, "running ffmpeg");
            let output = self.runner.run(&self.tooling.ffmpeg, &args)?;

            if output.success {
                let promoted = promote_pending(run, policy)?;
                let saved = run.list_outputs()?.len();
                info!(
                    ?path,
                    strategy = %strategy.name,
                    promoted,
                    saved,
                    "filter extraction finished"
                );
                return Ok(saved);
            }

            let diagnostics = output.diagnostics();
            warn!(strategy = %strategy.name, %diagnostics, "decode strategy failed");
            last_diagnostics = Some(diagnostics);
        }

        clear_pending(run)?;
        let diagnostics =
            last_diagnostics.unwrap_or_else(|| "no decode strategies configured".to_string());
        error!(?path, %diagnostics, "all decode strategies failed");
        Err(ExtractError::Decode {
            path: path.to_path_buf(),
            diagnostics,
        })
    }
}

/// image2 output pattern for a run's pending images. `%` in the directory is doubled so
/// ffmpeg reads it literally; only the trailing `%06d` is a directive.
fn output_pattern(run: &ExtractionRun) -> PathBuf {
    let dir = run.output_dir();
    let dir = match dir.to_str() {
        Some(s) if s.contains('%') => PathBuf::from(s.replace('%', "%%")),
        _ => dir.to_path_buf(),
    };
    dir.join(format!("{}%06d.jpg", pending_prefix(run)))
}

fn pending_prefix(run: &ExtractionRun) -> String {
    format!("{}{PENDING_MARKER}", run.run_id())
}

fn clear_pending(run: &ExtractionRun) -> Result<()> {
    for path in list_with_prefix(run.output_dir(), &pending_prefix(run))? {
        fs::remove_file(&path)
            .map_err(|e| ExtractError::io(format!("failed to remove {}", path.display()), e))?;
        debug!(?path, "removed partial output");
    }
    Ok(())
}

/// Rename `<run>_pending_<k>.jpg` to `<run>_frame_<k * stride>.jpg`. Returns the number of
/// files renamed.
fn promote_pending(run: &ExtractionRun, policy: &SamplingPolicy) -> Result<usize> {
    let prefix = pending_prefix(run);
    let mut promoted = 0;

    for path in list_with_prefix(run.output_dir(), &prefix)? {
        let Some(emitted) = emission_index(&path, &prefix) else {
            warn!(?path, "unrecognized ffmpeg output name, leaving in place");
            continue;
        };
        let target = run.output_path(policy.native_index_of(emitted));
        fs::rename(&path, &target).map_err(|e| {
            ExtractError::io(
                format!("failed to rename {} to {}", path.display(), target.display()),
                e,
            )
        })?;
        promoted += 1;
    }

    Ok(promoted)
}

fn emission_index(path: &Path, prefix: &str) -> Option<u64> {
    path.file_stem()?
        .to_str()?
        .strip_prefix(prefix)?
        .parse()
        .ok()
}
