use std::ffi::OsString;
use std::path::Path;

use tracing::{error, info, warn};

use crate::error::{ExtractError, Result};
use crate::tooling::ToolRunner;

/// Video metadata obtained by probing with ffprobe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeResult {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// Probe the first video stream of `path`. Any failure means the input cannot be treated as
/// a video at all and is reported as [`ExtractError::Open`].
pub fn probe(runner: &dyn ToolRunner, ffprobe: &Path, path: &Path) -> Result<ProbeResult> {
    info!(?path, "probing video metadata with ffprobe");

    if !path.is_file() {
        return Err(open_error(path, "file does not exist"));
    }

    let args: Vec<OsString> = [
        "-v", "error",
        "-select_streams", "v:0",
        "-show_entries", "stream=width,height,r_frame_rate",
        "-of", "csv=p=0",
    ]
    .iter()
    .map(|s| OsString::from(*s))
    .chain([path.as_os_str().to_owned()])
    .collect();

    let output = runner.run(ffprobe, &args)?;
    if !output.success {
        let diagnostics = output.diagnostics();
        error!(%diagnostics, ?path, "ffprobe failed");
        return Err(open_error(path, format!("ffprobe failed: {diagnostics}")));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let result = parse_probe_output(&stdout).map_err(|reason| {
        error!(%stdout, ?path, "unexpected ffprobe output format, expected width,height,fps");
        open_error(path, reason)
    })?;

    if result.fps <= 0.0 {
        warn!(fps = result.fps, ?path, "video has non-positive fps, timestamps will be 0.0");
    }

    info!(width = result.width, height = result.height, fps = result.fps, "probe completed");
    Ok(result)
}

/// Parse ffprobe's `width,height,num/den` csv line.
pub fn parse_probe_output(stdout: &str) -> Result<ProbeResult, String> {
    // Some containers report one line per stream; only the first video stream matters.
    let line = stdout.lines().next().unwrap_or_default().trim();
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 3 {
        return Err(format!("unexpected ffprobe output: {line:?}"));
    }

    let width: u32 = parts[0]
        .parse()
        .map_err(|_| format!("failed to parse width from {:?}", parts[0]))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| format!("failed to parse height from {:?}", parts[1]))?;
    if width == 0 || height == 0 {
        return Err(format!("invalid video dimensions: {width}x{height}"));
    }

    let fps = if let Some((num, den)) = parts[2].split_once('/') {
        let num: f64 = num
            .parse()
            .map_err(|_| format!("failed to parse fps numerator from {num:?}"))?;
        let den: f64 = den
            .parse()
            .map_err(|_| format!("failed to parse fps denominator from {den:?}"))?;
        if den > 0.0 { num / den } else { 0.0 }
    } else {
        parts[2]
            .parse()
            .map_err(|_| format!("failed to parse fps from {:?}", parts[2]))?
    };

    Ok(ProbeResult { width, height, fps })
}

fn open_error(path: &Path, reason: impl Into<String>) -> ExtractError {
    ExtractError::Open {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}
