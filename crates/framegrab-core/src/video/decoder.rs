use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

use image::RgbImage;
use tracing::{debug, error, info, warn};

use super::frame::Frame;
use super::probe::probe;
use super::{FrameSource, VideoOpener, VideoSource};
use crate::error::{ExtractError, Result};
use crate::tooling::{drain, ProcessRunner, Tooling};

/// Decodes video frames by piping raw RGB24 data from the ffmpeg CLI.
pub struct VideoDecoder {
    path: PathBuf,
    child: Child,
    stderr: Option<JoinHandle<Vec<u8>>>,
    width: u32,
    height: u32,
    fps: f64,
    frame_count: u64,
    frame_bytes: usize,
}

impl VideoDecoder {
    /// Open a video file for decoding.
    pub fn open(tooling: &Tooling, runner: &ProcessRunner, path: &Path) -> Result<Self> {
        let info = probe(runner, &tooling.ffprobe, path)?;

        info!(?path, "spawning ffmpeg decoder process");

        let mut child = Command::new(&tooling.ffmpeg)
            .args(decoder_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExtractError::Open {
                path: path.to_path_buf(),
                reason: format!("failed to spawn ffmpeg: {e}"),
            })?;
        let stderr = Some(drain(child.stderr.take()));

        let frame_bytes = (info.width as usize) * (info.height as usize) * 3;

        info!(
            width = info.width,
            height = info.height,
            fps = info.fps,
            frame_bytes,
            "video decoder opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            child,
            stderr,
            width: info.width,
            height: info.height,
            fps: info.fps,
            frame_count: 0,
            frame_bytes,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Read the next frame from the ffmpeg pipe, or `None` if the video is finished.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(stdout) = self.child.stdout.as_mut() else {
            return Err(self.decode_error("ffmpeg stdout not available".to_string()));
        };

        let mut buf = vec![0u8; self.frame_bytes];
        let mut read = 0;

        while read < self.frame_bytes {
            match stdout.read(&mut buf[read..]) {
                Ok(0) => {
                    if read == 0 {
                        return self.finish();
                    }
                    error!(
                        read_bytes = read,
                        expected_bytes = self.frame_bytes,
                        frame = self.frame_count,
                        "ffmpeg stream ended mid-frame"
                    );
                    return Err(self.decode_error(format!(
                        "ffmpeg stream ended mid-frame (read {read}/{} bytes)",
                        self.frame_bytes,
                    )));
                }
                Ok(n) => read += n,
                Err(e) => {
                    error!(frame = self.frame_count, %e, "failed to read from ffmpeg pipe");
                    return Err(self.decode_error(format!("failed to read from ffmpeg pipe: {e}")));
                }
            }
        }

        let Some(image) = RgbImage::from_raw(self.width, self.height, buf) else {
            return Err(self.decode_error(
                "failed to create RgbImage from raw frame data".to_string(),
            ));
        };

        let native_index = self.frame_count;
        let timestamp_seconds = if self.fps > 0.0 {
            native_index as f64 / self.fps
        } else {
            0.0
        };
        self.frame_count += 1;

        debug!(native_index, timestamp_seconds, "decoded frame");

        Ok(Some(Frame {
            image,
            native_index,
            timestamp_seconds,
        }))
    }

    /// End of stream: reap ffmpeg and surface a non-zero exit as a decode failure.
    fn finish(&mut self) -> Result<Option<Frame>> {
        info!(total_frames = self.frame_count, "video stream ended");

        let status = self
            .child
            .wait()
            .map_err(|e| self.decode_error(format!("failed to wait for ffmpeg: {e}")))?;
        if status.success() {
            return Ok(None);
        }

        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
        warn!(?status, %stderr, "ffmpeg exited with failure after stream end");
        Err(self.decode_error(format!("ffmpeg exited with {status}: {stderr}")))
    }

    fn decode_error(&self, diagnostics: String) -> ExtractError {
        ExtractError::Decode {
            path: self.path.clone(),
            diagnostics,
        }
    }
}

impl FrameSource for VideoDecoder {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        VideoDecoder::next_frame(self)
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        info!(total_frames = self.frame_count, "closing video decoder");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// ffmpeg arguments streaming the first video stream of `path` as raw RGB24 frames.
///
/// The stream and its orientation must match what ffprobe measured, otherwise the frame
/// size used to split the pipe would be wrong: `-map 0:v:0` pins the stream and
/// `-noautorotate` keeps the coded (unrotated) geometry.
fn decoder_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-nostdin", "-v", "error", "-noautorotate", "-i"]
        .iter()
        .map(|s| OsString::from(*s))
        .collect();
    args.push(path.as_os_str().to_owned());
    args.extend(
        [
            "-map", "0:v:0",
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "-vsync", "0",
            "pipe:1",
        ]
        .iter()
        .map(|s| OsString::from(*s)),
    );
    args
}

/// Opens videos with [`VideoDecoder`].
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    tooling: Tooling,
    runner: ProcessRunner,
}

impl FfmpegOpener {
    pub fn new(tooling: Tooling, runner: ProcessRunner) -> Self {
        Self { tooling, runner }
    }
}

impl VideoOpener for FfmpegOpener {
    fn open(&self, source: &VideoSource) -> Result<Box<dyn FrameSource>> {
        let decoder = VideoDecoder::open(&self.tooling, &self.runner, source.path())?;
        Ok(Box::new(decoder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(args: &[OsString], wanted: &str) -> Option<usize> {
        args.iter().position(|a| a == wanted)
    }

    #[test]
    fn decoder_args_pin_measured_stream_and_geometry() {
        let args = decoder_args(Path::new("clip.mp4"));
        let input = position(&args, "-i").unwrap();

        assert_eq!(args[input + 1], OsString::from("clip.mp4"));
        assert!(position(&args, "-noautorotate").unwrap() < input);

        let map = position(&args, "-map").unwrap();
        assert!(map > input);
        assert_eq!(args[map + 1], OsString::from("0:v:0"));
        assert_eq!(args.last().unwrap(), "pipe:1");
    }
}
