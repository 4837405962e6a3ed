use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use framegrab_core::pipeline::Backend;

#[derive(Parser)]
#[command(
    name = "framegrab",
    about = "Extract every Nth center-cropped frame from videos into an image dataset"
)]
pub struct Cli {
    /// Input video file, or a directory of videos.
    #[arg(long)]
    pub video: PathBuf,

    /// Directory to write extracted frames to.
    #[arg(long, default_value = "datasets/images")]
    pub output: PathBuf,

    /// Edge length of the square crop, in pixels.
    #[arg(long, default_value_t = 640, allow_negative_numbers = true)]
    pub size: i64,

    /// Save every Nth decoded frame.
    #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
    pub stride: i64,

    /// How frames are decoded.
    #[arg(long, value_enum, default_value_t = BackendArg::Stream)]
    pub backend: BackendArg,

    /// JPEG quality (1-100) used by the stream backend.
    #[arg(long, default_value_t = 95, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: u8,

    /// Kill any single ffmpeg/ffprobe invocation running longer than this.
    #[arg(long, default_value_t = 600, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum BackendArg {
    /// Decode frame by frame and crop in process.
    Stream,
    /// Let an ffmpeg filtergraph select and crop, falling back across decoders.
    Filter,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Stream => Backend::Stream,
            BackendArg::Filter => Backend::Filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dataset_layout() {
        let cli = Cli::try_parse_from(["framegrab", "--video", "clip.mp4"]).unwrap();
        assert_eq!(cli.output, PathBuf::from("datasets/images"));
        assert_eq!(cli.size, 640);
        assert_eq!(cli.stride, 10);
        assert!(matches!(cli.backend, BackendArg::Stream));
        assert_eq!(cli.quality, 95);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Cli::try_parse_from(["framegrab", "--video", "v", "--timeout-secs", "0"]).is_err());
        let cli = Cli::try_parse_from(["framegrab", "--video", "v", "--timeout-secs", "1"]).unwrap();
        assert_eq!(cli.timeout_secs, 1);
    }

    #[test]
    fn video_is_required() {
        assert!(Cli::try_parse_from(["framegrab"]).is_err());
    }

    #[test]
    fn negative_stride_reaches_validation() {
        let cli =
            Cli::try_parse_from(["framegrab", "--video", "v", "--stride", "-1", "--backend", "filter"])
                .unwrap();
        assert_eq!(cli.stride, -1);
        assert_eq!(Backend::from(cli.backend), Backend::Filter);
    }
}
