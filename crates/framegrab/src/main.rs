mod cli;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use framegrab_core::naming::RunId;
use framegrab_core::pipeline::{self, ExtractConfig};
use framegrab_core::tooling::Tooling;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    let config = ExtractConfig {
        output_dir: cli.output,
        crop_size: cli.size,
        stride: cli.stride,
        backend: cli.backend.into(),
        jpeg_quality: cli.quality,
        tool_timeout: Duration::from_secs(cli.timeout_secs),
    };
    info!(video = ?cli.video, ?config, "starting extraction");

    // Policy errors take precedence over missing tooling.
    config.policy().context("invalid sampling options")?;
    let tooling = Tooling::locate().context("ffmpeg tooling is required")?;
    let extractor = config.build_extractor(tooling);

    let report = pipeline::run_pipeline(&cli.video, &config, extractor.as_ref(), RunId::generate)
        .with_context(|| format!("extraction from {} failed", cli.video.display()))?;

    for video in &report.videos {
        if video.saved == 0 {
            warn!(video = ?video.video, "no frames saved");
        }
        println!(
            "Saved {} frames from {} to {}",
            video.saved,
            video.video.display(),
            config.output_dir.display()
        );
    }
    println!("Total saved: {}", report.total_saved());

    Ok(())
}
