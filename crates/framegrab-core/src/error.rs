use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal failures of an extraction. Per-image write failures are not represented here;
/// they are logged and left out of the saved count.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid sampling policy: {0}")]
    InvalidPolicy(String),

    #[error("cannot open video {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    #[error("frame too small for {size}x{size} crop: {width}x{height}")]
    CropTooSmall { width: u32, height: u32, size: u32 },

    #[error("all decode strategies failed for {}: {diagnostics}", path.display())]
    Decode { path: PathBuf, diagnostics: String },

    #[error("required tool `{tool}` not found on PATH")]
    ToolingMissing { tool: String },

    #[error("no input videos found at {}", path.display())]
    NoInput { path: PathBuf },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ExtractError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        ExtractError::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;
