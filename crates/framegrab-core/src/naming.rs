use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::error::{ExtractError, Result};

const FRAME_MARKER: &str = "_frame_";
const IMAGE_EXTENSION: &str = "jpg";

/// Filename prefix shared by every image of one extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    /// A fresh id: the current unix time in seconds plus a random suffix, so runs started
    /// within the same second still get distinct prefixes.
    pub fn generate() -> Self {
        let secs = chrono::Utc::now().timestamp();
        let suffix = Uuid::new_v4().simple().to_string();
        RunId(format!("{secs}-{}", &suffix[..8]))
    }

    /// A bare unix-seconds prefix, as produced by older runs.
    pub fn from_timestamp(secs: i64) -> Self {
        RunId(secs.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One pass over one video: a fixed run id and the directory its images go to.
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    run_id: RunId,
    output_dir: PathBuf,
}

impl ExtractionRun {
    pub fn new(run_id: RunId, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_id,
            output_dir: output_dir.into(),
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<run_id>_frame_<native_index:06>.jpg`
    pub fn file_name(&self, native_index: u64) -> String {
        format!("{}{FRAME_MARKER}{native_index:06}.{IMAGE_EXTENSION}", self.run_id)
    }

    pub fn output_path(&self, native_index: u64) -> PathBuf {
        self.output_dir.join(self.file_name(native_index))
    }

    /// Prefix every image of this run starts with.
    pub fn frame_prefix(&self) -> String {
        format!("{}{FRAME_MARKER}", self.run_id)
    }

    /// Images of this run currently present in the output directory, sorted by name.
    ///
    /// This is the authoritative saved count for delegated extraction: it reflects what is
    /// actually on disk rather than what the external tool reported.
    pub fn list_outputs(&self) -> Result<Vec<PathBuf>> {
        list_with_prefix(&self.output_dir, &self.frame_prefix())
    }
}

/// Files directly under `dir` named `<prefix>*.jpg`, sorted by name.
pub(crate) fn list_with_prefix(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| ExtractError::io(format!("failed to list {}", dir.display()), e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| ExtractError::io(format!("failed to list {}", dir.display()), e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(prefix) && name.ends_with(&format!(".{IMAGE_EXTENSION}")) {
            paths.push(entry.path());
        }
    }
    paths.sort();

    debug!(?dir, prefix, count = paths.len(), "listed run outputs");
    Ok(paths)
}
