//! Frame sampling for building image datasets out of videos.
//!
//! Every `stride`-th frame of a video is cropped to a centered square and written as
//! `<run_id>_frame_<native_index>.jpg`. Two backends produce the same selection and the same
//! crop: [`sampler::StreamExtractor`] decodes frames into memory one at a time, and
//! [`filter::FilterExtractor`] hands the work to an ffmpeg filtergraph with a decoder
//! fallback chain. [`pipeline::run_pipeline`] drives either over a file or a directory.

pub mod error;
pub mod filter;
pub mod naming;
pub mod persist;
pub mod pipeline;
pub mod policy;
pub mod rect;
pub mod sampler;
pub mod tooling;
pub mod video;

#[cfg(test)]
mod testing;

pub use error::{ExtractError, Result};
