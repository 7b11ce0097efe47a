//! Single-file transcode pipelines.
//!
//! A [`MediaPipeline`] takes one [`FileJob`] through every stage in order:
//! path checks, duration probe, command synthesis, supervised encode and
//! post-processing. [`FfmpegPipeline`] is the production implementation.
//!
//! # Example
//!
//! ```ignore
//! use clipmill_core::pipeline::{FfmpegPipeline, FileJob, MediaPipeline, ToolsConfig};
//!
//! let pipeline = FfmpegPipeline::new(ToolsConfig::default());
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let result = pipeline.run(job, Some(tx), CancellationToken::new()).await?;
//! println!("{}", result.command);
//! ```

mod config;
mod ffmpeg;
mod traits;
mod types;

pub use config::ToolsConfig;
pub use ffmpeg::{check_paths, FfmpegPipeline};
pub use traits::MediaPipeline;
pub use types::{FileJob, PipelineResult};
