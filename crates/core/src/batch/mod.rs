//! Batch processing: many files, one settings record, bounded concurrency.
//!
//! [`BatchScheduler`] derives an output path for every input with
//! [`OutputRules`], runs a [`MediaPipeline`](crate::pipeline::MediaPipeline)
//! per file and reports through [`BatchEvent`]s. The final [`BatchResult`]
//! separates clean successes, degraded successes and failures.
//!
//! # Example
//!
//! ```ignore
//! use clipmill_core::batch::BatchScheduler;
//! use clipmill_core::pipeline::{FfmpegPipeline, ToolsConfig};
//!
//! let scheduler = BatchScheduler::new(Arc::new(FfmpegPipeline::new(ToolsConfig::default())), 4);
//! let result = scheduler.run(files, settings, None, CancellationToken::new()).await;
//! println!("{} of {} succeeded", result.successful.len(), result.total);
//! ```

mod scheduler;
mod types;

pub use scheduler::BatchScheduler;
pub use types::{BatchEvent, BatchResult, FailedFile, FileTask, OutputRules, TaskStatus};
