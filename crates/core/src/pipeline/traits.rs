//! The single-file pipeline seam.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::types::{FileJob, PipelineResult};
use crate::error::TranscodeError;
use crate::supervisor::PipelineEvent;

/// Transcodes one file end to end.
///
/// Implementations dispatch on [`FileJob::media_type`]. Events are best
/// effort: a closed or absent channel never changes the outcome.
#[async_trait]
pub trait MediaPipeline: Send + Sync {
    /// Returns the name of this pipeline implementation.
    fn name(&self) -> &str;

    async fn run(
        &self,
        job: FileJob,
        events: Option<mpsc::UnboundedSender<PipelineEvent>>,
        cancel: CancellationToken,
    ) -> Result<PipelineResult, TranscodeError>;
}
