//! Mock pipeline for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::{Degradation, DegradationKind, TranscodeError};
use crate::pipeline::{FileJob, MediaPipeline, PipelineResult};
use crate::supervisor::{PipelineEvent, ProgressSample};

/// Mock implementation of [`MediaPipeline`].
///
/// Never touches the filesystem or spawns a process. Provides:
/// - Recorded jobs for assertions
/// - A simulated encode time that honors cancellation
/// - Scripted progress, degradations and failures per input path
/// - Peak concurrency tracking
///
/// # Example
///
/// ```rust,ignore
/// use clipmill_core::testing::MockPipeline;
///
/// let mock = Arc::new(MockPipeline::new().with_delay(Duration::from_millis(20)));
/// let scheduler = BatchScheduler::new(mock.clone(), 2);
/// scheduler.run(files, settings, None, CancellationToken::new()).await;
/// assert!(mock.max_concurrent() <= 2);
/// ```
#[derive(Debug, Default)]
pub struct MockPipeline {
    delay: Duration,
    /// Percentages reported for every job, in order.
    progress: Vec<f64>,
    degraded: HashSet<PathBuf>,
    /// Inputs that fail, with the failure reason.
    failing: HashMap<PathBuf, String>,
    jobs: Arc<RwLock<Vec<FileJob>>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    runs: AtomicUsize,
}

/// Decrements the active count however the run ends.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated encode time per job.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_progress(mut self, percents: Vec<f64>) -> Self {
        self.progress = percents;
        self
    }

    /// Jobs for `input` succeed with a watermark degradation.
    pub fn with_degraded(mut self, input: impl Into<PathBuf>) -> Self {
        self.degraded.insert(input.into());
        self
    }

    /// Jobs for `input` fail as a tool execution error.
    pub fn with_failure(mut self, input: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        self.failing.insert(input.into(), reason.into());
        self
    }

    /// Number of runs started, including failed and cancelled ones.
    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Highest number of runs in flight at once.
    pub fn max_concurrent(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub async fn recorded_jobs(&self) -> Vec<FileJob> {
        self.jobs.read().await.clone()
    }

    fn emit_progress(&self, events: &Option<mpsc::UnboundedSender<PipelineEvent>>) {
        let Some(tx) = events else { return };
        for percent in &self.progress {
            let _ = tx.send(PipelineEvent::Progress {
                sample: ProgressSample {
                    elapsed_secs: Some(*percent),
                    ..Default::default()
                },
                duration: Some(100.0),
            });
        }
    }
}

#[async_trait]
impl MediaPipeline for MockPipeline {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(
        &self,
        job: FileJob,
        events: Option<mpsc::UnboundedSender<PipelineEvent>>,
        cancel: CancellationToken,
    ) -> Result<PipelineResult, TranscodeError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);
        self.jobs.write().await.push(job.clone());

        tokio::select! {
            _ = cancel.cancelled() => return Err(TranscodeError::Cancelled),
            _ = tokio::time::sleep(self.delay) => {}
        }

        if let Some(reason) = self.failing.get(&job.input) {
            return Err(TranscodeError::execution_failed(
                reason.clone(),
                Some(1),
                "mock stderr",
            ));
        }

        self.emit_progress(&events);

        let degradations = if self.degraded.contains(&job.input) {
            vec![Degradation::new(
                DegradationKind::Watermark,
                "watermark image not found",
            )]
        } else {
            Vec::new()
        };

        Ok(PipelineResult {
            command: format!("mock {}", job.input.display()),
            input_path: job.input,
            output_path: job.output,
            media_type: job.media_type,
            metadata: None,
            thumbnails: Vec::new(),
            degradations,
            events_emitted: self.progress.len() as u64,
            elapsed_ms: self.delay.as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Settings;
    use crate::scanner::MediaType;
    use tokio_test::assert_ok;

    fn job(input: &str) -> FileJob {
        FileJob {
            input: PathBuf::from(input),
            output: PathBuf::from("/out/x.mp4"),
            media_type: MediaType::Video,
            settings: Arc::new(Settings::default()),
        }
    }

    #[tokio::test]
    async fn test_records_jobs() {
        let mock = MockPipeline::new();
        assert_ok!(mock.run(job("/in/a.mp4"), None, CancellationToken::new()).await);
        assert_ok!(mock.run(job("/in/b.mp4"), None, CancellationToken::new()).await);

        let jobs = mock.recorded_jobs().await;
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].input, PathBuf::from("/in/b.mp4"));
        assert_eq!(mock.run_count(), 2);
        assert_eq!(mock.max_concurrent(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure_and_degradation() {
        let mock = MockPipeline::new()
            .with_failure("/in/bad.mp4", "encoder exploded")
            .with_degraded("/in/meh.mp4");

        let err = mock
            .run(job("/in/bad.mp4"), None, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::ToolExecution { .. }));

        let ok = mock
            .run(job("/in/meh.mp4"), None, CancellationToken::new())
            .await
            .unwrap();
        assert!(ok.is_degraded());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_delay() {
        let mock = MockPipeline::new().with_delay(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = mock.run(job("/in/a.mp4"), None, cancel).await.unwrap_err();
        assert!(matches!(err, TranscodeError::Cancelled));
    }

    #[tokio::test]
    async fn test_progress_events() {
        let mock = MockPipeline::new().with_progress(vec![25.0, 75.0]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        mock.run(job("/in/a.mp4"), Some(tx), CancellationToken::new())
            .await
            .unwrap();

        let mut percents = Vec::new();
        while let Ok(PipelineEvent::Progress { sample, duration }) = rx.try_recv() {
            percents.push(sample.percent(duration).unwrap());
        }
        assert_eq!(percents, vec![25.0, 75.0]);
    }
}
