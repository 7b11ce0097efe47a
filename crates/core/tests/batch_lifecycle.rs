//! Batch lifecycle integration tests.
//!
//! These tests drive the batch scheduler with the mock pipeline:
//! - Concurrency limits
//! - Task state transitions (queued -> running -> succeeded/failed)
//! - Failure isolation between files
//! - Cancellation of a running batch

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use clipmill_core::{
    batch::{BatchEvent, BatchResult, BatchScheduler, OutputRules, TaskStatus},
    error::ErrorKind,
    options::{OptionsResolver, SettingsOverrides},
    testing::{fixtures, MockPipeline},
    MediaType, Settings,
};

/// Test helper wiring a scheduler to a mock pipeline.
struct TestHarness {
    scheduler: BatchScheduler,
    pipeline: Arc<MockPipeline>,
    source_dir: TempDir,
    output_dir: TempDir,
}

impl TestHarness {
    fn new(pipeline: MockPipeline, concurrency: usize) -> Self {
        Self::with_pipeline(|_| pipeline, concurrency)
    }

    /// `build` gets the source directory, so scripted paths can point into it.
    fn with_pipeline(build: impl FnOnce(&Path) -> MockPipeline, concurrency: usize) -> Self {
        let source_dir = TempDir::new().expect("Failed to create source dir");
        let output_dir = TempDir::new().expect("Failed to create output dir");
        let pipeline = Arc::new(build(source_dir.path()));
        let scheduler = BatchScheduler::new(pipeline.clone(), concurrency).with_rules(OutputRules {
            output_dir: Some(output_dir.path().to_path_buf()),
            ..Default::default()
        });

        Self {
            scheduler,
            pipeline,
            source_dir,
            output_dir,
        }
    }

    fn create_source_files(&self, names: &[&str]) -> Vec<PathBuf> {
        fixtures::media_files(self.source_dir.path(), names)
    }

    fn source(&self, name: &str) -> PathBuf {
        self.source_dir.path().join(name)
    }

    async fn run(&self, files: Vec<PathBuf>) -> (BatchResult, Vec<BatchEvent>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = self
            .scheduler
            .run(
                files,
                Arc::new(Settings::default()),
                Some(tx),
                CancellationToken::new(),
            )
            .await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (result, events)
    }
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_batch_runs_every_file_once() {
    let harness = TestHarness::new(MockPipeline::new(), 3);
    let files = harness.create_source_files(&["a.mp4", "b.mkv", "c.flac", "d.jpg"]);

    let (result, _) = harness.run(files).await;

    assert_eq!(result.successful.len(), 4);
    assert_eq!(harness.pipeline.run_count(), 4);
    assert!(result
        .tasks
        .iter()
        .all(|t| t.status == TaskStatus::Succeeded));

    let jobs = harness.pipeline.recorded_jobs().await;
    let audio = jobs
        .iter()
        .find(|j| j.media_type == MediaType::Audio)
        .expect("audio job");
    assert_eq!(audio.output, harness.output_dir.path().join("c_converted.m4a"));
}

#[tokio::test]
async fn test_every_file_gets_exactly_one_terminal_event() {
    let harness = TestHarness::with_pipeline(
        |dir| MockPipeline::new().with_failure(dir.join("b.mp4"), "ffmpeg exited with code 1"),
        2,
    );
    let mut files = harness.create_source_files(&["a.mp4", "b.mp4", "c.mp3"]);
    files.push(harness.source("ghost.mp4"));

    let (result, events) = harness.run(files.clone()).await;

    for file in &files {
        let terminal = events
            .iter()
            .filter(|e| match e {
                BatchEvent::FileComplete { file_path, .. } => file_path == file,
                BatchEvent::FileError { file_path, .. } => file_path == file,
                _ => false,
            })
            .count();
        assert_eq!(terminal, 1, "{:?} should settle exactly once", file);
    }

    let progress: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            BatchEvent::Progress { completed, .. } => Some(*completed),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![1, 2, 3, 4]);
    assert!(matches!(events.last(), Some(BatchEvent::Complete { .. })));
    assert_eq!(result.completed, result.total);
}

// =============================================================================
// Failure Isolation Tests
// =============================================================================

#[tokio::test]
async fn test_failing_file_does_not_affect_others() {
    let harness = TestHarness::with_pipeline(
        |dir| {
            MockPipeline::new()
                .with_delay(Duration::from_millis(20))
                .with_failure(dir.join("b.mp4"), "ffmpeg exited with code 1")
        },
        2,
    );
    let files = harness.create_source_files(&["a.mp4", "b.mp4", "c.mp4"]);

    let (result, _) = harness.run(files).await;

    assert_eq!(result.successful.len(), 2);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].path, harness.source("b.mp4"));
    assert_eq!(result.failed[0].kind, ErrorKind::ToolExecution);
    assert_eq!(result.failed[0].diagnostics.as_deref(), Some("mock stderr"));
    assert_eq!(result.tasks[1].status, TaskStatus::Failed);
    assert_eq!(result.tasks[2].status, TaskStatus::Succeeded);
}

#[tokio::test]
async fn test_degraded_outputs_are_reported_separately() {
    let harness =
        TestHarness::with_pipeline(|dir| MockPipeline::new().with_degraded(dir.join("a.mp4")), 2);
    let files = harness.create_source_files(&["a.mp4", "b.mp4"]);

    let (result, events) = harness.run(files).await;

    assert!(result.all_succeeded());
    assert_eq!(result.degraded().count(), 1);
    assert_eq!(result.clean().count(), 1);
    let degraded_events = events
        .iter()
        .filter(|e| matches!(e, BatchEvent::FileComplete { degradations, .. } if !degradations.is_empty()))
        .count();
    assert_eq!(degraded_events, result.degraded().count());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[tokio::test]
async fn test_batch_respects_concurrency_limit() {
    let harness = TestHarness::new(MockPipeline::new().with_delay(Duration::from_millis(100)), 2);
    let files = harness.create_source_files(&["1.mp4", "2.mp4", "3.mp4", "4.mp4", "5.mp4"]);

    let (result, _) = harness.run(files).await;

    assert_eq!(result.successful.len(), 5);
    assert_eq!(harness.pipeline.max_concurrent(), 2);
}

#[tokio::test]
async fn test_concurrency_zero_runs_sequentially() {
    let harness = TestHarness::new(MockPipeline::new().with_delay(Duration::from_millis(20)), 0);
    let files = harness.create_source_files(&["1.mp4", "2.mp4", "3.mp4"]);

    assert_eq!(harness.scheduler.concurrency(), 1);
    let (result, _) = harness.run(files).await;

    assert_eq!(result.successful.len(), 3);
    assert_eq!(harness.pipeline.max_concurrent(), 1);
}

#[tokio::test]
async fn test_cancel_mid_batch() {
    let harness = TestHarness::new(MockPipeline::new().with_delay(Duration::from_millis(150)), 1);
    let files = harness.create_source_files(&["1.mp4", "2.mp4", "3.mp4"]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        // Cancel once the first file has finished.
        while let Some(event) = rx.recv().await {
            if matches!(event, BatchEvent::FileComplete { .. }) {
                trigger.cancel();
            }
        }
    });

    let result = harness
        .scheduler
        .run(files, Arc::new(Settings::default()), Some(tx), cancel)
        .await;

    assert_eq!(result.successful.len(), 1);
    assert_eq!(result.failed.len(), 2);
    assert!(result.failed.iter().all(|f| f.kind == ErrorKind::Cancelled));
    assert!(harness.pipeline.run_count() <= 2);
}

// =============================================================================
// Settings Tests
// =============================================================================

#[tokio::test]
async fn test_resolved_settings_are_shared_by_every_job() {
    let harness = TestHarness::new(MockPipeline::new(), 2);
    let files = harness.create_source_files(&["a.mp4", "b.mp4"]);
    let settings = OptionsResolver::default()
        .resolve(&SettingsOverrides {
            preset: Some("instagram".to_string()),
            video_bitrate: Some("10000k".to_string()),
            ..Default::default()
        })
        .unwrap();

    harness
        .scheduler
        .run(
            files,
            Arc::new(settings),
            None,
            CancellationToken::new(),
        )
        .await;

    let jobs = harness.pipeline.recorded_jobs().await;
    assert_eq!(jobs.len(), 2);
    assert!(Arc::ptr_eq(&jobs[0].settings, &jobs[1].settings));
    assert_eq!(jobs[0].settings.width, Some(1080));
    assert_eq!(jobs[0].settings.video_bitrate.as_deref(), Some("10000k"));
}
