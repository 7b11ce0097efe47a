//! Bounded-concurrency batch scheduler.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::types::{BatchEvent, BatchResult, FailedFile, FileTask, OutputRules, TaskStatus};
use crate::error::TranscodeError;
use crate::options::Settings;
use crate::pipeline::{check_paths, FileJob, MediaPipeline, PipelineResult};
use crate::scanner::{scan_directory, MediaClassifier};
use crate::supervisor::PipelineEvent;

type TaskOutput = (usize, Result<PipelineResult, TranscodeError>);

/// Fans a [`MediaPipeline`] out over many files, at most `concurrency` at a
/// time.
///
/// The scheduler loop is the only writer of task states and of the result;
/// running tasks just return their outcome. One file failing never affects
/// another.
#[derive(Clone)]
pub struct BatchScheduler {
    pipeline: Arc<dyn MediaPipeline>,
    classifier: MediaClassifier,
    rules: OutputRules,
    concurrency: usize,
}

impl BatchScheduler {
    /// A concurrency of 0 is treated as 1.
    pub fn new(pipeline: Arc<dyn MediaPipeline>, concurrency: usize) -> Self {
        Self {
            pipeline,
            classifier: MediaClassifier::builtin(),
            rules: OutputRules::default(),
            concurrency: concurrency.max(1),
        }
    }

    pub fn with_classifier(mut self, classifier: MediaClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_rules(mut self, rules: OutputRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Scans `dir` and runs every media file found.
    pub async fn run_directory(
        &self,
        dir: &Path,
        recursive: bool,
        settings: Arc<Settings>,
        events: Option<mpsc::UnboundedSender<BatchEvent>>,
        cancel: CancellationToken,
    ) -> Result<BatchResult, TranscodeError> {
        let files = scan_directory(dir, recursive, &self.classifier)?;
        Ok(self.run(files, settings, events, cancel).await)
    }

    /// Runs every file and returns once all of them are settled.
    ///
    /// After `cancel` fires no new file is started, running ones are
    /// cancelled, and files never started are recorded as failed.
    pub async fn run(
        &self,
        files: Vec<PathBuf>,
        settings: Arc<Settings>,
        events: Option<mpsc::UnboundedSender<BatchEvent>>,
        cancel: CancellationToken,
    ) -> BatchResult {
        let batch_id = Uuid::new_v4();
        let span = info_span!("batch", id = %batch_id);
        BatchRun {
            scheduler: self,
            settings,
            events,
            cancel,
            claimed: HashSet::new(),
            result: BatchResult::new(
                batch_id,
                files
                    .into_iter()
                    .enumerate()
                    .map(|(i, path)| FileTask::new(path, i))
                    .collect(),
            ),
        }
        .execute()
        .instrument(span)
        .await
    }
}

/// State of one `run` call, owned by the scheduler loop.
struct BatchRun<'a> {
    scheduler: &'a BatchScheduler,
    settings: Arc<Settings>,
    events: Option<mpsc::UnboundedSender<BatchEvent>>,
    cancel: CancellationToken,
    /// Output paths already assigned to a file of this batch.
    claimed: HashSet<PathBuf>,
    result: BatchResult,
}

impl BatchRun<'_> {
    async fn execute(mut self) -> BatchResult {
        let total = self.result.total;
        let limit = self.scheduler.concurrency;
        info!("Starting batch of {} files, concurrency {}", total, limit);
        self.emit(BatchEvent::Start {
            batch_id: self.result.batch_id,
            total,
        });

        let mut active: JoinSet<TaskOutput> = JoinSet::new();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<(usize, f64)>();
        let mut cursor = 0;
        let mut cancel_seen = false;

        loop {
            while active.len() < limit && cursor < total && !self.cancel.is_cancelled() {
                let index = cursor;
                cursor += 1;
                self.admit(index, &mut active, &progress_tx);
            }

            if active.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                Some((index, percent)) = progress_rx.recv() => {
                    self.emit(BatchEvent::FileProgress {
                        file_path: self.result.tasks[index].path.clone(),
                        index,
                        percent,
                    });
                }
                Some(joined) = active.join_next() => match joined {
                    Ok((index, outcome)) => self.settle(index, outcome),
                    Err(e) => error!("Batch task could not be joined: {}", e),
                },
                _ = self.cancel.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    warn!("Batch cancelled with {} files running", active.len());
                }
            }
        }

        for index in cursor..total {
            self.fail(index, &TranscodeError::Cancelled);
        }

        info!(
            "Batch finished: {} succeeded ({} degraded), {} failed",
            self.result.successful.len(),
            self.result.degraded().count(),
            self.result.failed.len()
        );
        self.emit(BatchEvent::Complete {
            result: self.result.clone(),
        });
        self.result
    }

    fn admit(
        &mut self,
        index: usize,
        active: &mut JoinSet<TaskOutput>,
        progress: &mpsc::UnboundedSender<(usize, f64)>,
    ) {
        let job = match self.prepare(index) {
            Ok(job) => job,
            Err(e) => {
                warn!("Skipping {:?}: {}", self.result.tasks[index].path, e);
                self.fail(index, &e);
                return;
            }
        };

        let task = &mut self.result.tasks[index];
        task.status = TaskStatus::Running;
        task.media_type = Some(job.media_type);
        debug!("Admitted {:?} as {}", job.input, job.media_type);
        self.emit(BatchEvent::FileStart {
            file_path: job.input.clone(),
            output_path: job.output.clone(),
            media_type: job.media_type,
            index,
        });

        let pipeline = Arc::clone(&self.scheduler.pipeline);
        let token = self.cancel.child_token();
        let progress = progress.clone();
        let span = info_span!("file", index, path = %job.input.display());
        active.spawn(
            async move {
                // Run in a nested task so a panicking pipeline still reports
                // back with its index.
                let outcome = tokio::spawn(
                    run_file(pipeline, job, token, index, progress).in_current_span(),
                )
                .await
                .unwrap_or_else(|e| {
                    Err(TranscodeError::execution_failed(
                        format!("pipeline task failed: {}", e),
                        None,
                        "",
                    ))
                });
                (index, outcome)
            }
            .instrument(span),
        );
    }

    fn prepare(&mut self, index: usize) -> Result<FileJob, TranscodeError> {
        let input = self.result.tasks[index].path.clone();
        let media_type = self
            .scheduler
            .classifier
            .classify(&input)
            .ok_or_else(|| {
                TranscodeError::validation(format!("unsupported file type: {}", input.display()))
            })?;
        self.result.tasks[index].media_type = Some(media_type);

        let output =
            self.scheduler
                .rules
                .output_path(&input, media_type, &self.settings.audio_codec);
        check_paths(&input, &output, self.settings.overwrite)?;
        if !self.claimed.insert(output.clone()) {
            return Err(TranscodeError::Conflict { path: output });
        }

        Ok(FileJob {
            input,
            output,
            media_type,
            settings: Arc::clone(&self.settings),
        })
    }

    fn settle(&mut self, index: usize, outcome: Result<PipelineResult, TranscodeError>) {
        match outcome {
            Ok(done) => {
                self.result.tasks[index].status = TaskStatus::Succeeded;
                self.result.completed += 1;
                info!("Completed {:?}", done.output_path);
                self.emit(BatchEvent::FileComplete {
                    file_path: done.input_path.clone(),
                    output_path: done.output_path.clone(),
                    metadata: done.metadata.clone(),
                    degradations: done.degradations.clone(),
                });
                self.result.successful.push(done);
                self.emit_progress();
            }
            Err(e) => {
                warn!("Failed {:?}: {}", self.result.tasks[index].path, e);
                self.fail(index, &e);
            }
        }
    }

    fn fail(&mut self, index: usize, error: &TranscodeError) {
        let task = &mut self.result.tasks[index];
        task.status = TaskStatus::Failed;
        let path = task.path.clone();
        self.result.completed += 1;
        self.result.failed.push(FailedFile::new(path.clone(), error));
        self.emit(BatchEvent::FileError {
            file_path: path,
            kind: error.kind(),
            error: error.to_string(),
        });
        self.emit_progress();
    }

    fn emit_progress(&self) {
        self.emit(BatchEvent::Progress {
            completed: self.result.completed,
            total: self.result.total,
            percent: self.result.percent(),
        });
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Runs one pipeline, turning its progress events into percentages.
async fn run_file(
    pipeline: Arc<dyn MediaPipeline>,
    job: FileJob,
    cancel: CancellationToken,
    index: usize,
    progress: mpsc::UnboundedSender<(usize, f64)>,
) -> Result<PipelineResult, TranscodeError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let forward = async move {
        while let Some(event) = rx.recv().await {
            if let PipelineEvent::Progress { sample, duration } = event {
                if let Some(percent) = sample.percent(duration) {
                    let _ = progress.send((index, percent));
                }
            }
        }
    };
    let (outcome, ()) = tokio::join!(pipeline.run(job, Some(tx), cancel), forward);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::MockPipeline;
    use std::time::Duration;

    fn media_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, b"media").unwrap();
                path
            })
            .collect()
    }

    fn out_rules(dir: &Path) -> OutputRules {
        OutputRules {
            output_dir: Some(dir.join("out")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_concurrency_cap_and_isolated_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = media_files(dir.path(), &["a.mp4", "b.mp4", "c.mp3", "d.png"]);
        files.insert(2, dir.path().join("missing.mp4"));

        let mock = Arc::new(MockPipeline::new().with_delay(Duration::from_millis(50)));
        let scheduler = BatchScheduler::new(mock.clone(), 2).with_rules(out_rules(dir.path()));

        let result = scheduler
            .run(
                files,
                Arc::new(Settings::default()),
                None,
                CancellationToken::new(),
            )
            .await;

        assert_eq!(result.total, 5);
        assert_eq!(result.completed, 5);
        assert_eq!(result.successful.len(), 4);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].kind, ErrorKind::NotFound);
        assert!(result.tasks.iter().all(|t| t.status.is_terminal()));
        assert!(mock.max_concurrent() <= 2);
        assert_eq!(mock.max_concurrent(), 2);
        assert_eq!(mock.run_count(), 4);
    }

    #[tokio::test]
    async fn test_event_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let files = media_files(dir.path(), &["a.mp4", "b.txt"]);

        let mock = Arc::new(MockPipeline::new().with_progress(vec![50.0, 100.0]));
        let scheduler = BatchScheduler::new(mock, 1).with_rules(out_rules(dir.path()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = scheduler
            .run(
                files,
                Arc::new(Settings::default()),
                Some(tx),
                CancellationToken::new(),
            )
            .await;
        assert_eq!(result.successful.len(), 1);
        assert_eq!(result.failed[0].kind, ErrorKind::Validation);

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(match event {
                BatchEvent::Start { total, .. } => format!("start:{}", total),
                BatchEvent::FileStart { index, .. } => format!("file_start:{}", index),
                BatchEvent::FileProgress { percent, .. } => format!("file_progress:{}", percent),
                BatchEvent::FileComplete { .. } => "file_complete".to_string(),
                BatchEvent::FileError { .. } => "file_error".to_string(),
                BatchEvent::Progress { completed, .. } => format!("progress:{}", completed),
                BatchEvent::Complete { .. } => "complete".to_string(),
            });
        }
        assert_eq!(
            names,
            vec![
                "start:2",
                "file_start:0",
                "file_progress:50",
                "file_progress:100",
                "file_complete",
                "progress:1",
                "file_error",
                "progress:2",
                "complete",
            ]
        );
    }

    #[tokio::test]
    async fn test_output_conflict_is_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = media_files(dir.path(), &["a.mp4", "b.mp4"]);
        std::fs::create_dir_all(dir.path().join("out")).unwrap();
        std::fs::write(dir.path().join("out").join("a_converted.mp4"), b"old").unwrap();

        let scheduler =
            BatchScheduler::new(Arc::new(MockPipeline::new()), 2).with_rules(out_rules(dir.path()));
        let result = scheduler
            .run(
                files,
                Arc::new(Settings::default()),
                None,
                CancellationToken::new(),
            )
            .await;

        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].kind, ErrorKind::Conflict);
        assert_eq!(result.successful.len(), 1);
    }

    #[tokio::test]
    async fn test_shared_output_path_fails_second_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = media_files(dir.path(), &["a.mp4", "a.mov", "b.mp4"]);

        let mock = Arc::new(MockPipeline::new());
        let scheduler = BatchScheduler::new(mock.clone(), 2).with_rules(out_rules(dir.path()));
        let settings = Settings {
            overwrite: true,
            ..Default::default()
        };
        let result = scheduler
            .run(files, Arc::new(settings), None, CancellationToken::new())
            .await;

        assert_eq!(result.successful.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].path, dir.path().join("a.mov"));
        assert_eq!(result.failed[0].kind, ErrorKind::Conflict);
        assert_eq!(mock.run_count(), 2);

        let outputs: HashSet<PathBuf> = result
            .successful
            .iter()
            .map(|r| r.output_path.clone())
            .collect();
        assert_eq!(outputs.len(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_stops_admission() {
        let dir = tempfile::tempdir().unwrap();
        let files = media_files(dir.path(), &["1.mp4", "2.mp4", "3.mp4", "4.mp4", "5.mp4"]);

        let mock = Arc::new(MockPipeline::new().with_delay(Duration::from_secs(30)));
        let scheduler = BatchScheduler::new(mock.clone(), 2).with_rules(out_rules(dir.path()));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            scheduler.run(files, Arc::new(Settings::default()), None, cancel),
        )
        .await
        .expect("cancelled batch should finish promptly");

        assert_eq!(mock.run_count(), 2);
        assert_eq!(result.failed.len(), 5);
        assert!(result.failed.iter().all(|f| f.kind == ErrorKind::Cancelled));
        assert!(result.tasks.iter().all(|t| t.status == TaskStatus::Failed));
    }

    #[tokio::test]
    async fn test_empty_batch_completes() {
        let scheduler = BatchScheduler::new(Arc::new(MockPipeline::new()), 4);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = scheduler
            .run(
                Vec::new(),
                Arc::new(Settings::default()),
                Some(tx),
                CancellationToken::new(),
            )
            .await;
        assert_eq!(result.total, 0);
        assert_eq!(result.percent(), 100.0);
        assert!(matches!(rx.try_recv().unwrap(), BatchEvent::Start { total: 0, .. }));
        assert!(matches!(rx.try_recv().unwrap(), BatchEvent::Complete { .. }));
    }

    #[tokio::test]
    async fn test_degraded_results_are_separated() {
        let dir = tempfile::tempdir().unwrap();
        let files = media_files(dir.path(), &["a.mp4", "b.mp4"]);
        let mock = Arc::new(MockPipeline::new().with_degraded(dir.path().join("b.mp4")));
        let scheduler = BatchScheduler::new(mock, 2).with_rules(out_rules(dir.path()));

        let result = scheduler
            .run(
                files,
                Arc::new(Settings::default()),
                None,
                CancellationToken::new(),
            )
            .await;
        assert_eq!(result.successful.len(), 2);
        assert_eq!(result.degraded().count(), 1);
        assert_eq!(result.clean().count(), 1);
        assert!(result.all_succeeded());
    }

    #[tokio::test]
    async fn test_run_directory() {
        let dir = tempfile::tempdir().unwrap();
        media_files(dir.path(), &["a.mp4", "notes.txt", "b.mp3"]);
        let scheduler =
            BatchScheduler::new(Arc::new(MockPipeline::new()), 2).with_rules(out_rules(dir.path()));

        let result = scheduler
            .run_directory(
                dir.path(),
                false,
                Arc::new(Settings::default()),
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.successful.len(), 2);

        let err = scheduler
            .run_directory(
                &dir.path().join("absent"),
                false,
                Arc::new(Settings::default()),
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::NotFound { .. }));
    }
}
