//! ffmpeg-backed pipeline: probe, synthesize, supervise, post-process.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::config::ToolsConfig;
use super::traits::MediaPipeline;
use super::types::{FileJob, PipelineResult};
use crate::error::TranscodeError;
use crate::filter::{FilterGraphSynthesizer, FontLocator, SynthesisRequest, SystemFontLocator};
use crate::postprocess::{PostProcessingChain, Prober, ThumbnailGenerator};
use crate::scanner::MediaType;
use crate::supervisor::{command_line, EventSink, PipelineEvent, ProcessSupervisor};

/// Runs video, audio and image jobs through ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegPipeline {
    tools: ToolsConfig,
    synthesizer: FilterGraphSynthesizer,
    supervisor: ProcessSupervisor,
    prober: Prober,
    post: PostProcessingChain,
}

impl FfmpegPipeline {
    pub fn new(tools: ToolsConfig) -> Self {
        Self::with_fonts(tools, Arc::new(SystemFontLocator::default()))
    }

    /// Pipeline using `fonts` for text watermarks.
    pub fn with_fonts(tools: ToolsConfig, fonts: Arc<dyn FontLocator>) -> Self {
        let supervisor = ProcessSupervisor::new(tools.encode_timeout());
        let prober = Prober::new(&tools.ffprobe_path, tools.probe_timeout());
        let post = PostProcessingChain::new(
            prober.clone(),
            ThumbnailGenerator::new(&tools.ffmpeg_path, supervisor.clone()),
        );
        Self {
            synthesizer: FilterGraphSynthesizer::new(fonts, &tools.temp_dir),
            supervisor,
            prober,
            post,
            tools,
        }
    }

    pub fn tools(&self) -> &ToolsConfig {
        &self.tools
    }

    async fn source_duration(&self, job: &FileJob) -> Option<f64> {
        if job.media_type == MediaType::Image {
            return None;
        }
        match self.prober.probe(&job.input).await {
            Ok(info) => info.duration_secs,
            Err(e) => {
                debug!("Could not probe {:?} before encoding: {}", job.input, e);
                None
            }
        }
    }
}

/// Checks that must pass before anything is spawned.
pub fn check_paths(input: &Path, output: &Path, overwrite: bool) -> Result<(), TranscodeError> {
    if !input.is_file() {
        return Err(TranscodeError::NotFound {
            path: input.to_path_buf(),
        });
    }

    let same = match (input.canonicalize(), output.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => input == output,
    };
    if same {
        return Err(TranscodeError::validation(format!(
            "output path is the same as the input: {}",
            input.display()
        )));
    }

    if output.exists() && !overwrite {
        return Err(TranscodeError::Conflict {
            path: output.to_path_buf(),
        });
    }
    Ok(())
}

#[async_trait]
impl MediaPipeline for FfmpegPipeline {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn run(
        &self,
        job: FileJob,
        events: Option<mpsc::UnboundedSender<PipelineEvent>>,
        cancel: CancellationToken,
    ) -> Result<PipelineResult, TranscodeError> {
        let started = Instant::now();
        let settings = job.settings.as_ref();
        check_paths(&job.input, &job.output, settings.overwrite)?;

        if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let duration = self.source_duration(&job).await;
        let plan = self.synthesizer.synthesize(
            settings,
            &SynthesisRequest {
                input: &job.input,
                output: &job.output,
                media_type: job.media_type,
                duration,
            },
        )?;

        // Encoder time= counts from the trim start.
        let output_duration = settings.output_duration(duration);
        let sink = EventSink::new(events);
        self.supervisor
            .run(
                &self.tools.ffmpeg_path,
                &plan.args,
                &job.output,
                output_duration,
                &sink,
                &cancel,
            )
            .await?;

        let thumbnails = match (job.media_type, &settings.thumbnails) {
            (MediaType::Video, Some(spec)) => Some(spec),
            (_, Some(_)) => {
                debug!("Thumbnails only apply to video, skipping for {:?}", job.input);
                None
            }
            _ => None,
        };
        let post = self
            .post
            .run(
                &job.output,
                thumbnails,
                output_duration,
                &cancel,
            )
            .await;

        let mut degradations = plan.degradations.clone();
        degradations.extend(post.degradations);

        let result = PipelineResult {
            command: command_line(&self.tools.ffmpeg_path, &plan.args),
            input_path: job.input,
            output_path: job.output,
            media_type: job.media_type,
            metadata: post.metadata,
            thumbnails: post.thumbnails,
            degradations,
            events_emitted: sink.emitted(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Finished {:?} in {}ms ({} degradations)",
            result.output_path,
            result.elapsed_ms,
            result.degradations.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Settings, WatermarkSpec};

    #[test]
    fn test_check_paths_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_paths(&dir.path().join("nope.mp4"), &dir.path().join("o.mp4"), false)
            .unwrap_err();
        assert!(matches!(err, TranscodeError::NotFound { .. }));
    }

    #[test]
    fn test_check_paths_conflict_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        let output = dir.path().join("out.mp4");
        std::fs::write(&input, b"in").unwrap();
        std::fs::write(&output, b"old").unwrap();

        let err = check_paths(&input, &output, false).unwrap_err();
        assert!(matches!(err, TranscodeError::Conflict { .. }));
        assert!(check_paths(&input, &output, true).is_ok());
    }

    #[test]
    fn test_check_paths_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"in").unwrap();
        let aliased = dir.path().join(".").join("in.mp4");

        let err = check_paths(&input, &aliased, true).unwrap_err();
        assert!(matches!(err, TranscodeError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_empty_watermark_fails_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"in").unwrap();

        let mut watermark = WatermarkSpec::text("x");
        watermark.text = None;
        let settings = Settings {
            watermark: Some(watermark),
            ..Default::default()
        };

        // Tools that do not exist: reaching the spawn would be a launch error.
        let pipeline = FfmpegPipeline::new(
            ToolsConfig::with_paths("/no/ffmpeg", "/no/ffprobe").with_temp_dir(dir.path()),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let err = pipeline
            .run(
                FileJob {
                    input,
                    output: dir.path().join("out.mp4"),
                    media_type: MediaType::Video,
                    settings: Arc::new(settings),
                },
                Some(tx),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TranscodeError::Validation { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_encoder_is_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp3");
        std::fs::write(&input, b"in").unwrap();

        let pipeline = FfmpegPipeline::new(
            ToolsConfig::with_paths("/no/ffmpeg", "/no/ffprobe").with_temp_dir(dir.path()),
        );
        let err = pipeline
            .run(
                FileJob {
                    input,
                    output: dir.path().join("out.mp3"),
                    media_type: MediaType::Audio,
                    settings: Arc::new(Settings::default()),
                },
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_launch_failure());
    }
}
