//! Single-frame captures from a finished output.

use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Degradation, DegradationKind, TranscodeError};
use crate::options::{format_secs, ThumbnailFailurePolicy, ThumbnailSpec};
use crate::supervisor::{EventSink, ProcessSupervisor};

/// Result of a thumbnail pass. Never an error: problems become a degradation.
#[derive(Debug, Default)]
pub struct ThumbnailOutcome {
    pub paths: Vec<PathBuf>,
    pub degradation: Option<Degradation>,
}

/// Captures thumbnails with one ffmpeg run per instant.
#[derive(Debug, Clone)]
pub struct ThumbnailGenerator {
    ffmpeg_path: PathBuf,
    supervisor: ProcessSupervisor,
}

impl ThumbnailGenerator {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, supervisor: ProcessSupervisor) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            supervisor,
        }
    }

    /// Arguments for one capture at `at` seconds.
    pub fn capture_args(spec: &ThumbnailSpec, source: &Path, at: f64, target: &Path) -> Vec<String> {
        let mut args = vec![
            "-ss".to_string(),
            format_secs(at),
            "-i".to_string(),
            source.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
        ];
        if let Some(width) = spec.width {
            args.extend(["-vf".to_string(), format!("scale={}:-2", width)]);
        }
        args.extend(["-y".to_string(), target.to_string_lossy().to_string()]);
        args
    }

    /// Captures every requested thumbnail of `source` next to it.
    ///
    /// `duration` is only needed in interval mode.
    pub async fn generate(
        &self,
        spec: &ThumbnailSpec,
        source: &Path,
        duration: Option<f64>,
        cancel: &CancellationToken,
    ) -> ThumbnailOutcome {
        let Some(instants) = spec.instants(duration) else {
            warn!("Duration of {:?} unknown, skipping thumbnails", source);
            return ThumbnailOutcome {
                paths: Vec::new(),
                degradation: Some(Degradation::new(
                    DegradationKind::Thumbnails,
                    "thumbnails need a known duration in interval mode",
                )),
            };
        };

        let dir = source.parent().unwrap_or_else(|| Path::new("."));
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());

        let mut paths = Vec::with_capacity(instants.len());
        let mut failures = Vec::new();

        for (i, at) in instants.iter().enumerate() {
            let target = dir.join(spec.file_name(&stem, i + 1, instants.len()));
            match self.capture(spec, source, *at, &target, cancel).await {
                Ok(()) => {
                    debug!("Captured thumbnail {:?} at {}s", target, at);
                    paths.push(target);
                }
                Err(e) => {
                    warn!("Thumbnail at {}s failed: {}", format_secs(*at), e);
                    failures.push(format!("{}s: {}", format_secs(*at), e));
                    if spec.on_failure == ThumbnailFailurePolicy::Abort
                        || matches!(e, TranscodeError::Cancelled)
                    {
                        return ThumbnailOutcome {
                            paths: Vec::new(),
                            degradation: Some(Degradation::new(
                                DegradationKind::Thumbnails,
                                format!("thumbnail generation aborted at {}", failures[0]),
                            )),
                        };
                    }
                }
            }
        }

        info!("Generated {} thumbnails for {:?}", paths.len(), source);
        let degradation = (!failures.is_empty()).then(|| {
            Degradation::new(
                DegradationKind::Thumbnails,
                format!(
                    "{} of {} thumbnails failed ({})",
                    failures.len(),
                    instants.len(),
                    failures.join("; ")
                ),
            )
        });
        ThumbnailOutcome { paths, degradation }
    }

    async fn capture(
        &self,
        spec: &ThumbnailSpec,
        source: &Path,
        at: f64,
        target: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), TranscodeError> {
        let args = Self::capture_args(spec, source, at, target);
        self.supervisor
            .run(
                &self.ffmpeg_path,
                &args,
                target,
                None,
                &EventSink::detached(),
                cancel,
            )
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Timestamp;

    #[test]
    fn test_capture_args() {
        let spec = ThumbnailSpec {
            width: Some(320),
            ..ThumbnailSpec::count(3)
        };
        let args = ThumbnailGenerator::capture_args(
            &spec,
            Path::new("/out/clip.mp4"),
            2.5,
            Path::new("/out/clip_thumb_1.jpg"),
        );
        assert_eq!(
            args,
            vec![
                "-ss",
                "2.5",
                "-i",
                "/out/clip.mp4",
                "-frames:v",
                "1",
                "-vf",
                "scale=320:-2",
                "-y",
                "/out/clip_thumb_1.jpg"
            ]
        );
    }

    #[tokio::test]
    async fn test_interval_mode_without_duration_degrades() {
        let generator = ThumbnailGenerator::new("ffmpeg", ProcessSupervisor::default());
        let outcome = generator
            .generate(
                &ThumbnailSpec::count(3),
                Path::new("/out/clip.mp4"),
                None,
                &CancellationToken::new(),
            )
            .await;
        assert!(outcome.paths.is_empty());
        assert_eq!(
            outcome.degradation.unwrap().kind,
            DegradationKind::Thumbnails
        );
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Writes a fake ffmpeg that creates its last argument unless the
        /// seek position is "2".
        fn fake_ffmpeg(dir: &Path) -> PathBuf {
            let path = dir.join("fake-ffmpeg");
            std::fs::write(
                &path,
                "#!/bin/sh\n\
                 if [ \"$2\" = \"2\" ]; then echo 'seek failed' >&2; exit 1; fi\n\
                 for last; do :; done\n\
                 touch \"$last\"\n",
            )
            .unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn spec(policy: ThumbnailFailurePolicy) -> ThumbnailSpec {
            ThumbnailSpec::at(vec![Timestamp(1.0), Timestamp(2.0), Timestamp(3.0)])
                .with_policy(policy)
        }

        #[tokio::test]
        async fn test_abort_policy_drops_everything() {
            let dir = tempfile::tempdir().unwrap();
            let generator =
                ThumbnailGenerator::new(fake_ffmpeg(dir.path()), ProcessSupervisor::default());
            let source = dir.path().join("clip.mp4");
            std::fs::write(&source, b"mp4").unwrap();

            let outcome = generator
                .generate(
                    &spec(ThumbnailFailurePolicy::Abort),
                    &source,
                    None,
                    &CancellationToken::new(),
                )
                .await;
            assert!(outcome.paths.is_empty());
            assert!(outcome.degradation.unwrap().message.contains("aborted"));
            assert!(!dir.path().join("clip_thumb_3.jpg").exists());
        }

        #[tokio::test]
        async fn test_keep_partial_policy() {
            let dir = tempfile::tempdir().unwrap();
            let generator =
                ThumbnailGenerator::new(fake_ffmpeg(dir.path()), ProcessSupervisor::default());
            let source = dir.path().join("clip.mp4");
            std::fs::write(&source, b"mp4").unwrap();

            let outcome = generator
                .generate(
                    &spec(ThumbnailFailurePolicy::KeepPartial),
                    &source,
                    None,
                    &CancellationToken::new(),
                )
                .await;
            assert_eq!(
                outcome.paths,
                vec![
                    dir.path().join("clip_thumb_1.jpg"),
                    dir.path().join("clip_thumb_3.jpg")
                ]
            );
            assert!(outcome.degradation.unwrap().message.starts_with("1 of 3"));
        }

        #[tokio::test]
        async fn test_interval_mode_captures_all() {
            let dir = tempfile::tempdir().unwrap();
            let generator =
                ThumbnailGenerator::new(fake_ffmpeg(dir.path()), ProcessSupervisor::default());
            let source = dir.path().join("clip.mp4");
            std::fs::write(&source, b"mp4").unwrap();

            // 12s / (3 + 1) = 3, 6, 9: none of them hits the failing instant.
            let outcome = generator
                .generate(&ThumbnailSpec::count(3), &source, Some(12.0), &CancellationToken::new())
                .await;
            assert_eq!(outcome.paths.len(), 3);
            assert!(outcome.degradation.is_none());
            assert!(outcome.paths.iter().all(|p| p.exists()));
        }

        #[tokio::test]
        async fn test_fixed_pattern_still_yields_distinct_files() {
            let dir = tempfile::tempdir().unwrap();
            let generator =
                ThumbnailGenerator::new(fake_ffmpeg(dir.path()), ProcessSupervisor::default());
            let source = dir.path().join("clip.mp4");
            std::fs::write(&source, b"mp4").unwrap();
            let spec = ThumbnailSpec {
                filename_pattern: "cover".to_string(),
                ..ThumbnailSpec::at(vec![Timestamp(1.0), Timestamp(3.0)])
            };

            let outcome = generator
                .generate(&spec, &source, None, &CancellationToken::new())
                .await;
            assert_eq!(
                outcome.paths,
                vec![dir.path().join("cover_1.jpg"), dir.path().join("cover_2.jpg")]
            );
            assert!(outcome.paths.iter().all(|p| p.exists()));
        }
    }
}
