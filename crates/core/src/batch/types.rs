//! Types for batch runs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{Degradation, ErrorKind, TranscodeError};
use crate::filter::audio_extension;
use crate::pipeline::PipelineResult;
use crate::postprocess::MediaInfo;
use crate::scanner::MediaType;

/// How output paths are derived from input paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputRules {
    /// Directory for outputs; `None` writes next to each input.
    pub output_dir: Option<PathBuf>,
    pub prefix: String,
    pub suffix: String,
    /// Forced extension, without the dot.
    pub extension: Option<String>,
}

impl Default for OutputRules {
    fn default() -> Self {
        Self {
            output_dir: None,
            prefix: String::new(),
            suffix: "_converted".to_string(),
            extension: None,
        }
    }
}

impl OutputRules {
    /// `<dir>/<prefix><stem><suffix>.<ext>`.
    ///
    /// Without an explicit extension: video becomes `mp4`, audio follows
    /// `audio_codec`, images keep their own extension.
    pub fn output_path(&self, input: &Path, media_type: MediaType, audio_codec: &str) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());

        let extension = match &self.extension {
            Some(ext) => ext.trim_start_matches('.').to_string(),
            None => match media_type {
                MediaType::Video => "mp4".to_string(),
                MediaType::Audio => audio_extension(audio_codec).to_string(),
                MediaType::Image => input
                    .extension()
                    .map(|e| e.to_string_lossy().to_ascii_lowercase())
                    .unwrap_or_else(|| "png".to_string()),
            },
        };

        let dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        dir.join(format!("{}{}{}.{}", self.prefix, stem, self.suffix, extension))
    }
}

/// Lifecycle of one file in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// One input file and where it is in its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTask {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    pub status: TaskStatus,
    pub index: usize,
}

impl FileTask {
    pub fn new(path: PathBuf, index: usize) -> Self {
        Self {
            path,
            media_type: None,
            status: TaskStatus::Queued,
            index,
        }
    }
}

/// A file that did not produce an output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub error: String,
    /// Tool stderr, when the tool ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

impl FailedFile {
    pub fn new(path: PathBuf, error: &TranscodeError) -> Self {
        Self {
            path,
            kind: error.kind(),
            error: error.to_string(),
            diagnostics: error.diagnostics().map(str::to_string),
        }
    }
}

/// Aggregate outcome of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub total: usize,
    pub completed: usize,
    pub successful: Vec<PipelineResult>,
    pub failed: Vec<FailedFile>,
    /// Final state of every task, in input order.
    pub tasks: Vec<FileTask>,
}

impl BatchResult {
    pub(crate) fn new(batch_id: Uuid, tasks: Vec<FileTask>) -> Self {
        Self {
            batch_id,
            total: tasks.len(),
            completed: 0,
            successful: Vec::new(),
            failed: Vec::new(),
            tasks,
        }
    }

    /// Successful outputs that skipped or reduced some requested feature.
    pub fn degraded(&self) -> impl Iterator<Item = &PipelineResult> {
        self.successful.iter().filter(|r| r.is_degraded())
    }

    /// Successful outputs with nothing degraded.
    pub fn clean(&self) -> impl Iterator<Item = &PipelineResult> {
        self.successful.iter().filter(|r| !r.is_degraded())
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Batch-level events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    Start {
        batch_id: Uuid,
        total: usize,
    },
    FileStart {
        file_path: PathBuf,
        output_path: PathBuf,
        media_type: MediaType,
        index: usize,
    },
    FileProgress {
        file_path: PathBuf,
        index: usize,
        percent: f64,
    },
    FileComplete {
        file_path: PathBuf,
        output_path: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<MediaInfo>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        degradations: Vec<Degradation>,
    },
    FileError {
        file_path: PathBuf,
        kind: ErrorKind,
        error: String,
    },
    Progress {
        completed: usize,
        total: usize,
        percent: f64,
    },
    Complete {
        result: BatchResult,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_defaults() {
        let rules = OutputRules::default();
        assert_eq!(
            rules.output_path(Path::new("/media/clip.mov"), MediaType::Video, "aac"),
            PathBuf::from("/media/clip_converted.mp4")
        );
        assert_eq!(
            rules.output_path(Path::new("/media/talk.wav"), MediaType::Audio, "libmp3lame"),
            PathBuf::from("/media/talk_converted.mp3")
        );
        assert_eq!(
            rules.output_path(Path::new("/media/pic.JPG"), MediaType::Image, "aac"),
            PathBuf::from("/media/pic_converted.jpg")
        );
    }

    #[test]
    fn test_output_path_with_rules() {
        let rules = OutputRules {
            output_dir: Some(PathBuf::from("/out")),
            prefix: "ig_".to_string(),
            suffix: String::new(),
            extension: Some(".webm".to_string()),
        };
        assert_eq!(
            rules.output_path(Path::new("/media/clip.mov"), MediaType::Video, "aac"),
            PathBuf::from("/out/ig_clip.webm")
        );
    }

    #[test]
    fn test_audio_extension_follows_codec() {
        let rules = OutputRules::default();
        let out = rules.output_path(Path::new("a.flac"), MediaType::Audio, "aac");
        assert_eq!(out, PathBuf::from("a_converted.m4a"));
        let out = rules.output_path(Path::new("a.wav"), MediaType::Audio, "libopus");
        assert_eq!(out, PathBuf::from("a_converted.opus"));
    }

    #[test]
    fn test_failed_file_from_error() {
        let err = TranscodeError::execution_failed("ffmpeg exited with code 1", Some(1), "boom");
        let failed = FailedFile::new(PathBuf::from("x.mp4"), &err);
        assert_eq!(failed.kind, ErrorKind::ToolExecution);
        assert_eq!(failed.diagnostics.as_deref(), Some("boom"));
    }

    #[test]
    fn test_batch_event_serialization() {
        let event = BatchEvent::Progress {
            completed: 1,
            total: 4,
            percent: 25.0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["percent"], 25.0);
    }
}
