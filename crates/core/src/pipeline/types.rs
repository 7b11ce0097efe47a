//! Types for single-file pipelines.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Degradation;
use crate::options::Settings;
use crate::postprocess::MediaInfo;
use crate::scanner::MediaType;

/// One file to transcode.
#[derive(Debug, Clone)]
pub struct FileJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub media_type: MediaType,
    /// Shared read-only across every job of a batch.
    pub settings: Arc<Settings>,
}

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub media_type: MediaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MediaInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thumbnails: Vec<PathBuf>,
    /// The encoder command line, quoted.
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
    pub events_emitted: u64,
    pub elapsed_ms: u64,
}

impl PipelineResult {
    /// Whether some requested feature was skipped or reduced.
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}
