//! Best-effort steps that run after a successful encode.
//!
//! Nothing here fails the pipeline. A failed probe leaves the result without
//! metadata, failed thumbnails leave it without thumbnails, and both are
//! reported as [`Degradation`]s.

mod probe;
mod thumbnails;

pub use probe::{parse_probe_output, MediaInfo, Prober};
pub use thumbnails::{ThumbnailGenerator, ThumbnailOutcome};

use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{Degradation, DegradationKind};
use crate::options::ThumbnailSpec;

/// What the chain produced for one output.
#[derive(Debug, Default)]
pub struct PostProcessOutcome {
    pub metadata: Option<MediaInfo>,
    pub thumbnails: Vec<PathBuf>,
    pub degradations: Vec<Degradation>,
}

/// Metadata extraction followed by optional thumbnail capture.
#[derive(Debug, Clone)]
pub struct PostProcessingChain {
    prober: Prober,
    thumbnails: ThumbnailGenerator,
}

impl PostProcessingChain {
    pub fn new(prober: Prober, thumbnails: ThumbnailGenerator) -> Self {
        Self { prober, thumbnails }
    }

    /// Runs every step against `output`.
    ///
    /// `thumbnails` is only honoured by callers for video outputs.
    /// `fallback_duration` is used for interval thumbnails when the output
    /// itself could not be probed.
    pub async fn run(
        &self,
        output: &Path,
        thumbnails: Option<&ThumbnailSpec>,
        fallback_duration: Option<f64>,
        cancel: &CancellationToken,
    ) -> PostProcessOutcome {
        let mut outcome = PostProcessOutcome::default();

        match self.prober.probe(output).await {
            Ok(info) => outcome.metadata = Some(info),
            Err(e) => {
                warn!("Metadata extraction failed for {:?}: {}", output, e);
                outcome.degradations.push(Degradation::new(
                    DegradationKind::Metadata,
                    format!("metadata unavailable: {}", e),
                ));
            }
        }

        if let Some(spec) = thumbnails {
            let duration = outcome
                .metadata
                .as_ref()
                .and_then(|m| m.duration_secs)
                .or(fallback_duration);
            let result = self
                .thumbnails
                .generate(spec, output, duration, cancel)
                .await;
            outcome.thumbnails = result.paths;
            outcome.degradations.extend(result.degradation);
        }

        outcome
    }
}
