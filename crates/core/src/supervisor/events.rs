//! Events emitted while a pipeline runs.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

use super::progress::ProgressSample;

/// Which output stream a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Lifecycle, progress and log events of one pipeline run.
///
/// The run's outcome is the `Result` returned by the pipeline itself, so
/// there is no terminal event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// The tool was spawned.
    Start { command: String, args: Vec<String> },
    /// A progress sample, with the input duration when known.
    Progress {
        sample: ProgressSample,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    /// One line of tool output.
    Log { stream: LogStream, line: String },
}

/// Sending half of a pipeline's event channel.
///
/// Sends never fail the pipeline: once the receiver is gone events are
/// silently discarded.
#[derive(Debug, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
    emitted: AtomicU64,
}

impl EventSink {
    pub fn new(tx: Option<mpsc::UnboundedSender<PipelineEvent>>) -> Self {
        Self {
            tx,
            emitted: AtomicU64::new(0),
        }
    }

    /// A sink that only counts.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: PipelineEvent) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    /// Number of events emitted so far, delivered or not.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_counts_and_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(Some(tx));
        sink.emit(PipelineEvent::Log {
            stream: LogStream::Stderr,
            line: "hello".to_string(),
        });
        assert_eq!(sink.emitted(), 1);
        assert!(matches!(rx.try_recv().unwrap(), PipelineEvent::Log { .. }));
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sink = EventSink::new(Some(tx));
        sink.emit(PipelineEvent::Start {
            command: "ffmpeg".to_string(),
            args: vec![],
        });
        assert_eq!(sink.emitted(), 1);
    }

    #[test]
    fn test_event_serialization() {
        let event = PipelineEvent::Progress {
            sample: ProgressSample {
                frame: Some(10),
                ..Default::default()
            },
            duration: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["sample"]["frame"], 10);
        assert!(json.get("duration").is_none());
    }
}
