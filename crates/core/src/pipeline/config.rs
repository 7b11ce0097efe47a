//! External tool configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where the tools live and how long they may run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Parent of the per-invocation scratch directories.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Maximum runtime of one encode in seconds; 0 disables the limit.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum runtime of one ffprobe call in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("clipmill")
}

fn default_timeout() -> u64 {
    3600
}

fn default_probe_timeout() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            temp_dir: default_temp_dir(),
            timeout_secs: default_timeout(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl ToolsConfig {
    pub fn with_paths(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            ..Default::default()
        }
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Encode time limit, `None` when disabled.
    pub fn encode_timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }
}
