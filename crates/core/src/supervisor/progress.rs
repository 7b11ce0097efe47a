//! Progress extraction from ffmpeg's stats and `-progress` output.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

static FRAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"frame=\s*(\d+)").expect("valid regex"));
static FPS: Lazy<Regex> = Lazy::new(|| Regex::new(r"fps=\s*([\d.]+)").expect("valid regex"));
static TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=\s*(\d+):(\d+):([\d.]+)").expect("valid regex"));
static BITRATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"bitrate=\s*([\d.]+)\s*kbits/s").expect("valid regex"));
static SIZE_KB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)size=\s*(\d+)\s*[kK]i?B").expect("valid regex"));
static TOTAL_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"total_size=\s*(\d+)").expect("valid regex"));
static SPEED: Lazy<Regex> = Lazy::new(|| Regex::new(r"speed=\s*([\d.]+)x").expect("valid regex"));

/// Partial snapshot of encoder progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl ProgressSample {
    /// Extracts whatever progress fields `line` contains.
    ///
    /// Returns `None` when no field was found.
    pub fn parse(line: &str) -> Option<Self> {
        let sample = Self {
            frame: capture(&FRAME, line),
            fps: capture(&FPS, line),
            elapsed_secs: TIME.captures(line).and_then(|c| {
                let hours: f64 = c.get(1)?.as_str().parse().ok()?;
                let minutes: f64 = c.get(2)?.as_str().parse().ok()?;
                let seconds: f64 = c.get(3)?.as_str().parse().ok()?;
                Some(hours * 3600.0 + minutes * 60.0 + seconds)
            }),
            bitrate_kbps: capture(&BITRATE, line),
            size_bytes: capture::<u64>(&SIZE_KB, line)
                .map(|kb| kb * 1024)
                .or_else(|| capture(&TOTAL_SIZE, line)),
            speed: capture(&SPEED, line),
        };
        (!sample.is_empty()).then_some(sample)
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_none()
            && self.fps.is_none()
            && self.elapsed_secs.is_none()
            && self.bitrate_kbps.is_none()
            && self.size_bytes.is_none()
            && self.speed.is_none()
    }

    /// Completion percentage against `duration`, capped at 100.
    pub fn percent(&self, duration: Option<f64>) -> Option<f64> {
        let elapsed = self.elapsed_secs?;
        let duration = duration.filter(|d| *d > 0.0)?;
        Some((elapsed / duration * 100.0).clamp(0.0, 100.0))
    }
}

fn capture<T: std::str::FromStr>(re: &Regex, line: &str) -> Option<T> {
    re.captures(line)?.get(1)?.as_str().parse().ok()
}
