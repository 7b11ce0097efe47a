//! ffprobe invocation and output parsing.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::TranscodeError;

/// Container and stream facts about a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// First name of ffprobe's `format_name` list ("mov" for mp4, ...).
    pub container: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
}

impl MediaInfo {
    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    format_name: String,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: String,
    codec_name: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u8>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

/// Parses `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, TranscodeError> {
    let probe: ProbeOutput = serde_json::from_str(output)
        .map_err(|e| TranscodeError::probe_failed(format!("unparseable ffprobe output: {}", e)))?;

    let video = probe.streams.iter().find(|s| s.codec_type == "video");
    let audio = probe.streams.iter().find(|s| s.codec_type == "audio");

    Ok(MediaInfo {
        path: path.to_path_buf(),
        size_bytes: probe
            .format
            .size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        duration_secs: probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0),
        container: probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown")
            .to_string(),
        bitrate_kbps: probe
            .format
            .bit_rate
            .as_deref()
            .and_then(|b| b.parse::<u64>().ok())
            .map(|b| (b / 1000) as u32),
        video_codec: video.and_then(|s| s.codec_name.clone()),
        width: video.and_then(|s| s.width),
        height: video.and_then(|s| s.height),
        fps: video.and_then(|s| {
            s.avg_frame_rate
                .as_deref()
                .and_then(parse_rate)
                .or_else(|| s.r_frame_rate.as_deref().and_then(parse_rate))
        }),
        audio_codec: audio.and_then(|s| s.codec_name.clone()),
        sample_rate: audio
            .and_then(|s| s.sample_rate.as_deref())
            .and_then(|r| r.parse().ok()),
        channels: audio.and_then(|s| s.channels),
    })
}

/// Parses "30000/1001" or "25".
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.parse().ok()?,
    };
    (value > 0.0).then_some(value)
}

/// Runs ffprobe against files.
#[derive(Debug, Clone)]
pub struct Prober {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl Prober {
    pub fn new(ffprobe_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            timeout,
        }
    }

    pub async fn probe(&self, path: &Path) -> Result<MediaInfo, TranscodeError> {
        if !path.exists() {
            return Err(TranscodeError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let run = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = timeout(self.timeout, run)
            .await
            .map_err(|_| {
                TranscodeError::probe_failed(format!(
                    "ffprobe did not finish within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|source| TranscodeError::ToolLaunch {
                program: self.ffprobe_path.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TranscodeError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let info = parse_probe_output(path, &String::from_utf8_lossy(&output.stdout))?;
        debug!(
            "Probed {:?}: {} {:?}s",
            path, info.container, info.duration_secs
        );
        Ok(info)
    }
}
