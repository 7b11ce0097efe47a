//! Types for the options module.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// A position in seconds.
///
/// Deserializes from a number (`12.5`) or a clock string (`"00:01:02.50"`,
/// `"1:02.5"`, `"62.5"`).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Timestamp(pub f64);

impl Timestamp {
    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> f64 {
        self.0
    }

    /// Parses `[[H:]M:]S[.frac]`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() > 3 {
            return None;
        }
        let mut secs = 0.0;
        for part in &parts {
            let value: f64 = part.trim().parse().ok()?;
            if value < 0.0 {
                return None;
            }
            secs = secs * 60.0 + value;
        }
        Some(Self(secs))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_secs(self.0))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Secs(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) if secs >= 0.0 => Ok(Self(secs)),
            Raw::Secs(secs) => Err(serde::de::Error::custom(format!(
                "timestamp cannot be negative: {}",
                secs
            ))),
            Raw::Text(text) => Self::parse(&text).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid timestamp: {:?}", text))
            }),
        }
    }
}

/// Formats seconds the way ffmpeg accepts them: up to three decimals,
/// trailing zeros stripped.
pub fn format_secs(secs: f64) -> String {
    let formatted = format!("{:.3}", secs);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Where a watermark is anchored on the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

/// Watermark request: either an image overlay or rendered text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkSpec {
    /// Image to overlay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
    /// Text to draw (used when no image is given).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub position: Anchor,
    /// 0.0 (invisible) to 1.0 (opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    /// Distance from the anchored edges, in pixels.
    #[serde(default = "default_margin")]
    pub margin: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_file: Option<PathBuf>,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_font_color")]
    pub font_color: String,
    /// Draws a box behind the text when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_color: Option<String>,
}

fn default_opacity() -> f64 {
    1.0
}

fn default_margin() -> u32 {
    10
}

fn default_font_size() -> u32 {
    24
}

fn default_font_color() -> String {
    "white".to_string()
}

impl WatermarkSpec {
    /// Image watermark with default placement.
    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self {
            image: Some(path.into()),
            ..Self::empty()
        }
    }

    /// Text watermark with default placement.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::empty()
        }
    }

    fn empty() -> Self {
        Self {
            image: None,
            text: None,
            position: Anchor::default(),
            opacity: default_opacity(),
            margin: default_margin(),
            font_file: None,
            font_size: default_font_size(),
            font_color: default_font_color(),
            box_color: None,
        }
    }

    pub fn with_position(mut self, position: Anchor) -> Self {
        self.position = position;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = margin;
        self
    }
}

/// Section of the input to keep.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrimSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Timestamp>,
    /// Absolute position in the source media, not an offset from `start`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Timestamp>,
}

impl TrimSpec {
    /// Length of the kept section, when an end bound is set.
    pub fn kept_duration(&self) -> Option<f64> {
        let end = self.end?.as_secs();
        let start = self.start.map(|s| s.as_secs()).unwrap_or(0.0);
        Some(end - start)
    }
}

/// Rectangle to keep, in source pixels. Centered when `x`/`y` are unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CropSpec {
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<u32>,
}

impl CropSpec {
    pub fn filter(&self) -> String {
        match (self.x, self.y) {
            (None, None) => format!("crop={}:{}", self.width, self.height),
            (x, y) => format!(
                "crop={}:{}:{}:{}",
                self.width,
                self.height,
                x.unwrap_or(0),
                y.unwrap_or(0)
            ),
        }
    }
}

/// Audio effects, applied in a fixed order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioEffects {
    #[serde(default)]
    pub normalize: bool,
    /// Noise reduction strength in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_reduction: Option<f64>,
    /// Fade-in length in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_in: Option<f64>,
    /// Fade-out length in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_out: Option<f64>,
    /// Volume multiplier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl AudioEffects {
    pub fn is_empty(&self) -> bool {
        !self.normalize
            && self.noise_reduction.is_none()
            && self.fade_in.is_none()
            && self.fade_out.is_none()
            && self.volume.is_none()
    }
}

/// What to do when one thumbnail capture fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailFailurePolicy {
    /// Drop every thumbnail as soon as one capture fails.
    #[default]
    Abort,
    /// Keep the captures that succeeded.
    KeepPartial,
}

/// Thumbnail request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailSpec {
    /// Evenly spaced captures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Explicit capture positions; takes precedence over `count`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timestamps: Vec<Timestamp>,
    #[serde(default = "default_thumbnail_format")]
    pub format: String,
    /// Supports `{name}` (output stem) and `{index}` (1-based).
    #[serde(default = "default_filename_pattern")]
    pub filename_pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default)]
    pub on_failure: ThumbnailFailurePolicy,
}

fn default_thumbnail_format() -> String {
    "jpg".to_string()
}

fn default_filename_pattern() -> String {
    "{name}_thumb_{index}".to_string()
}

impl ThumbnailSpec {
    pub fn count(count: u32) -> Self {
        Self {
            count: Some(count),
            ..Self::empty()
        }
    }

    pub fn at(timestamps: Vec<Timestamp>) -> Self {
        Self {
            timestamps,
            ..Self::empty()
        }
    }

    fn empty() -> Self {
        Self {
            count: None,
            timestamps: Vec::new(),
            format: default_thumbnail_format(),
            filename_pattern: default_filename_pattern(),
            width: None,
            on_failure: ThumbnailFailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ThumbnailFailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Capture instants in seconds.
    ///
    /// Explicit timestamps are returned verbatim. Interval mode spaces `N`
    /// captures at `duration / (N + 1) * i` and needs a known duration.
    pub fn instants(&self, duration: Option<f64>) -> Option<Vec<f64>> {
        if !self.timestamps.is_empty() {
            return Some(self.timestamps.iter().map(|t| t.as_secs()).collect());
        }
        let count = self.count?;
        let duration = duration.filter(|d| *d > 0.0)?;
        let step = duration / (count as f64 + 1.0);
        Some((1..=count).map(|i| step * i as f64).collect())
    }

    /// File name (without directory) of the `index`-th of `total`
    /// thumbnails, 1-based.
    ///
    /// A pattern without `{index}` gets `_{index}` appended when more than
    /// one capture is requested, so captures never share a file.
    pub fn file_name(&self, stem: &str, index: usize, total: usize) -> String {
        let mut base = self
            .filename_pattern
            .replace("{name}", stem)
            .replace("{index}", &index.to_string());
        if total > 1 && !self.filename_pattern.contains("{index}") {
            base = format!("{}_{}", base, index);
        }
        format!("{}.{}", base, self.format)
    }
}

/// Fully resolved per-file settings.
///
/// Produced once by the resolver and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub video_codec: String,
    pub audio_codec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_bitrate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_bitrate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    /// Applied before scaling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropSpec>,
    /// Encoder speed/quality trade-off (`ultrafast` .. `veryslow`).
    pub speed_preset: String,
    pub profile: String,
    pub level: String,
    pub pixel_format: String,
    /// Container muxer flags (`-movflags`).
    pub container_flags: String,
    /// 0 lets the encoder decide.
    pub threads: u32,
    /// `-q:v` for image outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_quality: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<WatermarkSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<TrimSpec>,
    #[serde(default)]
    pub audio: AudioEffects,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnails: Option<ThumbnailSpec>,
    /// Extra raw arguments, shell-quoted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_args: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            video_bitrate: None,
            audio_bitrate: Some("128k".to_string()),
            width: None,
            height: None,
            fps: None,
            crop: None,
            speed_preset: "medium".to_string(),
            profile: "high".to_string(),
            level: "4.1".to_string(),
            pixel_format: "yuv420p".to_string(),
            container_flags: "+faststart".to_string(),
            threads: 0,
            image_quality: None,
            watermark: None,
            trim: None,
            audio: AudioEffects::default(),
            thumbnails: None,
            custom_args: None,
            overwrite: false,
        }
    }
}

impl Settings {
    /// Length of the output timeline given the source's probed duration.
    ///
    /// A trim with an end bound fixes the length; otherwise it is whatever
    /// remains of the source after the trim start.
    pub fn output_duration(&self, source_duration: Option<f64>) -> Option<f64> {
        let Some(trim) = &self.trim else {
            return source_duration;
        };
        let start = trim.start.map(|s| s.as_secs()).unwrap_or(0.0);
        let remaining = source_duration.map(|d| (d - start).max(0.0));
        match (trim.kept_duration(), remaining) {
            (Some(kept), Some(remaining)) => Some(kept.min(remaining)),
            (Some(kept), None) => Some(kept),
            (None, remaining) => remaining,
        }
    }
}

/// Partial settings: caller overrides, configured defaults and preset bodies.
///
/// Nested specs (watermark, trim, audio, thumbnails) replace the previous
/// value wholesale.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsOverrides {
    /// Named profile to apply before these overrides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_bitrate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_bitrate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_flags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_quality: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<WatermarkSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim: Option<TrimSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioEffects>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnails: Option<ThumbnailSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_args: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
}

impl SettingsOverrides {
    /// Overrides that only select a preset.
    pub fn preset(name: impl Into<String>) -> Self {
        Self {
            preset: Some(name.into()),
            ..Default::default()
        }
    }

    /// Writes every field that is set onto `settings`.
    pub fn apply_to(&self, settings: &mut Settings) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        fn set_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        set(&mut settings.video_codec, &self.video_codec);
        set(&mut settings.audio_codec, &self.audio_codec);
        set_opt(&mut settings.video_bitrate, &self.video_bitrate);
        set_opt(&mut settings.audio_bitrate, &self.audio_bitrate);
        set_opt(&mut settings.width, &self.width);
        set_opt(&mut settings.height, &self.height);
        set_opt(&mut settings.fps, &self.fps);
        set_opt(&mut settings.crop, &self.crop);
        set(&mut settings.speed_preset, &self.speed_preset);
        set(&mut settings.profile, &self.profile);
        set(&mut settings.level, &self.level);
        set(&mut settings.pixel_format, &self.pixel_format);
        set(&mut settings.container_flags, &self.container_flags);
        set(&mut settings.threads, &self.threads);
        set_opt(&mut settings.image_quality, &self.image_quality);
        set_opt(&mut settings.watermark, &self.watermark);
        set_opt(&mut settings.trim, &self.trim);
        set(&mut settings.audio, &self.audio);
        set_opt(&mut settings.thumbnails, &self.thumbnails);
        set_opt(&mut settings.custom_args, &self.custom_args);
        set(&mut settings.overwrite, &self.overwrite);
    }
}
