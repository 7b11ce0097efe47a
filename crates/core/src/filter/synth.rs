//! Compiles resolved settings into an ffmpeg argument vector.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::args::{join_args, split_args};
use super::audio::audio_filters;
use super::codecs::is_lossless_audio;
use super::fonts::{FontLocator, SystemFontLocator};
use super::scratch::ScratchDir;
use super::watermark::{overlay_position, plan_watermark, WatermarkPlan};
use crate::error::{Degradation, DegradationKind, TranscodeError};
use crate::options::{format_secs, Settings};
use crate::scanner::MediaType;

/// Filter expressions in the order they will be applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub video: Vec<String>,
    pub audio: Vec<String>,
    /// Set when a second input or named pads force `-filter_complex`.
    pub complex: bool,
    /// The full graph, when `complex` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<String>,
}

/// What to compile.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub media_type: MediaType,
    /// Probed duration of the input, in seconds.
    pub duration: Option<f64>,
}

/// Everything needed to launch one encode.
///
/// Owns the scratch directory backing any temporary file the arguments refer
/// to, so the plan must outlive the process it launches.
#[derive(Debug)]
pub struct CommandPlan {
    pub args: Vec<String>,
    pub filters: FilterSpec,
    pub degradations: Vec<Degradation>,
    scratch: ScratchDir,
}

impl CommandPlan {
    /// The full command line, quoted for display.
    pub fn command_line(&self, program: &Path) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(program.to_string_lossy().to_string());
        parts.extend(self.args.iter().cloned());
        join_args(&parts)
    }

    /// Scratch directory, if synthesis needed one.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.path()
    }
}

/// Deterministic compiler from [`Settings`] to a [`CommandPlan`].
#[derive(Debug, Clone)]
pub struct FilterGraphSynthesizer {
    fonts: Arc<dyn FontLocator>,
    scratch_root: PathBuf,
}

impl Default for FilterGraphSynthesizer {
    fn default() -> Self {
        Self::new(
            Arc::new(SystemFontLocator::default()),
            std::env::temp_dir().join("clipmill"),
        )
    }
}

impl FilterGraphSynthesizer {
    pub fn new(fonts: Arc<dyn FontLocator>, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            fonts,
            scratch_root: scratch_root.into(),
        }
    }

    /// Builds the argument vector for one file.
    ///
    /// Only settings that cannot be rendered at all are errors; skipped
    /// features are reported in [`CommandPlan::degradations`].
    pub fn synthesize(
        &self,
        settings: &Settings,
        request: &SynthesisRequest<'_>,
    ) -> Result<CommandPlan, TranscodeError> {
        let mut scratch = ScratchDir::new(&self.scratch_root);
        let mut degradations = Vec::new();

        let (args, filters) = match request.media_type {
            MediaType::Video => {
                self.video_args(settings, request, &mut scratch, &mut degradations)?
            }
            MediaType::Audio => audio_args(settings, request, &mut degradations),
            MediaType::Image => {
                self.image_args(settings, request, &mut scratch, &mut degradations)?
            }
        };

        debug!("Synthesized {} args for {:?}", args.len(), request.input);
        Ok(CommandPlan {
            args,
            filters,
            degradations,
            scratch,
        })
    }

    fn video_args(
        &self,
        settings: &Settings,
        request: &SynthesisRequest<'_>,
        scratch: &mut ScratchDir,
        degradations: &mut Vec<Degradation>,
    ) -> Result<(Vec<String>, FilterSpec), TranscodeError> {
        let mut args = Vec::new();

        push_trim_start(settings, &mut args);
        args.extend(["-i".to_string(), path_arg(request.input)]);

        let watermark = match &settings.watermark {
            Some(spec) => plan_watermark(spec, self.fonts.as_ref(), scratch, degradations)?,
            None => None,
        };
        if let Some(WatermarkPlan::Image { path, .. }) = &watermark {
            args.extend(["-i".to_string(), path_arg(path)]);
        }

        push_trim_end(settings, &mut args);

        args.extend([
            "-c:v".to_string(),
            settings.video_codec.clone(),
            "-c:a".to_string(),
            settings.audio_codec.clone(),
        ]);
        if let Some(bitrate) = &settings.video_bitrate {
            args.extend(["-b:v".to_string(), bitrate.clone()]);
        }
        push_audio_bitrate(settings, &mut args);

        let mut filters = FilterSpec {
            video: geometry_filters(settings),
            ..Default::default()
        };
        filters.audio = audio_filters(
            &settings.audio,
            settings.output_duration(request.duration),
            degradations,
        );

        let copy_video = settings.video_codec == "copy";
        if copy_video && (!filters.video.is_empty() || watermark.is_some()) {
            return Err(TranscodeError::validation(
                "cropping, scaling and watermarks need re-encoding; video codec is 'copy'",
            ));
        }
        if settings.audio_codec == "copy" && !filters.audio.is_empty() {
            return Err(TranscodeError::validation(
                "audio effects need re-encoding; audio codec is 'copy'",
            ));
        }

        push_filters(watermark, &mut filters, &mut args, true);

        if let Some(fps) = settings.fps {
            args.extend(["-r".to_string(), format_secs(fps)]);
        }

        if !copy_video {
            args.extend([
                "-preset".to_string(),
                settings.speed_preset.clone(),
                "-profile:v".to_string(),
                settings.profile.clone(),
                "-level".to_string(),
                settings.level.clone(),
                "-pix_fmt".to_string(),
                settings.pixel_format.clone(),
            ]);
        }
        if !settings.container_flags.is_empty() {
            args.extend(["-movflags".to_string(), settings.container_flags.clone()]);
        }
        args.extend([
            "-threads".to_string(),
            settings.threads.to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
        ]);

        push_tail(settings, request.output, &mut args, degradations);
        Ok((args, filters))
    }

    fn image_args(
        &self,
        settings: &Settings,
        request: &SynthesisRequest<'_>,
        scratch: &mut ScratchDir,
        degradations: &mut Vec<Degradation>,
    ) -> Result<(Vec<String>, FilterSpec), TranscodeError> {
        let mut args = vec!["-i".to_string(), path_arg(request.input)];

        let watermark = match &settings.watermark {
            Some(spec) => plan_watermark(spec, self.fonts.as_ref(), scratch, degradations)?,
            None => None,
        };
        if let Some(WatermarkPlan::Image { path, .. }) = &watermark {
            args.extend(["-i".to_string(), path_arg(path)]);
        }

        let mut filters = FilterSpec {
            video: geometry_filters(settings),
            ..Default::default()
        };
        push_filters(watermark, &mut filters, &mut args, false);

        if let Some(quality) = settings.image_quality {
            args.extend(["-q:v".to_string(), quality.to_string()]);
        }
        args.extend([
            "-frames:v".to_string(),
            "1".to_string(),
            "-update".to_string(),
            "1".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
        ]);

        push_tail(settings, request.output, &mut args, degradations);
        Ok((args, filters))
    }
}

fn audio_args(
    settings: &Settings,
    request: &SynthesisRequest<'_>,
    degradations: &mut Vec<Degradation>,
) -> (Vec<String>, FilterSpec) {
    let mut args = Vec::new();

    push_trim_start(settings, &mut args);
    args.extend(["-i".to_string(), path_arg(request.input)]);
    push_trim_end(settings, &mut args);

    if settings.watermark.is_some() {
        debug!("Ignoring watermark for audio output {:?}", request.output);
    }

    args.extend([
        "-vn".to_string(),
        "-c:a".to_string(),
        settings.audio_codec.clone(),
    ]);
    push_audio_bitrate(settings, &mut args);

    let filters = FilterSpec {
        audio: audio_filters(
            &settings.audio,
            settings.output_duration(request.duration),
            degradations,
        ),
        ..Default::default()
    };
    if !filters.audio.is_empty() {
        args.extend(["-af".to_string(), filters.audio.join(",")]);
    }

    args.extend(["-progress".to_string(), "pipe:1".to_string()]);
    push_tail(settings, request.output, &mut args, degradations);
    (args, filters)
}

/// Crop, then scale.
fn geometry_filters(settings: &Settings) -> Vec<String> {
    settings
        .crop
        .map(|crop| crop.filter())
        .into_iter()
        .chain(scale_filter(settings.width, settings.height))
        .collect()
}

/// Exact, proportional or no scaling depending on which sides are set.
pub fn scale_filter(width: Option<u32>, height: Option<u32>) -> Option<String> {
    match (width, height) {
        (Some(w), Some(h)) => Some(format!("scale={}:{}", w, h)),
        (Some(w), None) => Some(format!("scale={}:-2", w)),
        (None, Some(h)) => Some(format!("scale=-2:{}", h)),
        (None, None) => None,
    }
}

/// Input seek, placed before `-i` so ffmpeg can seek fast.
fn push_trim_start(settings: &Settings, args: &mut Vec<String>) {
    if let Some(start) = settings.trim.and_then(|t| t.start) {
        args.extend(["-ss".to_string(), format_secs(start.as_secs())]);
    }
}

/// Output length, placed after every input declaration. The configured end
/// is an absolute source position, so it becomes `end - start`.
fn push_trim_end(settings: &Settings, args: &mut Vec<String>) {
    if let Some(length) = settings.trim.and_then(|t| t.kept_duration()) {
        args.extend(["-t".to_string(), format_secs(length)]);
    }
}

fn push_audio_bitrate(settings: &Settings, args: &mut Vec<String>) {
    if let Some(bitrate) = &settings.audio_bitrate {
        if !is_lossless_audio(&settings.audio_codec) {
            args.extend(["-b:a".to_string(), bitrate.clone()]);
        }
    }
}

/// Emits either linear `-vf`/`-af` chains or a complex graph with mapped pads.
fn push_filters(
    watermark: Option<WatermarkPlan>,
    filters: &mut FilterSpec,
    args: &mut Vec<String>,
    has_audio: bool,
) {
    match watermark {
        Some(plan) if plan.needs_complex_graph() => {
            let graph = complex_graph(&plan, filters, has_audio);
            args.extend([
                "-filter_complex".to_string(),
                graph.clone(),
                "-map".to_string(),
                "[vout]".to_string(),
            ]);
            if has_audio {
                let audio_map = if filters.audio.is_empty() {
                    "0:a?"
                } else {
                    "[aout]"
                };
                args.extend(["-map".to_string(), audio_map.to_string()]);
            }
            filters.complex = true;
            filters.graph = Some(graph);
        }
        plan => {
            if let Some(WatermarkPlan::Text { filter }) = plan {
                filters.video.push(filter);
            }
            if !filters.video.is_empty() {
                args.extend(["-vf".to_string(), filters.video.join(",")]);
            }
            if has_audio && !filters.audio.is_empty() {
                args.extend(["-af".to_string(), filters.audio.join(",")]);
            }
        }
    }
}

fn complex_graph(plan: &WatermarkPlan, filters: &mut FilterSpec, has_audio: bool) -> String {
    let mut chains = Vec::new();
    let mut base = "[0:v]".to_string();
    if !filters.video.is_empty() {
        chains.push(format!("[0:v]{}[base]", filters.video.join(",")));
        base = "[base]".to_string();
    }

    match plan {
        WatermarkPlan::Image {
            anchor,
            margin,
            opacity,
            ..
        } => {
            let mut mark = "[1:v]".to_string();
            if *opacity < 1.0 {
                let blend = format!("format=rgba,colorchannelmixer=aa={}", format_secs(*opacity));
                chains.push(format!("[1:v]{}[mark]", blend));
                filters.video.push(blend);
                mark = "[mark]".to_string();
            }
            let (x, y) = overlay_position(*anchor, *margin);
            let overlay = format!("overlay={}:{}", x, y);
            chains.push(format!("{}{}{}[vout]", base, mark, overlay));
            filters.video.push(overlay);
        }
        WatermarkPlan::Rectangle {
            source,
            anchor,
            margin,
        } => {
            chains.push(format!("{}[mark]", source));
            filters.video.push(source.clone());
            let (x, y) = overlay_position(*anchor, *margin);
            let overlay = format!("overlay={}:{}:shortest=1", x, y);
            chains.push(format!("{}[mark]{}[vout]", base, overlay));
            filters.video.push(overlay);
        }
        WatermarkPlan::Text { filter } => {
            chains.push(format!("{}{}[vout]", base, filter));
            filters.video.push(filter.clone());
        }
    }

    if has_audio && !filters.audio.is_empty() {
        chains.push(format!("[0:a]{}[aout]", filters.audio.join(",")));
    }

    chains.join(";")
}

/// Overwrite flag, custom arguments, then the output path.
fn push_tail(
    settings: &Settings,
    output: &Path,
    args: &mut Vec<String>,
    degradations: &mut Vec<Degradation>,
) {
    args.push(if settings.overwrite { "-y" } else { "-n" }.to_string());

    if let Some(raw) = settings.custom_args.as_deref() {
        match split_args(raw) {
            Ok(extra) => args.extend(extra),
            Err(e) => {
                warn!("Ignoring malformed custom arguments {:?}: {}", raw, e);
                degradations.push(Degradation::new(
                    DegradationKind::CustomArgs,
                    format!("custom arguments ignored: {}", e),
                ));
            }
        }
    }

    args.push(path_arg(output));
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
