//! Watermark planning: image overlays, drawn text, and the plain rectangle
//! used when no font can be found.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::fonts::FontLocator;
use super::scratch::ScratchDir;
use crate::error::{Degradation, DegradationKind, TranscodeError};
use crate::options::{format_secs, Anchor, WatermarkSpec};

/// Image paths containing this marker are skipped quietly when missing.
pub const INTENTIONALLY_MISSING_MARKER: &str = "__intentionally_missing__";

/// How a watermark will be rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum WatermarkPlan {
    /// Second input merged through the complex graph.
    Image {
        path: PathBuf,
        anchor: Anchor,
        margin: u32,
        opacity: f64,
    },
    /// Single `drawtext` expression appended to the linear chain.
    Text { filter: String },
    /// Generated color source merged through the complex graph.
    Rectangle {
        source: String,
        anchor: Anchor,
        margin: u32,
    },
}

impl WatermarkPlan {
    /// Whether this plan needs named pads in a multi-input graph.
    pub fn needs_complex_graph(&self) -> bool {
        matches!(self, Self::Image { .. } | Self::Rectangle { .. })
    }
}

/// Overlay offset expressions (`x`, `y`) for an anchor.
pub fn overlay_position(anchor: Anchor, margin: u32) -> (String, String) {
    let m = margin;
    match anchor {
        Anchor::TopLeft => (m.to_string(), m.to_string()),
        Anchor::TopRight => (format!("main_w-overlay_w-{}", m), m.to_string()),
        Anchor::BottomLeft => (m.to_string(), format!("main_h-overlay_h-{}", m)),
        Anchor::BottomRight => (
            format!("main_w-overlay_w-{}", m),
            format!("main_h-overlay_h-{}", m),
        ),
        Anchor::Center => (
            "(main_w-overlay_w)/2".to_string(),
            "(main_h-overlay_h)/2".to_string(),
        ),
    }
}

/// `drawtext` position expressions (`x`, `y`) for an anchor.
pub fn text_position(anchor: Anchor, margin: u32) -> (String, String) {
    let m = margin;
    match anchor {
        Anchor::TopLeft => (m.to_string(), m.to_string()),
        Anchor::TopRight => (format!("w-tw-{}", m), m.to_string()),
        Anchor::BottomLeft => (m.to_string(), format!("h-th-{}", m)),
        Anchor::BottomRight => (format!("w-tw-{}", m), format!("h-th-{}", m)),
        Anchor::Center => ("(w-tw)/2".to_string(), "(h-th)/2".to_string()),
    }
}

/// Quotes a value for use inside a filter option.
pub(crate) fn quote_filter_value(value: &str) -> String {
    format!("'{}'", value.replace('\\', "/").replace('\'', "\\'"))
}

/// Decides how `spec` will be rendered.
///
/// Returns `Ok(None)` when the watermark has to be skipped; soft problems are
/// pushed onto `degradations`. Only a spec with neither image nor text is an
/// error.
pub fn plan_watermark(
    spec: &WatermarkSpec,
    fonts: &dyn FontLocator,
    scratch: &mut ScratchDir,
    degradations: &mut Vec<Degradation>,
) -> Result<Option<WatermarkPlan>, TranscodeError> {
    if let Some(image) = &spec.image {
        return Ok(plan_image(spec, image, degradations));
    }

    let text = match spec.text.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(text) => text,
        None => {
            return Err(TranscodeError::validation(
                "watermark requires either an image or text",
            ))
        }
    };

    match resolve_font(spec, fonts) {
        Some(font) => {
            let text_file = match scratch.write("watermark.txt", text.as_bytes()) {
                Ok(path) => path,
                Err(e) => {
                    warn!("Could not stage watermark text, skipping watermark: {}", e);
                    degradations.push(Degradation::new(
                        DegradationKind::Watermark,
                        format!("could not stage watermark text: {}", e),
                    ));
                    return Ok(None);
                }
            };
            Ok(Some(WatermarkPlan::Text {
                filter: drawtext_filter(spec, &font, &text_file),
            }))
        }
        None => {
            warn!("No usable font found, drawing a plain rectangle instead of text");
            degradations.push(Degradation::new(
                DegradationKind::Font,
                "no usable font found, text watermark replaced by a rectangle",
            ));
            Ok(Some(WatermarkPlan::Rectangle {
                source: rectangle_source(spec, text),
                anchor: spec.position,
                margin: spec.margin,
            }))
        }
    }
}

fn plan_image(
    spec: &WatermarkSpec,
    image: &Path,
    degradations: &mut Vec<Degradation>,
) -> Option<WatermarkPlan> {
    if image.is_file() {
        return Some(WatermarkPlan::Image {
            path: image.to_path_buf(),
            anchor: spec.position,
            margin: spec.margin,
            opacity: spec.opacity,
        });
    }

    if image.to_string_lossy().contains(INTENTIONALLY_MISSING_MARKER) {
        info!("Watermark image {:?} marked as missing, skipping", image);
    } else {
        warn!("Watermark image {:?} not found, skipping watermark", image);
        degradations.push(Degradation::new(
            DegradationKind::Watermark,
            format!("watermark image not found: {}", image.display()),
        ));
    }
    None
}

fn resolve_font(spec: &WatermarkSpec, fonts: &dyn FontLocator) -> Option<PathBuf> {
    if let Some(font) = &spec.font_file {
        if font.is_file() {
            return Some(font.clone());
        }
        warn!("Font {:?} not found, looking for a system font", font);
    }
    fonts.locate()
}

fn drawtext_filter(spec: &WatermarkSpec, font: &Path, text_file: &Path) -> String {
    let (x, y) = text_position(spec.position, spec.margin);
    let mut filter = format!(
        "drawtext=fontfile={}:textfile={}:fontsize={}:fontcolor={}@{}:x={}:y={}",
        quote_filter_value(&font.to_string_lossy()),
        quote_filter_value(&text_file.to_string_lossy()),
        spec.font_size,
        spec.font_color,
        format_secs(spec.opacity),
        x,
        y
    );
    if let Some(box_color) = &spec.box_color {
        filter.push_str(&format!(":box=1:boxcolor={}:boxborderw=5", box_color));
    }
    filter
}

/// A color block roughly the size the text would have taken.
fn rectangle_source(spec: &WatermarkSpec, text: &str) -> String {
    let chars = text.chars().count().max(1) as f64;
    let size = spec.font_size.max(1) as f64;
    let width = (chars * size * 0.6 + 10.0).round() as u32;
    let height = (size * 1.5).round() as u32;
    let color = spec.box_color.as_deref().unwrap_or(&spec.font_color);
    format!(
        "color=c={}@{}:s={}x{},format=rgba",
        color,
        format_secs(spec.opacity),
        width,
        height
    )
}
