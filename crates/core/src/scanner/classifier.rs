//! Extension-based media classification.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Kind of media a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Video,
    Audio,
    Image,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "mov", "avi", "webm", "m4v", "wmv", "flv", "mpg", "mpeg", "ts", "m2ts", "3gp",
];
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "aac", "m4a", "ogg", "opus", "wma", "aiff", "alac",
];
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff", "tif", "avif",
];

/// Immutable extension → media type table.
#[derive(Debug, Clone, Default)]
pub struct MediaClassifier {
    extensions: HashMap<String, MediaType>,
}

impl MediaClassifier {
    /// The extension table shipped with the crate.
    pub fn builtin() -> Self {
        let mut extensions = HashMap::new();
        for (list, kind) in [
            (VIDEO_EXTENSIONS, MediaType::Video),
            (AUDIO_EXTENSIONS, MediaType::Audio),
            (IMAGE_EXTENSIONS, MediaType::Image),
        ] {
            for ext in list {
                extensions.insert(ext.to_string(), kind);
            }
        }
        Self { extensions }
    }

    /// Adds or reassigns an extension (without the leading dot).
    pub fn with_extension(mut self, extension: &str, kind: MediaType) -> Self {
        self.extensions
            .insert(extension.trim_start_matches('.').to_ascii_lowercase(), kind);
        self
    }

    /// Media type of `path`, judged by its extension only.
    pub fn classify(&self, path: &Path) -> Option<MediaType> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.extensions.get(&ext).copied()
    }
}
