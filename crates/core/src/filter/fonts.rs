//! Font discovery for text watermarks.

use once_cell::sync::OnceCell;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Finds a font file usable by `drawtext`.
pub trait FontLocator: Send + Sync + Debug {
    /// Returns a font path, or `None` when no font is available.
    fn locate(&self) -> Option<PathBuf>;
}

/// Checks a list of well-known font files, then searches font directories.
///
/// The result is computed once and cached.
#[derive(Debug)]
pub struct SystemFontLocator {
    candidates: Vec<PathBuf>,
    search_dirs: Vec<PathBuf>,
    found: OnceCell<Option<PathBuf>>,
}

const KNOWN_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const FONT_DIRS: &[&str] = &[
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/System/Library/Fonts",
    "/Library/Fonts",
    "C:\\Windows\\Fonts",
];

impl Default for SystemFontLocator {
    fn default() -> Self {
        Self::new(
            KNOWN_FONTS.iter().map(PathBuf::from).collect(),
            FONT_DIRS.iter().map(PathBuf::from).collect(),
        )
    }
}

impl SystemFontLocator {
    pub fn new(candidates: Vec<PathBuf>, search_dirs: Vec<PathBuf>) -> Self {
        Self {
            candidates,
            search_dirs,
            found: OnceCell::new(),
        }
    }

    fn search(&self) -> Option<PathBuf> {
        if let Some(path) = self.candidates.iter().find(|p| p.is_file()) {
            return Some(path.clone());
        }

        for dir in self.search_dirs.iter().filter(|d| d.is_dir()) {
            let found = WalkDir::new(dir)
                .max_depth(5)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .find(|entry| entry.file_type().is_file() && is_font_file(entry.path()));
            if let Some(entry) = found {
                debug!("Found fallback font {:?}", entry.path());
                return Some(entry.into_path());
            }
        }

        None
    }
}

impl FontLocator for SystemFontLocator {
    fn locate(&self) -> Option<PathBuf> {
        self.found.get_or_init(|| self.search()).clone()
    }
}

/// Locator that always answers the same thing. Useful for tests and for
/// pinning a font from configuration.
#[derive(Debug, Clone, Default)]
pub struct FixedFontLocator(pub Option<PathBuf>);

impl FontLocator for FixedFontLocator {
    fn locate(&self) -> Option<PathBuf> {
        self.0.clone()
    }
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf"))
        .unwrap_or(false)
}
