//! Input discovery: classifying files by extension and walking directories.

mod classifier;

pub use classifier::{MediaClassifier, MediaType};

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::TranscodeError;

/// Lists the media files under `dir`, sorted by path.
///
/// Files the classifier does not recognise are skipped.
pub fn scan_directory(
    dir: &Path,
    recursive: bool,
    classifier: &MediaClassifier,
) -> Result<Vec<PathBuf>, TranscodeError> {
    if !dir.is_dir() {
        return Err(TranscodeError::NotFound {
            path: dir.to_path_buf(),
        });
    }

    let walker = WalkDir::new(dir).max_depth(if recursive { usize::MAX } else { 1 });
    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            TranscodeError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            )
        })?;
        if entry.file_type().is_file() && classifier.classify(entry.path()).is_some() {
            files.push(entry.into_path());
        }
    }
    files.sort();

    debug!("Found {} media files under {:?}", files.len(), dir);
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.mp4"), b"").unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("c.png"), b"").unwrap();

        let classifier = MediaClassifier::builtin();
        let flat = scan_directory(dir.path(), false, &classifier).unwrap();
        assert_eq!(
            flat,
            vec![dir.path().join("a.mp3"), dir.path().join("b.mp4")]
        );

        let deep = scan_directory(dir.path(), true, &classifier).unwrap();
        assert_eq!(deep.len(), 3);
        assert!(deep.contains(&dir.path().join("sub").join("c.png")));
    }

    #[test]
    fn test_scan_missing_directory() {
        let err = scan_directory(
            Path::new("/no/such/dir/anywhere"),
            true,
            &MediaClassifier::builtin(),
        )
        .unwrap_err();
        assert!(matches!(err, TranscodeError::NotFound { .. }));
    }
}
