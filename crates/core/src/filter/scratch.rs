//! Per-invocation scratch space.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary directory tied to one pipeline invocation.
///
/// Created on first write and removed when dropped, whichever way the
/// invocation ends. Concurrent invocations never share one.
#[derive(Debug)]
pub struct ScratchDir {
    root: PathBuf,
    dir: Option<TempDir>,
}

impl ScratchDir {
    /// Scratch space that will be created under `root` when first needed.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dir: None,
        }
    }

    /// Writes `contents` to `name` inside the scratch directory.
    pub fn write(&mut self, name: &str, contents: &[u8]) -> io::Result<PathBuf> {
        let dir = self.ensure()?;
        let path = dir.join(name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Path of the directory, if anything has been written yet.
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(|d| d.path())
    }

    fn ensure(&mut self) -> io::Result<&Path> {
        if self.dir.is_none() {
            std::fs::create_dir_all(&self.root)?;
            let dir = tempfile::Builder::new()
                .prefix("clipmill-")
                .tempdir_in(&self.root)?;
            self.dir = Some(dir);
        }
        // Just initialised above.
        Ok(self.dir.as_ref().map(|d| d.path()).unwrap_or(&self.root))
    }
}
