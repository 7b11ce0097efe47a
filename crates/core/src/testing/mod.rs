//! Testing utilities and mock implementations.
//!
//! [`MockPipeline`] stands in for the ffmpeg pipeline so batch behavior can
//! be exercised without any external tool. The [`fixtures`] module writes
//! input files and fake tool scripts for end-to-end tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use clipmill_core::testing::{fixtures, MockPipeline};
//!
//! let dir = tempfile::tempdir()?;
//! let files = fixtures::media_files(dir.path(), &["a.mp4", "b.mp3"]);
//! let mock = Arc::new(MockPipeline::new().with_degraded(&files[1]));
//! ```

mod mock_pipeline;

pub use mock_pipeline::MockPipeline;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    /// Creates one small placeholder file per name under `dir`.
    pub fn media_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).expect("create fixture dir");
                }
                std::fs::write(&path, b"media").expect("write fixture file");
                path
            })
            .collect()
    }

    /// Writes an executable shell script named `name` under `dir`.
    #[cfg(unix)]
    pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        path
    }

    /// A fake ffmpeg that prints two progress blocks and creates its last
    /// argument.
    #[cfg(unix)]
    pub fn fake_ffmpeg(dir: &Path) -> PathBuf {
        script(
            dir,
            "ffmpeg",
            "for last; do :; done\n\
             echo 'frame=10 fps=25.0 time=00:00:05.00 bitrate=800.0kbits/s speed=2.0x'\n\
             echo 'frame=20 fps=25.0 time=00:00:10.00 bitrate=800.0kbits/s speed=2.0x'\n\
             echo 'encoder ready' >&2\n\
             touch \"$last\"",
        )
    }

    /// A fake ffprobe that reports a 10 second 1280x720 H.264/AAC file.
    #[cfg(unix)]
    pub fn fake_ffprobe(dir: &Path) -> PathBuf {
        script(
            dir,
            "ffprobe",
            "cat <<'EOF'\n\
             {\"format\":{\"format_name\":\"mov,mp4\",\"duration\":\"10.0\",\"bit_rate\":\"800000\"},\n\
             \"streams\":[\n\
             {\"codec_type\":\"video\",\"codec_name\":\"h264\",\"width\":1280,\"height\":720,\"avg_frame_rate\":\"25/1\"},\n\
             {\"codec_type\":\"audio\",\"codec_name\":\"aac\",\"sample_rate\":\"48000\",\"channels\":2}]}\n\
             EOF",
        )
    }
}
