//! Codec name lookups.

/// File extension matching an ffmpeg audio encoder name.
pub fn audio_extension(codec: &str) -> &'static str {
    match codec {
        "libmp3lame" | "mp3" => "mp3",
        "aac" | "libfdk_aac" | "alac" => "m4a",
        "libopus" | "opus" => "opus",
        "libvorbis" | "vorbis" => "ogg",
        "flac" => "flac",
        c if c.starts_with("pcm_") => "wav",
        _ => "mp3",
    }
}

/// Whether a bitrate makes no sense for this audio encoder.
pub fn is_lossless_audio(codec: &str) -> bool {
    matches!(codec, "flac" | "alac") || codec.starts_with("pcm_")
}
