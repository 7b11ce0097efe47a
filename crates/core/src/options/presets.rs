//! Named setting bundles.

use std::collections::HashMap;

use super::types::{AudioEffects, SettingsOverrides};

/// Immutable lookup table of presets, injected into the resolver.
#[derive(Debug, Clone, Default)]
pub struct PresetRegistry {
    presets: HashMap<String, SettingsOverrides>,
}

impl PresetRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The presets shipped with the crate.
    pub fn builtin() -> Self {
        let mut presets = HashMap::new();

        let video = |width: u32, height: u32, bitrate: &str| SettingsOverrides {
            width: Some(width),
            height: Some(height),
            video_bitrate: Some(bitrate.to_string()),
            ..Default::default()
        };

        presets.insert(
            "instagram".to_string(),
            SettingsOverrides {
                fps: Some(30.0),
                audio_bitrate: Some("128k".to_string()),
                ..video(1080, 1080, "3500k")
            },
        );
        presets.insert(
            "instagram-story".to_string(),
            SettingsOverrides {
                fps: Some(30.0),
                ..video(1080, 1920, "3500k")
            },
        );
        presets.insert(
            "tiktok".to_string(),
            SettingsOverrides {
                fps: Some(30.0),
                speed_preset: Some("fast".to_string()),
                ..video(1080, 1920, "4000k")
            },
        );
        presets.insert(
            "youtube-1080p".to_string(),
            SettingsOverrides {
                audio_bitrate: Some("192k".to_string()),
                speed_preset: Some("slow".to_string()),
                ..video(1920, 1080, "8000k")
            },
        );
        presets.insert(
            "youtube-720p".to_string(),
            SettingsOverrides {
                audio_bitrate: Some("192k".to_string()),
                ..video(1280, 720, "5000k")
            },
        );
        presets.insert(
            "twitter".to_string(),
            SettingsOverrides {
                fps: Some(30.0),
                ..video(1280, 720, "5000k")
            },
        );
        presets.insert(
            "web-low".to_string(),
            SettingsOverrides {
                audio_bitrate: Some("96k".to_string()),
                speed_preset: Some("veryfast".to_string()),
                profile: Some("main".to_string()),
                level: Some("3.1".to_string()),
                ..video(854, 480, "1000k")
            },
        );
        presets.insert(
            "podcast".to_string(),
            SettingsOverrides {
                audio_codec: Some("libmp3lame".to_string()),
                audio_bitrate: Some("96k".to_string()),
                audio: Some(AudioEffects {
                    normalize: true,
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        presets.insert(
            "archive".to_string(),
            SettingsOverrides {
                video_codec: Some("libx265".to_string()),
                audio_codec: Some("flac".to_string()),
                speed_preset: Some("slow".to_string()),
                profile: Some("main".to_string()),
                ..Default::default()
            },
        );

        Self { presets }
    }

    /// Adds or replaces a preset.
    pub fn with_preset(mut self, name: impl Into<String>, preset: SettingsOverrides) -> Self {
        self.presets.insert(name.into(), preset);
        self
    }

    /// Adds or replaces every preset in `presets`.
    pub fn extend(mut self, presets: HashMap<String, SettingsOverrides>) -> Self {
        self.presets.extend(presets);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SettingsOverrides> {
        self.presets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.presets.contains_key(name)
    }

    /// Preset names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.presets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_presets() {
        let registry = PresetRegistry::builtin();
        let instagram = registry.get("instagram").unwrap();
        assert_eq!(instagram.width, Some(1080));
        assert_eq!(instagram.height, Some(1080));
        assert!(registry.contains("youtube-1080p"));
        assert!(registry.get("does-not-exist").is_none());
    }

    #[test]
    fn test_extend_shadows_builtin() {
        let mut custom = HashMap::new();
        custom.insert(
            "instagram".to_string(),
            SettingsOverrides {
                width: Some(720),
                ..Default::default()
            },
        );
        let registry = PresetRegistry::builtin().extend(custom);
        assert_eq!(registry.get("instagram").unwrap().width, Some(720));
    }

    #[test]
    fn test_names_sorted() {
        let registry = PresetRegistry::empty()
            .with_preset("b", SettingsOverrides::default())
            .with_preset("a", SettingsOverrides::default());
        assert_eq!(registry.names(), vec!["a", "b"]);
    }
}
