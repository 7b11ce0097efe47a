//! Merges defaults, a preset and caller overrides into concrete settings.

use tracing::debug;

use super::presets::PresetRegistry;
use super::types::{Settings, SettingsOverrides};
use crate::error::TranscodeError;

/// Resolves caller overrides into [`Settings`].
///
/// Precedence, lowest first: defaults, the named preset, caller overrides.
#[derive(Debug, Clone)]
pub struct OptionsResolver {
    defaults: Settings,
    presets: PresetRegistry,
}

impl Default for OptionsResolver {
    fn default() -> Self {
        Self::new(Settings::default(), PresetRegistry::builtin())
    }
}

impl OptionsResolver {
    pub fn new(defaults: Settings, presets: PresetRegistry) -> Self {
        Self { defaults, presets }
    }

    pub fn defaults(&self) -> &Settings {
        &self.defaults
    }

    pub fn presets(&self) -> &PresetRegistry {
        &self.presets
    }

    /// Produces the settings for one file. Pure: the same overrides always
    /// resolve to the same settings.
    pub fn resolve(&self, overrides: &SettingsOverrides) -> Result<Settings, TranscodeError> {
        let mut settings = self.defaults.clone();

        let preset = overrides.preset.as_deref().and_then(|name| {
            let found = self.presets.get(name);
            if found.is_none() {
                debug!("Unknown preset {:?}, ignoring", name);
            }
            found
        });

        if let Some(preset) = preset {
            preset.apply_to(&mut settings);
        }
        overrides.apply_to(&mut settings);

        // `preset` names a profile while `speed_preset` names an encoder
        // speed. When a caller passes the profile name through both, the
        // profile's own encoder speed wins.
        if let (Some(profile_name), Some(speed)) = (&overrides.preset, &overrides.speed_preset) {
            if profile_name == speed {
                settings.speed_preset = preset
                    .and_then(|p| p.speed_preset.clone())
                    .unwrap_or_else(|| self.defaults.speed_preset.clone());
            }
        }

        normalize(&mut settings);
        validate(&settings)?;
        Ok(settings)
    }
}

/// Clamps values that have a natural range instead of rejecting them.
fn normalize(settings: &mut Settings) {
    if let Some(strength) = settings.audio.noise_reduction.as_mut() {
        *strength = strength.clamp(0.0, 1.0);
    }
    if let Some(watermark) = settings.watermark.as_mut() {
        watermark.opacity = watermark.opacity.clamp(0.0, 1.0);
    }
}

fn validate(settings: &Settings) -> Result<(), TranscodeError> {
    if settings.width == Some(0) || settings.height == Some(0) {
        return Err(TranscodeError::validation("width and height must be positive"));
    }
    if let Some(crop) = &settings.crop {
        if crop.width == 0 || crop.height == 0 {
            return Err(TranscodeError::validation("crop width and height must be positive"));
        }
    }
    if let Some(fps) = settings.fps {
        if fps <= 0.0 || !fps.is_finite() {
            return Err(TranscodeError::validation(format!(
                "fps must be positive, got {}",
                fps
            )));
        }
    }
    if settings.video_codec.trim().is_empty() || settings.audio_codec.trim().is_empty() {
        return Err(TranscodeError::validation("codec names cannot be empty"));
    }

    if let Some(watermark) = &settings.watermark {
        let has_image = watermark.image.is_some();
        let has_text = watermark
            .text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if !has_image && !has_text {
            return Err(TranscodeError::validation(
                "watermark requires either an image or text",
            ));
        }
    }

    if let Some(trim) = &settings.trim {
        if let (Some(start), Some(end)) = (trim.start, trim.end) {
            if end <= start {
                return Err(TranscodeError::validation(format!(
                    "trim end ({}) must be after trim start ({})",
                    end, start
                )));
            }
        }
    }

    for (name, value) in [
        ("fade_in", settings.audio.fade_in),
        ("fade_out", settings.audio.fade_out),
        ("volume", settings.audio.volume),
    ] {
        if let Some(v) = value {
            if v < 0.0 || !v.is_finite() {
                return Err(TranscodeError::validation(format!(
                    "{} must be a non-negative number, got {}",
                    name, v
                )));
            }
        }
    }

    if let Some(thumbnails) = &settings.thumbnails {
        if thumbnails.timestamps.is_empty() && thumbnails.count.unwrap_or(0) == 0 {
            return Err(TranscodeError::validation(
                "thumbnails require a positive count or explicit timestamps",
            ));
        }
    }

    Ok(())
}
