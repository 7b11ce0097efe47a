//! Audio effect chain.

use tracing::warn;

use crate::error::{Degradation, DegradationKind};
use crate::options::{format_secs, AudioEffects};

/// Lower bound of the denoiser strength.
pub const NOISE_REDUCTION_FLOOR: f64 = 0.01;
/// Upper bound of the denoiser strength.
pub const NOISE_REDUCTION_CEILING: f64 = 0.97;

const LOUDNORM: &str = "loudnorm=I=-16:TP=-1.5:LRA=11";

/// Maps a [0, 1] strength onto the denoiser's usable range.
pub fn noise_reduction_amount(strength: f64) -> f64 {
    let strength = strength.clamp(0.0, 1.0);
    NOISE_REDUCTION_FLOOR + strength * (NOISE_REDUCTION_CEILING - NOISE_REDUCTION_FLOOR)
}

/// Builds the audio filter expressions in their fixed order:
/// normalization, noise reduction, fade-in, fade-out, volume.
///
/// `duration` is the length of the output timeline; without it the fade-out
/// is emitted without a start offset and a degradation is recorded.
pub fn audio_filters(
    effects: &AudioEffects,
    duration: Option<f64>,
    degradations: &mut Vec<Degradation>,
) -> Vec<String> {
    let mut filters = Vec::new();

    if effects.normalize {
        filters.push(LOUDNORM.to_string());
    }

    if let Some(strength) = effects.noise_reduction {
        filters.push(format!(
            "anlmdn=s={}",
            format_secs(noise_reduction_amount(strength))
        ));
    }

    if let Some(fade_in) = effects.fade_in.filter(|d| *d > 0.0) {
        filters.push(format!("afade=t=in:st=0:d={}", format_secs(fade_in)));
    }

    if let Some(fade_out) = effects.fade_out.filter(|d| *d > 0.0) {
        match duration {
            Some(total) => {
                let start = (total - fade_out).max(0.0);
                filters.push(format!(
                    "afade=t=out:st={}:d={}",
                    format_secs(start),
                    format_secs(fade_out)
                ));
            }
            None => {
                warn!("Media duration unknown, fade-out applied without a start offset");
                degradations.push(Degradation::new(
                    DegradationKind::Fade,
                    "duration unknown, fade-out start could not be computed",
                ));
                filters.push(format!("afade=t=out:d={}", format_secs(fade_out)));
            }
        }
    }

    if let Some(volume) = effects.volume {
        filters.push(format!("volume={}", format_secs(volume)));
    }

    filters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_reduction_mapping() {
        assert!((noise_reduction_amount(0.5) - 0.49).abs() < 0.001);
        assert!((noise_reduction_amount(0.0) - 0.01).abs() < 0.001);
        assert!((noise_reduction_amount(1.0) - 0.97).abs() < 0.001);
        assert!((noise_reduction_amount(7.0) - 0.97).abs() < 0.001);
    }

    #[test]
    fn test_fade_out_with_known_duration() {
        let effects = AudioEffects {
            fade_out: Some(2.0),
            ..Default::default()
        };
        let mut degradations = Vec::new();
        let filters = audio_filters(&effects, Some(5.0), &mut degradations);
        assert_eq!(filters, vec!["afade=t=out:st=3:d=2"]);
        assert!(degradations.is_empty());
    }

    #[test]
    fn test_fade_out_longer_than_media_starts_at_zero() {
        let effects = AudioEffects {
            fade_out: Some(10.0),
            ..Default::default()
        };
        let filters = audio_filters(&effects, Some(4.0), &mut Vec::new());
        assert_eq!(filters, vec!["afade=t=out:st=0:d=10"]);
    }

    #[test]
    fn test_fade_out_with_unknown_duration() {
        let effects = AudioEffects {
            fade_out: Some(2.0),
            ..Default::default()
        };
        let mut degradations = Vec::new();
        let filters = audio_filters(&effects, None, &mut degradations);
        assert_eq!(filters, vec!["afade=t=out:d=2"]);
        assert_eq!(degradations.len(), 1);
        assert_eq!(degradations[0].kind, DegradationKind::Fade);
    }

    #[test]
    fn test_fixed_order() {
        let effects = AudioEffects {
            normalize: true,
            noise_reduction: Some(0.5),
            fade_in: Some(1.0),
            fade_out: Some(1.5),
            volume: Some(0.8),
        };
        let filters = audio_filters(&effects, Some(10.0), &mut Vec::new());
        assert_eq!(
            filters,
            vec![
                "loudnorm=I=-16:TP=-1.5:LRA=11",
                "anlmdn=s=0.49",
                "afade=t=in:st=0:d=1",
                "afade=t=out:st=8.5:d=1.5",
                "volume=0.8",
            ]
        );
    }
}
