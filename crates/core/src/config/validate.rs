use super::{types::Config, ConfigError};
use crate::options::SettingsOverrides;

/// Validate configuration
/// Currently validates:
/// - Batch concurrency is at least 1
/// - Tool paths are not empty
/// - Every configured preset and the defaults resolve to valid settings
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.batch.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "batch.concurrency must be at least 1".to_string(),
        ));
    }

    for (key, path) in [
        ("tools.ffmpeg_path", &config.tools.ffmpeg_path),
        ("tools.ffprobe_path", &config.tools.ffprobe_path),
    ] {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(format!("{} cannot be empty", key)));
        }
    }

    let resolver = config.resolver();
    let mut names: Vec<&String> = config.presets.keys().collect();
    names.sort();
    for name in names {
        resolver
            .resolve(&SettingsOverrides::preset(name.clone()))
            .map_err(|e| ConfigError::ValidationError(format!("presets.{}: {}", name, e)))?;
    }

    if let Some(name) = &config.defaults.preset {
        if !resolver.presets().contains(name) {
            return Err(ConfigError::ValidationError(format!(
                "defaults.preset names an unknown preset: {}",
                name
            )));
        }
    }
    resolver
        .resolve(&config.defaults)
        .map_err(|e| ConfigError::ValidationError(format!("defaults: {}", e)))?;

    Ok(())
}
