use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides
///
/// Variables use the `CLIPMILL_` prefix and `__` for nesting, e.g.
/// `CLIPMILL_BATCH__CONCURRENCY=8` or `CLIPMILL_DEFAULTS__PRESET=web-low`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    extract(Figment::new().merge(Toml::file(path)))
}

/// Like [`load_config`], but a missing file means built-in defaults (still
/// with environment overrides).
pub fn load_config_or_default(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        load_config(path)
    } else {
        extract(Figment::new())
    }
}

fn extract(figment: Figment) -> Result<Config, ConfigError> {
    let config: Config = figment
        .merge(Env::prefixed("CLIPMILL_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
