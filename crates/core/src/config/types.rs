use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::batch::OutputRules;
use crate::options::{OptionsResolver, PresetRegistry, Settings, SettingsOverrides};
use crate::pipeline::ToolsConfig;
use crate::scanner::{MediaClassifier, MediaType};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    /// Settings applied to every file, including an optional `preset`.
    #[serde(default)]
    pub defaults: SettingsOverrides,
    /// Custom presets, added to (or replacing) the built-in ones.
    #[serde(default)]
    pub presets: HashMap<String, SettingsOverrides>,
}

impl Config {
    /// Resolver over the built-in presets extended with the configured ones.
    pub fn resolver(&self) -> OptionsResolver {
        OptionsResolver::new(
            Settings::default(),
            PresetRegistry::builtin().extend(self.presets.clone()),
        )
    }

    /// Built-in extension table plus the configured extra extensions.
    pub fn classifier(&self) -> MediaClassifier {
        self.batch
            .extensions
            .iter()
            .fold(MediaClassifier::builtin(), |classifier, (ext, kind)| {
                classifier.with_extension(ext, *kind)
            })
    }
}

/// Batch configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Files processed at once (default: 4)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Descend into subdirectories of directory arguments
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub output: OutputRules,
    /// Extra extensions, e.g. `mts = "video"`
    #[serde(default)]
    pub extensions: HashMap<String, MediaType>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            recursive: false,
            output: OutputRules::default(),
            extensions: HashMap::new(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}
