//! Option and preset resolution.
//!
//! Turns a partial, caller-supplied [`SettingsOverrides`] into a concrete
//! [`Settings`] record by layering built-in defaults, a named preset from a
//! [`PresetRegistry`], and the caller's own values.
//!
//! # Example
//!
//! ```ignore
//! use clipmill_core::options::{OptionsResolver, SettingsOverrides};
//!
//! let resolver = OptionsResolver::default();
//! let settings = resolver.resolve(&SettingsOverrides {
//!     preset: Some("instagram".to_string()),
//!     video_bitrate: Some("10000k".to_string()),
//!     ..Default::default()
//! })?;
//! assert_eq!(settings.width, Some(1080));
//! ```

mod presets;
mod resolver;
mod types;

pub use presets::PresetRegistry;
pub use resolver::OptionsResolver;
pub use types::{
    format_secs, Anchor, AudioEffects, CropSpec, Settings, SettingsOverrides, ThumbnailFailurePolicy,
    ThumbnailSpec, Timestamp, TrimSpec, WatermarkSpec,
};
