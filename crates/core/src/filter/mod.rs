//! Filter graph synthesis.
//!
//! [`FilterGraphSynthesizer`] compiles resolved [`Settings`](crate::options::Settings)
//! into the exact ffmpeg argument vector for one file. The output is
//! deterministic for identical settings, input and probed duration, apart
//! from the scratch path used to stage watermark text.
//!
//! When a watermark needs a second input (an image) or a generated source (the
//! no-font rectangle), the video and audio chains are rewritten into one
//! `-filter_complex` graph with named pads and explicit `-map`s. Otherwise the
//! simpler `-vf`/`-af` form is used.

mod args;
mod audio;
mod codecs;
mod fonts;
mod scratch;
mod synth;
mod watermark;

pub use args::{join_args, split_args, SplitError};
pub use audio::{audio_filters, noise_reduction_amount};
pub use codecs::{audio_extension, is_lossless_audio};
pub use fonts::{FixedFontLocator, FontLocator, SystemFontLocator};
pub use scratch::ScratchDir;
pub use synth::{scale_filter, CommandPlan, FilterGraphSynthesizer, FilterSpec, SynthesisRequest};
pub use watermark::{plan_watermark, WatermarkPlan, INTENTIONALLY_MISSING_MARKER};
