pub mod batch;
pub mod config;
pub mod error;
pub mod filter;
pub mod options;
pub mod pipeline;
pub mod postprocess;
pub mod scanner;
pub mod supervisor;
pub mod testing;

pub use batch::{BatchEvent, BatchResult, BatchScheduler, FailedFile, OutputRules, TaskStatus};
pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, BatchConfig,
    Config, ConfigError,
};
pub use error::{Degradation, DegradationKind, ErrorKind, TranscodeError};
pub use filter::{CommandPlan, FilterGraphSynthesizer, SynthesisRequest};
pub use options::{OptionsResolver, PresetRegistry, Settings, SettingsOverrides};
pub use pipeline::{FfmpegPipeline, FileJob, MediaPipeline, PipelineResult, ToolsConfig};
pub use postprocess::{MediaInfo, PostProcessingChain, Prober};
pub use scanner::{scan_directory, MediaClassifier, MediaType};
pub use supervisor::{PipelineEvent, ProcessSupervisor, ProgressSample};
