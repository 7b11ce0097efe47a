//! External process supervision.
//!
//! [`ProcessSupervisor`] spawns the encoder, streams both of its output pipes
//! through a [`LineBuffer`], turns progress lines into [`ProgressSample`]s and
//! decides success: exit code 0 *and* an existing output file. Cancellation
//! and an optional maximum runtime kill the child.

mod events;
mod lines;
mod process;
mod progress;

pub use events::{EventSink, LogStream, PipelineEvent};
pub use lines::LineBuffer;
pub use process::{command_line, ProcessOutcome, ProcessSupervisor, RunState};
pub use progress::ProgressSample;
