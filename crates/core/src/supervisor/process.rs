//! Child process lifecycle.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::{EventSink, LogStream, PipelineEvent};
use super::lines::LineBuffer;
use super::progress::ProgressSample;
use crate::error::TranscodeError;
use crate::filter::join_args;

const READ_CHUNK: usize = 8 * 1024;

/// Where a supervised run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

/// What a successful run left behind.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub stderr: String,
    pub elapsed: Duration,
}

enum Finish {
    Exited(std::io::Result<ExitStatus>, String),
    Cancelled,
    TimedOut,
}

/// Runs one external tool invocation and reduces its output to events.
#[derive(Debug, Clone, Default)]
pub struct ProcessSupervisor {
    timeout: Option<Duration>,
}

impl ProcessSupervisor {
    /// `timeout` caps the wall-clock runtime; `None` lets the tool run forever.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Spawns `program` and waits for it.
    ///
    /// Succeeds only when the tool exits with code 0 *and* `output` exists
    /// afterwards. Both output streams are forwarded line by line as
    /// [`PipelineEvent::Log`]; lines carrying progress fields additionally
    /// produce [`PipelineEvent::Progress`].
    pub async fn run(
        &self,
        program: &Path,
        args: &[String],
        output: &Path,
        duration: Option<f64>,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutcome, TranscodeError> {
        let mut state = RunState::NotStarted;
        if cancel.is_cancelled() {
            return Err(TranscodeError::Cancelled);
        }

        let started = Instant::now();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TranscodeError::ToolLaunch {
                program: program.to_path_buf(),
                source,
            })?;

        state = transition(state, RunState::Running);
        let command = command_line(program, args);
        info!("Started {}", program.display());
        debug!("Command: {}", command);
        events.emit(PipelineEvent::Start {
            command,
            args: args.to_vec(),
        });

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let finish = tokio::select! {
            (status, stderr_text) = async {
                let (_, stderr_text) = tokio::join!(
                    pump(stdout, LogStream::Stdout, events, duration),
                    pump(stderr, LogStream::Stderr, events, duration),
                );
                (child.wait().await, stderr_text)
            } => Finish::Exited(status, stderr_text),
            _ = cancel.cancelled() => Finish::Cancelled,
            _ = deadline(self.timeout) => Finish::TimedOut,
        };

        let (status, stderr_text) = match finish {
            Finish::Exited(status, stderr_text) => (status?, stderr_text),
            Finish::Cancelled => {
                warn!("Cancelled, killing {}", program.display());
                terminate(&mut child).await;
                transition(state, RunState::Failed);
                return Err(TranscodeError::Cancelled);
            }
            Finish::TimedOut => {
                let timeout_secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
                warn!(
                    "{} exceeded {}s, killing it",
                    program.display(),
                    timeout_secs
                );
                terminate(&mut child).await;
                transition(state, RunState::Failed);
                return Err(TranscodeError::Timeout { timeout_secs });
            }
        };

        if !status.success() {
            transition(state, RunState::Failed);
            let reason = match status.code() {
                Some(code) => format!("{} exited with code {}", program.display(), code),
                None => format!("{} was terminated by a signal", program.display()),
            };
            return Err(TranscodeError::execution_failed(
                reason,
                status.code(),
                stderr_text,
            ));
        }

        // Exit code 0 alone is not proof of success.
        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            transition(state, RunState::Failed);
            return Err(TranscodeError::execution_failed(
                format!(
                    "{} reported success but output is missing: {}",
                    program.display(),
                    output.display()
                ),
                Some(0),
                stderr_text,
            ));
        }

        transition(state, RunState::Succeeded);
        Ok(ProcessOutcome {
            stderr: stderr_text,
            elapsed: started.elapsed(),
        })
    }
}

fn transition(from: RunState, to: RunState) -> RunState {
    debug!("Process state {:?} -> {:?}", from, to);
    to
}

/// Program plus arguments, quoted for logs and results.
pub fn command_line(program: &Path, args: &[String]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(program.to_string_lossy().to_string());
    parts.extend(args.iter().cloned());
    join_args(&parts)
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}

async fn terminate(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!("Kill failed, process probably already exited: {}", e);
    }
}

/// Reads `reader` to the end, emitting log and progress events.
///
/// Returns the stream's full text with lines joined by `\n`.
async fn pump<R: AsyncRead + Unpin>(
    reader: Option<R>,
    stream: LogStream,
    events: &EventSink,
    duration: Option<f64>,
) -> String {
    let Some(mut reader) = reader else {
        return String::new();
    };

    let mut lines = LineBuffer::new();
    let mut text = String::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                for line in lines.push(&chunk[..n]) {
                    handle_line(line, stream, events, duration, &mut text);
                }
            }
            Err(e) => {
                debug!("Stopped reading {:?}: {}", stream, e);
                break;
            }
        }
    }
    if let Some(line) = lines.finish() {
        handle_line(line, stream, events, duration, &mut text);
    }

    text
}

fn handle_line(
    line: String,
    stream: LogStream,
    events: &EventSink,
    duration: Option<f64>,
    text: &mut String,
) {
    let sample = ProgressSample::parse(&line);
    if !text.is_empty() {
        text.push('\n');
    }
    text.push_str(&line);
    events.emit(PipelineEvent::Log { stream, line });
    if let Some(sample) = sample {
        events.emit(PipelineEvent::Progress { sample, duration });
    }
}
