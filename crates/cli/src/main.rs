use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipmill_core::{
    load_config, load_config_or_default, scan_directory, validate_config, BatchEvent,
    BatchResult, BatchScheduler, Config, FfmpegPipeline, MediaClassifier,
};

/// Config file used when `CLIPMILL_CONFIG` is not set
const DEFAULT_CONFIG: &str = "clipmill.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging; CLIPMILL_LOG_FORMAT=json switches to JSON lines
    let json = std::env::var("CLIPMILL_LOG_FORMAT").is_ok_and(|f| f == "json");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    let inputs: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if inputs.is_empty() {
        bail!("usage: clipmill <file-or-directory>...");
    }

    let config = load(std::env::var_os("CLIPMILL_CONFIG").map(PathBuf::from))?;
    validate_config(&config).context("Configuration validation failed")?;

    let settings = config
        .resolver()
        .resolve(&config.defaults)
        .context("Default settings are invalid")?;
    info!(
        "Video {} @ {}, audio {}, concurrency {}",
        settings.video_codec,
        settings.video_bitrate.as_deref().unwrap_or("auto"),
        settings.audio_codec,
        config.batch.concurrency
    );

    let classifier = config.classifier();
    let files = collect_files(&inputs, config.batch.recursive, &classifier)?;
    if files.is_empty() {
        warn!("No media files found");
        return Ok(());
    }

    let scheduler = BatchScheduler::new(
        Arc::new(FfmpegPipeline::new(config.tools.clone())),
        config.batch.concurrency,
    )
    .with_classifier(classifier)
    .with_rules(config.batch.output.clone());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Interrupted, finishing up...");
        trigger.cancel();
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let logger = tokio::spawn(log_events(rx));

    let result = scheduler
        .run(files, Arc::new(settings), Some(tx), cancel)
        .await;
    let _ = logger.await;

    print_summary(&result);
    if !result.all_succeeded() {
        bail!("{} of {} files failed", result.failed.len(), result.total);
    }
    Ok(())
}

/// An explicit config path must exist; the default one may be absent.
fn load(explicit: Option<PathBuf>) -> Result<Config> {
    match explicit {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        None => {
            let path = Path::new(DEFAULT_CONFIG);
            debug!("Loading configuration from {:?} if present", path);
            load_config_or_default(path)
                .with_context(|| format!("Failed to load config from {:?}", path))
        }
    }
}

/// Files are taken as given; directories are scanned.
fn collect_files(
    inputs: &[PathBuf],
    recursive: bool,
    classifier: &MediaClassifier,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let found = scan_directory(input, recursive, classifier)
                .with_context(|| format!("Failed to scan {:?}", input))?;
            info!("Found {} media files in {:?}", found.len(), input);
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

async fn log_events(mut rx: mpsc::UnboundedReceiver<BatchEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            BatchEvent::Start { batch_id, total } => {
                info!("Batch {} started with {} files", batch_id, total)
            }
            BatchEvent::FileStart {
                file_path,
                output_path,
                media_type,
                ..
            } => info!("[{}] {:?} -> {:?}", media_type, file_path, output_path),
            BatchEvent::FileProgress {
                file_path, percent, ..
            } => debug!("{:?}: {:.1}%", file_path, percent),
            BatchEvent::FileComplete {
                file_path,
                degradations,
                ..
            } => {
                for degradation in &degradations {
                    warn!("{:?}: {}", file_path, degradation.message);
                }
            }
            BatchEvent::FileError {
                file_path, error, ..
            } => warn!("{:?} failed: {}", file_path, error),
            BatchEvent::Progress {
                completed,
                total,
                percent,
            } => info!("{}/{} done ({:.0}%)", completed, total, percent),
            BatchEvent::Complete { result } => {
                if let Ok(json) = serde_json::to_string(&result) {
                    debug!("Batch result: {}", json);
                }
            }
        }
    }
}

fn print_summary(result: &BatchResult) {
    println!();
    println!(
        "{} files: {} converted, {} failed",
        result.total,
        result.successful.len(),
        result.failed.len()
    );
    for done in result.clean() {
        println!("  ok        {}", done.output_path.display());
    }
    for done in result.degraded() {
        println!("  degraded  {}", done.output_path.display());
        for degradation in &done.degradations {
            println!("              {}", degradation.message);
        }
    }
    for failed in &result.failed {
        println!("  failed    {}: {}", failed.path.display(), failed.error);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
