//! voxsep - vocal/stem separation via the AudioShake API
//!
//! Two processing commands (single-file and batch) plus a settings command;
//! both processing paths funnel into `voxsep_core::workflow::separate_file`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voxsep_core::batch::{self, BatchOptions};
use voxsep_core::client::ApiClient;
use voxsep_core::config::{self, Settings};
use voxsep_core::events::{EventBus, FileStatus, SeparatorEvent};
use voxsep_core::scanner;
use voxsep_core::workflow::{self, SeparationOutcome, WorkflowOptions};

/// Command-line arguments for voxsep
#[derive(Parser, Debug)]
#[command(name = "voxsep")]
#[command(about = "Extract vocals and stems from audio using the AudioShake API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Separate a single audio file
    Separate {
        /// Input audio file (MP3, WAV, FLAC, M4A, ...)
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        auth: AuthArgs,
    },

    /// Separate many files or directories with bounded parallelism
    Batch {
        /// Input audio files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Search directories recursively
        #[arg(short, long)]
        recursive: bool,

        /// Number of parallel jobs
        #[arg(short, long, default_value_t = 2)]
        workers: usize,

        /// Append one `{file}\t{status}` line per entry to this file
        #[arg(long)]
        log: Option<PathBuf>,

        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        auth: AuthArgs,
    },

    /// Show or update persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Separation model (e.g. vocals, instrumental, drums)
    #[arg(long)]
    model: Option<String>,

    /// Output format requested from the API (e.g. wav, mp3)
    #[arg(long)]
    format: Option<String>,
}

impl TargetArgs {
    fn apply(self, mut settings: Settings) -> Settings {
        if let Some(model) = self.model {
            settings.model = model;
        }
        if let Some(format) = self.format {
            settings.format = format;
        }
        settings
    }
}

#[derive(Args, Debug)]
struct AuthArgs {
    /// API key (overrides environment and config file)
    #[arg(long, env = "AUDIOSHAKE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the persisted settings
    Show,
    /// Persist an API key to the config file
    SetApiKey { key: String },
    /// Persist the default separation model
    SetModel { model: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voxsep=warn,voxsep_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Separate {
            input,
            output,
            target,
            auth,
        } => cmd_separate(input, output, target, auth).await,
        Command::Batch {
            inputs,
            output,
            recursive,
            workers,
            log,
            target,
            auth,
        } => cmd_batch(inputs, output, recursive, workers, log, target, auth).await,
        Command::Config { action } => cmd_config(action),
    }
}

async fn cmd_separate(
    input: PathBuf,
    output: PathBuf,
    target: TargetArgs,
    auth: AuthArgs,
) -> anyhow::Result<bool> {
    let settings = target.apply(Settings::load(None).context("failed to load settings")?);
    let credential = settings.resolve_api_key(auth.api_key.as_deref())?;
    let client = ApiClient::new(credential)?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let options = WorkflowOptions::from_settings(output.clone(), &settings);
    match workflow::separate_file(&client, &input, &options, &cancel).await {
        SeparationOutcome::Succeeded { saved } => {
            println!("Done. {} file(s) saved to {}:", saved.len(), output.display());
            for path in saved {
                println!("  {}", path.display());
            }
            Ok(true)
        }
        SeparationOutcome::Failed { error } => {
            eprintln!("Separation failed: {error}");
            Ok(false)
        }
        SeparationOutcome::Cancelled => {
            eprintln!("Cancelled.");
            Ok(false)
        }
    }
}

async fn cmd_batch(
    inputs: Vec<PathBuf>,
    output: PathBuf,
    recursive: bool,
    workers: usize,
    log: Option<PathBuf>,
    target: TargetArgs,
    auth: AuthArgs,
) -> anyhow::Result<bool> {
    let settings = target.apply(Settings::load(None).context("failed to load settings")?);
    // Missing credential is fatal before any work begins
    let credential = settings.resolve_api_key(auth.api_key.as_deref())?;

    let files = scanner::collect_inputs(&inputs, recursive)?;
    tracing::debug!(found = files.len(), workers, "Batch discovery complete");
    if files.is_empty() {
        eprintln!(
            "No audio files found. Supported formats: {}",
            scanner::AUDIO_EXTENSIONS.join(", ")
        );
        return Ok(false);
    }
    println!("Found {} audio file(s)", files.len());

    let client = Arc::new(ApiClient::new(credential)?);
    let bus = EventBus::new(128);
    let mut events = bus.subscribe();
    let renderer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            render_event(&event);
        }
    });

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let options = BatchOptions {
        workflow: WorkflowOptions::from_settings(output.clone(), &settings),
        workers,
        log_path: log.or_else(|| settings.log_path.clone()),
    };

    let outcomes = batch::run_batch(Arc::clone(&client), files, &options, &cancel, &bus).await;
    drop(bus);
    let _ = renderer.await;

    let succeeded = outcomes.iter().filter(|o| o.outcome.is_success()).count();
    let cancelled = outcomes
        .iter()
        .filter(|o| o.outcome.status() == FileStatus::Cancelled)
        .count();
    let failed = outcomes.len() - succeeded - cancelled;

    println!();
    println!("Summary: {succeeded} succeeded, {failed} failed, {cancelled} cancelled");
    println!("Output directory: {}", output.display());

    if failed > 0 {
        println!("Failed files:");
        for entry in &outcomes {
            if entry.outcome.status() == FileStatus::Failed {
                println!(
                    "  {}: {}",
                    entry.input.display(),
                    entry.outcome.failure_message().unwrap_or_default()
                );
            }
        }
    }

    Ok(failed == 0 && cancelled == 0)
}

fn cmd_config(action: ConfigAction) -> anyhow::Result<bool> {
    let path = Settings::default_path().context("could not determine config directory")?;

    match action {
        ConfigAction::Show => {
            let settings = Settings::load(Some(&path))?;
            println!("Config file: {}", path.display());
            println!(
                "api_key: {}",
                if settings.api_key.is_some() { "set" } else { "not set" }
            );
            println!("model: {}", settings.model);
            println!("format: {}", settings.format);
            println!("poll_interval_secs: {}", settings.poll_interval_secs);
            match settings.log_path {
                Some(log_path) => println!("log_path: {}", log_path.display()),
                None => println!("log_path: not set"),
            }
        }
        ConfigAction::SetApiKey { key } => {
            if !config::is_valid_key(&key) {
                anyhow::bail!("API key must not be empty");
            }
            let mut settings = Settings::load(Some(&path))?;
            settings.api_key = Some(key);
            settings.save(&path)?;
            println!("API key saved to {}", path.display());
        }
        ConfigAction::SetModel { model } => {
            let mut settings = Settings::load(Some(&path))?;
            settings.model = model;
            settings.save(&path)?;
            println!("Model saved to {}", path.display());
        }
    }
    Ok(true)
}

fn render_event(event: &SeparatorEvent) {
    match event {
        SeparatorEvent::BatchStarted { total, .. } => {
            println!("Processing {total} file(s)...");
        }
        SeparatorEvent::FileStarted {
            index, total, file, ..
        } => {
            println!("[{}/{}] {}", index + 1, total, file);
        }
        SeparatorEvent::FileFinished {
            file,
            status,
            message,
            ..
        } => match status {
            FileStatus::Success => println!("  ok        {file}"),
            FileStatus::Failed => println!(
                "  failed    {file}: {}",
                message.as_deref().unwrap_or("unknown error")
            ),
            FileStatus::Cancelled => println!("  cancelled {file}"),
        },
        SeparatorEvent::BatchCancelled { .. } => {
            println!("Batch cancelled.");
        }
        SeparatorEvent::BatchFinished { .. } => {}
    }
}

/// Cancel the token on Ctrl-C. Cancellation is cooperative: in-flight HTTP
/// calls finish, then each workflow settles at its next check.
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Stopping after in-flight work settles...");
            cancel.cancel();
        }
    });
}
