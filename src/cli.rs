use crate::backend::{Backend, HttpBackend, LocalBackend};
use crate::orchestrator::{parse_command, run_view, LineDriven, ToolView, UiCommand, ViewEvent};
use crate::session::{FileStorage, SessionStore};
use crate::settings::Settings;
use crate::tools::{Base64Text, PasswordGenerator, RegexTester, UrlCodec};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

/// Read stdin line by line and forward each line as a UI command.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<UiCommand> {
    let (tx, rx) = mpsc::unbounded_channel::<UiCommand>();
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let cmd = parse_command(&line);
                    let quit = cmd == UiCommand::Quit;
                    if tx.send(cmd).is_err() || quit {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read stdin");
                    break;
                }
            }
        }
        // Dropping `tx` tells the view there is no more input.
    });
    rx
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "devkit",
    version,
    about = "Developer utility tools driven line by line from stdin"
)]
pub struct Cli {
    /// Directory holding settings and session state (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run one tool. Plain stdin lines are inputs; `:encode`, `:decode`,
    /// `:set KEY VALUE`, `:clear`, `:refresh` and `:quit` are commands.
    Run(RunArgs),
    /// Show settings, applying any given changes first
    Settings(SettingsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ToolKind {
    Base64,
    Url,
    Regex,
    Password,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Tool to run
    #[arg(long, value_enum)]
    pub tool: ToolKind,

    /// Start in the given mode (e.g. encode, decode)
    #[arg(long)]
    pub mode: Option<String>,

    /// Print one JSON object per settled result
    #[arg(long)]
    pub json: bool,

    /// Artificial latency added to every local operation
    #[arg(long, default_value = "0s")]
    pub latency: humantime::Duration,

    /// Remote engine base URL (overrides settings)
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Remote engine request timeout (overrides settings)
    #[arg(long)]
    pub timeout: Option<humantime::Duration>,

    /// Use --cachable true or --cachable false to override the setting for this run
    #[arg(long, action = clap::ArgAction::Set)]
    pub cachable: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct SettingsArgs {
    /// Persist tool state across restarts
    #[arg(long, action = clap::ArgAction::Set)]
    pub cachable: Option<bool>,

    /// Log level used when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long)]
    pub theme: Option<String>,

    /// Remote engine base URL
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Forget the remote engine URL and use the in-process engine
    #[arg(long, conflicts_with = "backend_url")]
    pub local: bool,

    /// Remote engine request timeout
    #[arg(long)]
    pub timeout: Option<humantime::Duration>,
}

pub async fn run(args: Cli) -> Result<()> {
    let data_dir = match args.data_dir.clone() {
        Some(dir) => dir,
        None => FileStorage::default_dir().context("locate data directory")?,
    };
    let storage = Arc::new(FileStorage::new(data_dir));
    let settings = load_settings(storage.as_ref());
    tracing::debug!(dir = %storage.dir().display(), "storage ready");

    match args.command {
        Command::Run(run) => match run.tool {
            ToolKind::Base64 => run_tool::<Base64Text>(run, storage, settings).await,
            ToolKind::Url => run_tool::<UrlCodec>(run, storage, settings).await,
            ToolKind::Regex => run_tool::<RegexTester>(run, storage, settings).await,
            ToolKind::Password => run_tool::<PasswordGenerator>(run, storage, settings).await,
        },
        Command::Settings(changes) => run_settings(changes, storage.as_ref(), settings),
    }
}

/// Load settings and install logging from them. A load failure is logged once
/// the subscriber exists, and the defaults are used.
fn load_settings(storage: &FileStorage) -> Settings {
    let loaded = Settings::try_load(storage);
    let settings = loaded.as_ref().cloned().unwrap_or_default();
    crate::logging::init(&settings.debug.level);
    if let Err(e) = loaded {
        tracing::warn!(error = %e, "failed to load settings, using defaults");
    }
    settings
}

/// Build the computation backend: remote if a URL is configured, in-process otherwise.
fn build_backend(args: &RunArgs, settings: &Settings) -> Result<Arc<dyn Backend>> {
    let url = args.backend_url.as_deref().or(settings.backend.url.as_deref());
    match url {
        Some(url) => {
            let timeout = args
                .timeout
                .map(Duration::from)
                .unwrap_or(settings.backend.timeout);
            tracing::info!(%url, ?timeout, "using remote engine");
            Ok(Arc::new(HttpBackend::new(url, timeout)?))
        }
        None => Ok(Arc::new(LocalBackend::with_latency(Duration::from(
            args.latency,
        )))),
    }
}

async fn run_tool<T: LineDriven>(
    args: RunArgs,
    storage: Arc<FileStorage>,
    mut settings: Settings,
) -> Result<()> {
    if let Some(cachable) = args.cachable {
        settings.system.cachable = cachable;
    }
    let backend = build_backend(&args, &settings)?;
    let store = SessionStore::new(storage);
    let view = ToolView::<T>::open(&store, backend, &settings);

    if let Some(word) = args.mode.as_deref() {
        let mode = T::parse_mode(word)
            .ok_or_else(|| anyhow::anyhow!("{} has no mode {word:?}", T::ROUTE))?;
        view.set_mode(mode);
    }

    let (out_tx, out_handle) = spawn_output_writer();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ViewEvent<T>>();
    let cmd_rx = spawn_input_reader();
    let driver = tokio::spawn(run_view(view, event_tx, cmd_rx));

    while let Some(ev) = event_rx.recv().await {
        match ev {
            ViewEvent::Settled(state) => {
                let summary = crate::text_summary::build_text_summary(&state, args.json)?;
                for line in summary.lines {
                    let _ = out_tx.send(OutputLine::Stdout(line));
                }
            }
            ViewEvent::Message(msg) => {
                let _ = out_tx.send(OutputLine::Stderr(msg));
            }
        }
    }

    driver.await.context("tool view task failed")??;
    store.flush().await;

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

fn run_settings(
    changes: SettingsArgs,
    storage: &FileStorage,
    mut settings: Settings,
) -> Result<()> {
    let before = settings.clone();
    if let Some(cachable) = changes.cachable {
        settings.system.cachable = cachable;
    }
    if let Some(level) = changes.log_level {
        settings.debug.level = level;
    }
    if let Some(theme) = changes.theme {
        settings.common.theme = theme;
    }
    if let Some(url) = changes.backend_url {
        settings.backend.url = Some(url);
    }
    if changes.local {
        settings.backend.url = None;
    }
    if let Some(timeout) = changes.timeout {
        settings.backend.timeout = Duration::from(timeout);
    }

    if settings != before {
        settings.save(storage).context("failed to save settings")?;
        tracing::info!("settings updated");
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
