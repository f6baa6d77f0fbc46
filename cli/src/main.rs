//! Swon client CLI - host integration for the language client controller.
//!
//! # Architecture
//!
//! ```text
//! stdin reader task --HostCommand--> command loop (owns ClientController)
//!                                         |
//!                                         v
//!                            start | stop | restart | sync | watch
//! ```
//!
//! The controller starts the server when the host comes up. Notifications
//! are printed to stdout; logs go to a file so they never interleave with
//! them. On EOF, `quit` or Ctrl-C the teardown hook shuts the server down.

mod command;

use anyhow::{Context, Result};
use std::{
    env,
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::Mutex,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use command::HostCommand;
use swon_lsp::{ClientController, Launcher, Notifier, ProcessLauncher};
use swon_types::ClientSettings;

const COMMAND_QUEUE: usize = 16;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_env("SWON_LOG")
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // stdout carries notifications; no log output beats corrupting it.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.swon/logs/swon-client.log
    if let Some(config_path) = swon_config::config_path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("swon-client.log"));
    }

    // Fallback: ./.swon/logs/swon-client.log
    candidates.push(PathBuf::from(".swon").join("logs").join("swon-client.log"));

    candidates
}

/// `SWON_DEBUG=1` selects the debug launch parameters without editing the
/// config file.
fn debug_from_env() -> Option<bool> {
    let value = env::var("SWON_DEBUG").ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            tracing::warn!("Ignoring unrecognized SWON_DEBUG value: {other}");
            None
        }
    }
}

/// Prints notifications, one per line.
struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    fn info(&self, message: &str) {
        println!("{message}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let mut settings: ClientSettings =
        swon_config::load_settings().context("loading Swon client config")?;
    if let Some(debug) = debug_from_env() {
        settings = settings.with_debug_mode(debug);
    }

    let workspace_root = env::current_dir().context("resolving workspace root")?;
    let launcher = ProcessLauncher::new(workspace_root.clone());
    let mut controller =
        ClientController::new(settings, launcher, StdoutNotifier, workspace_root.clone());

    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);
    let reader = tokio::spawn(read_commands(commands_tx, workspace_root));

    controller.start().await;
    run_command_loop(&mut controller, commands_rx).await;

    reader.abort();
    if let Some(pending) = controller.deactivate() {
        pending.await;
    }
    tracing::info!("Swon client exited");

    Ok(())
}

/// Forward parsed stdin lines to the command loop until EOF.
async fn read_commands(commands: mpsc::Sender<HostCommand>, root: PathBuf) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read stdin: {e}");
                break;
            }
        };
        match HostCommand::parse(&line, &root) {
            Ok(Some(command)) => {
                if commands.send(command).await.is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(message) => eprintln!("{message}"),
        }
    }
}

async fn run_command_loop<L, N>(
    controller: &mut ClientController<L, N>,
    mut commands: mpsc::Receiver<HostCommand>,
) where
    L: Launcher,
    N: Notifier,
{
    loop {
        let command = tokio::select! {
            command = commands.recv() => command,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                None
            }
        };

        match command {
            None | Some(HostCommand::Quit) => break,
            Some(HostCommand::Start) => {
                controller.start().await;
            }
            Some(HostCommand::Stop) => {
                controller.stop().await;
            }
            Some(HostCommand::Restart) => {
                controller.restart().await;
            }
            Some(HostCommand::Status) => {
                let status = controller.status();
                println!(
                    "{}: {}",
                    controller.settings().identity().name(),
                    status.label()
                );
            }
            Some(HostCommand::Open(path)) => open_document(controller, &path).await,
            Some(HostCommand::FileChanged(event)) => {
                let forwarded = controller
                    .on_file_events(std::slice::from_ref(&event))
                    .await;
                tracing::debug!(
                    path = %event.path().display(),
                    kind = ?event.kind(),
                    forwarded,
                    "file event"
                );
            }
        }
    }
}

async fn open_document<L, N>(controller: &mut ClientController<L, N>, path: &Path)
where
    L: Launcher,
    N: Notifier,
{
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Cannot read {}: {e}", path.display());
            return;
        }
    };
    if !controller.on_document_changed(path, &text).await {
        eprintln!(
            "{} was not sent: client not running or document not selected",
            path.display()
        );
    }
}
