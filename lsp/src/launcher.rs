//! Spawns the language server as a child process on a stdio transport.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use swon_types::{ClientSettings, ENV_SECRET_DENYLIST, TransportKind};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};

use crate::connection::{Launcher, ServerConnection};

/// Minimal glob matcher for env var denylist patterns.
/// Handles `*_SUFFIX`, `PREFIX_*`, `*_INFIX*`, and exact match.
/// Both pattern and key are compared in uppercase.
fn env_glob_matches(pattern: &str, key_upper: &str) -> bool {
    let pat = pattern.to_uppercase();
    match (pat.strip_prefix('*'), pat.strip_suffix('*')) {
        (Some(rest), _) if rest.ends_with('*') => key_upper.contains(&rest[..rest.len() - 1]),
        (Some(suffix), None) => key_upper.ends_with(suffix),
        (None, Some(prefix)) => key_upper.starts_with(prefix),
        _ => key_upper == pat,
    }
}

fn is_secret_env(key: &str) -> bool {
    let upper = key.to_uppercase();
    ENV_SECRET_DENYLIST
        .iter()
        .any(|pat| env_glob_matches(pat, &upper))
}

/// Launches the configured server command in `workspace_root`.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    workspace_root: PathBuf,
}

impl ProcessLauncher {
    #[must_use]
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

impl Launcher for ProcessLauncher {
    type Connection = ServerConnection;

    async fn launch(&self, settings: &ClientSettings) -> Result<ServerConnection> {
        let server = settings.server_command();

        let resolved = which::which(server.command())
            .with_context(|| format!("{} not found in PATH", server.command()))?;
        tracing::debug!(
            command = %resolved.display(),
            transport = server.transport().as_str(),
            debug = settings.debug_mode(),
            "spawning language server"
        );

        let mut child = {
            let mut cmd = Command::new(&resolved);
            cmd.args(server.args())
                .current_dir(&self.workspace_root)
                .stderr(Stdio::piped())
                .kill_on_drop(true);
            wire_transport(&mut cmd, server.transport());
            for (key, _) in std::env::vars_os() {
                if key.to_str().is_some_and(is_secret_env) {
                    cmd.env_remove(&key);
                }
            }
            cmd.spawn()
                .with_context(|| format!("spawning {}", server.command()))?
        };

        let stdout = child.stdout.take().context("no stdout from child")?;
        let stdin = child.stdin.take().context("no stdin from child")?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(
                stderr,
                settings.identity().id().to_string(),
            ));
        }

        ServerConnection::establish(stdout, stdin, Some(child), settings, &self.workspace_root)
            .await
    }
}

/// Route the protocol streams for `transport`.
fn wire_transport(cmd: &mut Command, transport: TransportKind) {
    match transport {
        TransportKind::Stdio => {
            cmd.stdin(Stdio::piped()).stdout(Stdio::piped());
        }
    }
}

/// Relay the server's stderr into the log; it is not part of the protocol.
async fn forward_stderr(stderr: ChildStderr, client: String) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(client = %client, "server stderr: {line}");
    }
}
