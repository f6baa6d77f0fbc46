//! Client lifecycle controller, the API hosts drive.
//!
//! The controller owns a single optional connection. `start`, `stop` and
//! `restart` are the only operations that change it; all of them take
//! `&mut self`, so there is exactly one writer and `restart` can await
//! `stop` fully before `start` begins.
//!
//! Every operation reports through the [`Notifier`] and returns an outcome;
//! none of them returns an error.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

use swon_types::{ClientSettings, DocumentFilter};

use crate::connection::{Connection, ConnectionError, Launcher};
use crate::protocol;
use crate::types::{ClientId, ClientStatus, Notifier, RestartOutcome, StartOutcome, StopOutcome};
use crate::watch::{FileEvent, WatchFilter};

/// Scheme used for documents the host reads from disk.
const FILE_SCHEME: &str = "file";

/// User-visible lifecycle messages.
enum Notice<'a> {
    AlreadyRunning,
    Started,
    StartFailed(&'a str),
    NotRunning,
    Stopped,
    Restarting,
}

struct Rendered<'a> {
    name: &'a str,
    notice: Notice<'a>,
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name;
        match &self.notice {
            Notice::AlreadyRunning => write!(f, "{name} is already running."),
            Notice::Started => write!(f, "{name} started."),
            Notice::StartFailed(cause) => write!(f, "Failed to start {name}: {cause}"),
            Notice::NotRunning => write!(f, "{name} is not running."),
            Notice::Stopped => write!(f, "{name} stopped."),
            Notice::Restarting => write!(f, "Restarting {name}..."),
        }
    }
}

struct ActiveClient<C> {
    id: ClientId,
    connection: C,
}

pub struct ClientController<L: Launcher, N: Notifier> {
    settings: ClientSettings,
    launcher: L,
    notifier: N,
    watch: WatchFilter,
    slot: Option<ActiveClient<L::Connection>>,
    next_id: u64,
}

impl<L: Launcher, N: Notifier> ClientController<L, N> {
    /// A controller with an empty slot. Nothing is launched until `start`.
    pub fn new(settings: ClientSettings, launcher: L, notifier: N, workspace_root: PathBuf) -> Self {
        let watch = WatchFilter::new(settings.watch().clone(), workspace_root);
        Self {
            settings,
            launcher,
            notifier,
            watch,
            slot: None,
            next_id: 1,
        }
    }

    fn notify(&self, notice: Notice<'_>) {
        let message = Rendered {
            name: self.settings.identity().name(),
            notice,
        }
        .to_string();
        self.notifier.info(&message);
    }

    #[must_use]
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.slot.is_some()
    }

    #[must_use]
    pub fn status(&self) -> ClientStatus {
        match &self.slot {
            None => ClientStatus::Stopped,
            Some(active) if active.connection.is_alive() => ClientStatus::Running(active.id),
            Some(active) => ClientStatus::Exited(active.id),
        }
    }

    /// Document selector of the active connection.
    #[must_use]
    pub fn active_selector(&self) -> Option<&[DocumentFilter]> {
        self.slot
            .as_ref()
            .map(|active| active.connection.document_selector())
    }

    /// Establish a connection unless one already occupies the slot.
    pub async fn start(&mut self) -> StartOutcome {
        if let Some(active) = &self.slot {
            tracing::info!(client = %self.settings.identity().id(), id = %active.id, "start requested while running");
            let id = active.id;
            self.notify(Notice::AlreadyRunning);
            return StartOutcome::AlreadyRunning(id);
        }

        let command = self.settings.server_command();
        tracing::info!(
            client = %self.settings.identity().id(),
            command = %command.command(),
            debug = self.settings.debug_mode(),
            "starting language client"
        );

        let timeout = self.settings.init_timeout();
        let launched = match tokio::time::timeout(timeout, self.launcher.launch(&self.settings)).await
        {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout {
                method: "initialize",
                timeout,
            }
            .into()),
        };

        match launched {
            Ok(connection) => {
                let id = ClientId::new(self.next_id);
                self.next_id += 1;
                self.slot = Some(ActiveClient { id, connection });
                tracing::info!(client = %self.settings.identity().id(), %id, "language client started");
                self.notify(Notice::Started);
                StartOutcome::Started(id)
            }
            Err(e) => {
                let cause = format!("{e:#}");
                tracing::warn!(client = %self.settings.identity().id(), error = %cause, "language client failed to start");
                self.notify(Notice::StartFailed(&cause));
                StartOutcome::Failed(cause)
            }
        }
    }

    /// Shut down the active connection. The slot is empty afterwards no
    /// matter how the shutdown went.
    pub async fn stop(&mut self) -> StopOutcome {
        let Some(active) = self.slot.take() else {
            tracing::info!(client = %self.settings.identity().id(), "stop requested while not running");
            self.notify(Notice::NotRunning);
            return StopOutcome::NotRunning;
        };

        let id = active.id;
        let clean = shutdown_bounded(
            active.connection,
            self.settings.shutdown_timeout(),
            self.settings.identity().id(),
        )
        .await;

        tracing::info!(client = %self.settings.identity().id(), %id, clean, "language client stopped");
        self.notify(Notice::Stopped);
        StopOutcome::Stopped { id, clean }
    }

    /// `stop` then `start`, strictly in sequence.
    pub async fn restart(&mut self) -> RestartOutcome {
        self.notify(Notice::Restarting);
        let stop = self.stop().await;
        let start = self.start().await;
        RestartOutcome { stop, start }
    }

    /// Teardown hook for host shutdown: empties the slot and hands back the
    /// pending shutdown for the host to await. No notification is emitted.
    pub fn deactivate(&mut self) -> Option<impl Future<Output = ()> + Send + use<L, N>>
    where
        L::Connection: Send,
    {
        let active = self.slot.take()?;
        let timeout = self.settings.shutdown_timeout();
        let client = self.settings.identity().id().to_string();
        Some(async move {
            shutdown_bounded(active.connection, timeout, &client).await;
        })
    }

    /// Forward file-system events that match the watch patterns.
    ///
    /// Returns how many events reached the server; zero while stopped or
    /// after the server exited.
    pub async fn on_file_events(&mut self, events: &[FileEvent]) -> usize {
        let Some(active) = live_client(&mut self.slot) else {
            return 0;
        };
        let selected = self.watch.select(events);
        if selected.is_empty() {
            return 0;
        }
        match active.connection.did_change_watched_files(&selected).await {
            Ok(()) => selected.len(),
            Err(e) => {
                tracing::warn!(id = %active.id, error = %format!("{e:#}"), "failed to forward file events");
                0
            }
        }
    }

    /// Push a document's full text when the active connection governs it.
    pub async fn on_document_changed(&mut self, path: &Path, text: &str) -> bool {
        let Some(active) = live_client(&mut self.slot) else {
            return false;
        };
        if !self.settings.selects(FILE_SCHEME, path) {
            return false;
        }
        let Some(language_id) = self.settings.language().language_for(path) else {
            return false;
        };
        let uri = match protocol::path_to_file_uri(path) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!("Skipping document sync: {e}");
                return false;
            }
        };
        match active
            .connection
            .sync_document(uri.as_str(), language_id, text)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    id = %active.id,
                    path = %path.display(),
                    error = %format!("{e:#}"),
                    "failed to sync document"
                );
                false
            }
        }
    }
}

/// The active client, unless its server has gone away.
fn live_client<C: Connection>(slot: &mut Option<ActiveClient<C>>) -> Option<&mut ActiveClient<C>> {
    slot.as_mut().filter(|active| active.connection.is_alive())
}

/// Run a graceful shutdown under `timeout`. Returns whether the server
/// acknowledged it; the connection is consumed either way.
async fn shutdown_bounded<C: Connection>(
    connection: C,
    timeout: std::time::Duration,
    client: &str,
) -> bool {
    match tokio::time::timeout(timeout, connection.shutdown()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(client = %client, error = %format!("{e:#}"), "shutdown not acknowledged");
            false
        }
        Err(_) => {
            tracing::warn!(client = %client, ?timeout, "shutdown timed out, dropping connection");
            false
        }
    }
}
