//! A live connection to the language server.
//!
//! [`ServerConnection`] owns the transport tasks (one reader, one writer)
//! and the child process when there is one. Holding a value is proof that
//! the `initialize` handshake succeeded; `shutdown` consumes it.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use swon_types::{ClientSettings, DocumentFilter};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::codec::{MessageReader, MessageWriter};
use crate::protocol::{self, Incoming, Notification, Request};
use crate::watch::FileEvent;

/// How long the child gets to exit after `exit` before it is killed.
const EXIT_GRACE: Duration = Duration::from_secs(2);

const WRITER_CHANNEL_CAPACITY: usize = 64;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>>;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("{method} request timed out after {timeout:?}")]
    Timeout {
        method: &'static str,
        timeout: Duration,
    },
    #[error("server rejected {method}: {message}")]
    Rejected {
        method: &'static str,
        message: String,
    },
    #[error("connection to the server is closed")]
    Closed,
}

/// The operations the lifecycle controller needs from a connection.
pub trait Connection {
    /// Documents this connection governs.
    fn document_selector(&self) -> &[DocumentFilter];

    /// False once the server's output stream has closed.
    fn is_alive(&self) -> bool;

    /// Push the full text of a document (`didOpen` first, then `didChange`).
    fn sync_document(
        &mut self,
        uri: &str,
        language_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn did_change_watched_files(
        &mut self,
        events: &[FileEvent],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Graceful shutdown. `Err` means the server did not acknowledge it;
    /// the connection is gone either way.
    fn shutdown(self) -> impl Future<Output = Result<()>> + Send;
}

/// Establishes connections. The controller calls this only while its slot
/// is empty.
pub trait Launcher {
    type Connection: Connection;

    fn launch(
        &self,
        settings: &ClientSettings,
    ) -> impl Future<Output = Result<Self::Connection>> + Send;
}

enum WriterCommand {
    Send(serde_json::Value),
    Close,
}

pub struct ServerConnection {
    name: String,
    child: Option<Child>,
    writer_tx: mpsc::Sender<WriterCommand>,
    next_id: u64,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
    selector: Vec<DocumentFilter>,
    request_timeout: Duration,
    /// Last version sent per open document URI.
    versions: HashMap<String, i32>,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
}

impl ServerConnection {
    /// Wire up the transport and run the `initialize` handshake.
    ///
    /// `child` is the server process behind the streams, if any; it is
    /// killed when the connection is dropped.
    pub async fn establish<R, W>(
        reader: R,
        writer: W,
        child: Option<Child>,
        settings: &ClientSettings,
        workspace_root: &Path,
    ) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let name = settings.identity().name().to_string();
        let pending = PendingMap::default();
        let alive = Arc::new(AtomicBool::new(true));

        let (writer_tx, writer_rx) = mpsc::channel(WRITER_CHANNEL_CAPACITY);
        let writer_handle = tokio::spawn(write_loop(
            MessageWriter::new(writer),
            writer_rx,
            name.clone(),
        ));
        let reader_handle = tokio::spawn(read_loop(
            MessageReader::new(reader),
            pending.clone(),
            writer_tx.clone(),
            alive.clone(),
            name.clone(),
        ));

        let mut connection = Self {
            name,
            child,
            writer_tx,
            next_id: 1,
            pending,
            alive,
            selector: settings.document_selector().to_vec(),
            request_timeout: settings.init_timeout(),
            versions: HashMap::new(),
            reader_handle,
            writer_handle,
        };

        connection
            .initialize(settings, workspace_root)
            .await
            .context("initialize handshake")?;
        Ok(connection)
    }

    async fn initialize(&mut self, settings: &ClientSettings, workspace_root: &Path) -> Result<()> {
        let root_uri = protocol::path_to_file_uri(workspace_root)
            .context("converting workspace root to URI")?;
        let params = protocol::initialize_params(settings.identity(), root_uri.as_str(), settings.watch());

        let response = self.send_request("initialize", Some(params)).await?;
        if let Some(message) = protocol::response_error(&response) {
            return Err(ConnectionError::Rejected {
                method: "initialize",
                message,
            }
            .into());
        }
        tracing::debug!(
            client = %self.name,
            server = ?response["result"]["serverInfo"]["name"].as_str(),
            "initialize acknowledged"
        );

        self.send_notification("initialized", Some(serde_json::json!({})))
            .await
    }

    async fn send_request(
        &mut self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let frame = serde_json::to_value(Request::new(id, method, params))
            .context("serializing request")?;
        if self
            .writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            return Err(ConnectionError::Closed.into());
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&id);
                Err(ConnectionError::Closed.into())
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(ConnectionError::Timeout {
                    method,
                    timeout: self.request_timeout,
                }
                .into())
            }
        }
    }

    async fn send_notification(
        &self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> Result<()> {
        let frame = serde_json::to_value(Notification::new(method, params))
            .context("serializing notification")?;
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| ConnectionError::Closed)?;
        Ok(())
    }

    async fn reap_child(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if tokio::time::timeout(EXIT_GRACE, child.wait()).await.is_err() {
            tracing::debug!(client = %self.name, "server didn't exit in time, killing");
            let _ = child.kill().await;
        }
    }
}

impl Connection for ServerConnection {
    fn document_selector(&self) -> &[DocumentFilter] {
        &self.selector
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn sync_document(&mut self, uri: &str, language_id: &str, text: &str) -> Result<()> {
        if let Some(version) = self.versions.get_mut(uri) {
            *version += 1;
            let params = protocol::did_change_params(uri, *version, text);
            self.send_notification("textDocument/didChange", Some(params))
                .await
        } else {
            self.versions.insert(uri.to_string(), 1);
            let params = protocol::did_open_params(uri, language_id, 1, text);
            self.send_notification("textDocument/didOpen", Some(params))
                .await
        }
    }

    async fn did_change_watched_files(&mut self, events: &[FileEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let params = protocol::did_change_watched_files_params(events)?;
        self.send_notification("workspace/didChangeWatchedFiles", Some(params))
            .await
    }

    async fn shutdown(mut self) -> Result<()> {
        let acknowledged = if self.is_alive() {
            match self.send_request("shutdown", None).await {
                Ok(response) => match protocol::response_error(&response) {
                    None => {
                        let _ = self.send_notification("exit", None).await;
                        Ok(())
                    }
                    Some(message) => Err(ConnectionError::Rejected {
                        method: "shutdown",
                        message,
                    }
                    .into()),
                },
                Err(e) => Err(e),
            }
        } else {
            Err(ConnectionError::Closed.into())
        };

        // Let the writer flush `exit` and close stdin before tearing down.
        let _ = self.writer_tx.send(WriterCommand::Close).await;
        let _ = tokio::time::timeout(EXIT_GRACE, &mut self.writer_handle).await;
        self.reap_child().await;
        self.alive.store(false, Ordering::SeqCst);

        acknowledged
    }
}

impl Drop for ServerConnection {
    fn drop(&mut self) {
        // The child (if still present) has kill_on_drop set.
        self.reader_handle.abort();
        self.writer_handle.abort();
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: MessageWriter<W>,
    mut commands: mpsc::Receiver<WriterCommand>,
    name: String,
) {
    while let Some(command) = commands.recv().await {
        match command {
            WriterCommand::Send(message) => {
                if let Err(e) = writer.write_message(&message).await {
                    tracing::warn!(client = %name, error = %e, "transport write failed");
                    break;
                }
            }
            WriterCommand::Close => {
                let _ = writer.close().await;
                break;
            }
        }
    }
}

async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: MessageReader<R>,
    pending: PendingMap,
    writer_tx: mpsc::Sender<WriterCommand>,
    alive: Arc<AtomicBool>,
    name: String,
) {
    loop {
        match reader.read_message().await {
            Ok(Some(message)) => dispatch(&message, &pending, &writer_tx, &name).await,
            Ok(None) => {
                tracing::info!(client = %name, "server closed its output");
                break;
            }
            Err(e) => {
                tracing::warn!(client = %name, error = %e, "transport read failed");
                break;
            }
        }
    }
    alive.store(false, Ordering::SeqCst);
    // Dropping the senders wakes every waiter with `Closed`.
    pending.lock().await.clear();
}

async fn dispatch(
    message: &serde_json::Value,
    pending: &Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>,
    writer_tx: &mpsc::Sender<WriterCommand>,
    name: &str,
) {
    let Some(incoming) = Incoming::classify(message) else {
        tracing::trace!(client = %name, "ignoring malformed message");
        return;
    };

    match incoming {
        Incoming::Response { id, body } => {
            let waiter = pending.lock().await.remove(&id);
            if let Some(tx) = waiter {
                let _ = tx.send(body);
            }
        }
        Incoming::Request { id, method } => {
            // Unanswered requests can stall the server.
            tracing::debug!(client = %name, %method, "server request not supported");
            let reply = protocol::method_not_found(&id, &method);
            let _ = writer_tx.send(WriterCommand::Send(reply)).await;
        }
        Incoming::Notification { method, params } => match method.as_str() {
            "window/logMessage" | "window/showMessage" => {
                let text = params
                    .as_ref()
                    .and_then(|p| p.get("message"))
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default();
                tracing::debug!(client = %name, %method, "{text}");
            }
            _ => tracing::trace!(client = %name, %method, "ignoring notification"),
        },
    }
}
