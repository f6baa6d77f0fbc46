//! Shared test utilities and fixtures
//!
//! In-memory language servers wired to real `ServerConnection`s.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use swon_lsp::codec::{MessageReader, MessageWriter};
use swon_lsp::{Launcher, Notifier, ServerConnection};
use swon_types::ClientSettings;
use tokio::io::DuplexStream;

/// Collects notifications in order.
#[derive(Clone, Default)]
pub struct RecordingNotifier(Arc<Mutex<Vec<String>>>);

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.0.lock().unwrap().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn info(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

/// Launches a scripted server task per connection over `tokio::io::duplex`.
///
/// Every message a server receives is logged as `"#<launch> <method>"`.
#[derive(Clone)]
pub struct DuplexLauncher {
    log: Arc<Mutex<Vec<String>>>,
    reject_next: Arc<AtomicBool>,
    mute_next: Arc<AtomicBool>,
    silent_shutdown: Arc<AtomicBool>,
    launches: Arc<AtomicUsize>,
    root: PathBuf,
}

impl DuplexLauncher {
    pub fn new() -> Self {
        Self {
            log: Arc::default(),
            reject_next: Arc::default(),
            mute_next: Arc::default(),
            silent_shutdown: Arc::default(),
            launches: Arc::default(),
            root: std::env::temp_dir(),
        }
    }

    /// The next server answers `initialize` with an error.
    pub fn reject_next_initialize(&self) {
        self.reject_next.store(true, Ordering::SeqCst);
    }

    /// The next server never answers `initialize`.
    pub fn mute_next_initialize(&self) {
        self.mute_next.store(true, Ordering::SeqCst);
    }

    /// Servers stop answering `shutdown`.
    pub fn ignore_shutdown(&self) {
        self.silent_shutdown.store(true, Ordering::SeqCst);
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Messages seen by launch `index`, method names only.
    pub fn methods_of(&self, index: usize) -> Vec<String> {
        let prefix = format!("#{index} ");
        self.log()
            .into_iter()
            .filter_map(|entry| entry.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.log().iter().position(|e| e == entry)
    }
}

impl Launcher for DuplexLauncher {
    type Connection = ServerConnection;

    async fn launch(&self, settings: &ClientSettings) -> Result<ServerConnection> {
        let index = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        let script = Script {
            index,
            reject_initialize: self.reject_next.swap(false, Ordering::SeqCst),
            answer_initialize: !self.mute_next.swap(false, Ordering::SeqCst),
            answer_shutdown: !self.silent_shutdown.load(Ordering::SeqCst),
            log: self.log.clone(),
        };

        let (client, server) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client);
        tokio::spawn(script.run(server));

        ServerConnection::establish(client_read, client_write, None, settings, &self.root).await
    }
}

struct Script {
    index: usize,
    reject_initialize: bool,
    answer_initialize: bool,
    answer_shutdown: bool,
    log: Arc<Mutex<Vec<String>>>,
}

impl Script {
    async fn run(self, stream: DuplexStream) {
        let (read, write) = tokio::io::split(stream);
        let mut reader = MessageReader::new(read);
        let mut writer = MessageWriter::new(write);

        while let Ok(Some(message)) = reader.read_message().await {
            let method = message["method"].as_str().unwrap_or_default().to_string();
            self.log
                .lock()
                .unwrap()
                .push(format!("#{} {method}", self.index));

            let reply = match method.as_str() {
                "initialize" if !self.answer_initialize => None,
                "initialize" if self.reject_initialize => Some(serde_json::json!({
                    "jsonrpc": "2.0", "id": message["id"],
                    "error": {"code": -32603, "message": "workspace is not a Swon project"}
                })),
                "initialize" => Some(serde_json::json!({
                    "jsonrpc": "2.0", "id": message["id"],
                    "result": {"capabilities": {"textDocumentSync": 1}, "serverInfo": {"name": "swon-ls"}}
                })),
                "shutdown" if self.answer_shutdown => Some(serde_json::json!({
                    "jsonrpc": "2.0", "id": message["id"], "result": null
                })),
                _ => None,
            };
            if let Some(reply) = reply
                && writer.write_message(&reply).await.is_err()
            {
                break;
            }
        }
    }
}
