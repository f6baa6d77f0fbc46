//! JSON-RPC message shapes exchanged with the language server.
//!
//! Only the lifecycle and synchronization messages the client sends are
//! modelled; everything the server says is classified by [`Incoming`].

use std::path::{Path, PathBuf};

use serde::Serialize;
use swon_types::{ClientIdentity, WatchPatterns};

use crate::watch::FileEvent;

/// JSON-RPC "method not found".
pub(crate) const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, thiserror::Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub struct PathToUriError {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
pub(crate) struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    pub fn new(id: u64, method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// A message read from the server, classified by shape.
#[derive(Debug)]
pub(crate) enum Incoming {
    /// Reply to one of our requests.
    Response { id: u64, body: serde_json::Value },
    /// The server asking something of the client.
    Request {
        id: serde_json::Value,
        method: String,
    },
    Notification {
        method: String,
        params: Option<serde_json::Value>,
    },
}

impl Incoming {
    pub fn classify(message: &serde_json::Value) -> Option<Self> {
        let id = message.get("id");
        let method = message
            .get("method")
            .and_then(serde_json::Value::as_str)
            .map(String::from);
        let is_reply = message.get("result").is_some() || message.get("error").is_some();

        match (id, method, is_reply) {
            (Some(id), None, true) => Some(Self::Response {
                id: id.as_u64()?,
                body: message.clone(),
            }),
            (Some(id), Some(method), _) => Some(Self::Request {
                id: id.clone(),
                method,
            }),
            (None, Some(method), _) => Some(Self::Notification {
                method,
                params: message.get("params").cloned(),
            }),
            _ => None,
        }
    }
}

pub(crate) fn method_not_found(id: &serde_json::Value, method: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": METHOD_NOT_FOUND,
            "message": format!("Method not found: {method}")
        }
    })
}

/// Error message of a response body, if the server rejected the request.
pub(crate) fn response_error(body: &serde_json::Value) -> Option<String> {
    let error = body.get("error")?;
    Some(
        error
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown error")
            .to_string(),
    )
}

pub(crate) fn initialize_params(
    identity: &ClientIdentity,
    root_uri: &str,
    watch: &WatchPatterns,
) -> serde_json::Value {
    serde_json::json!({
        "processId": std::process::id(),
        "clientInfo": {
            "name": identity.name(),
            "version": env!("CARGO_PKG_VERSION")
        },
        "rootUri": root_uri,
        "capabilities": {
            "textDocument": {
                "synchronization": {
                    "dynamicRegistration": false,
                    "willSave": false,
                    "willSaveWaitUntil": false,
                    "didSave": false
                }
            },
            "workspace": {
                "didChangeWatchedFiles": {
                    "dynamicRegistration": false,
                    "relativePatternSupport": false
                }
            }
        },
        "initializationOptions": {
            "clientId": identity.id(),
            "watch": watch.patterns()
        },
        "workspaceFolders": [{
            "uri": root_uri,
            "name": "workspace"
        }]
    })
}

pub(crate) fn did_open_params(
    uri: &str,
    language_id: &str,
    version: i32,
    text: &str,
) -> serde_json::Value {
    serde_json::json!({
        "textDocument": {
            "uri": uri,
            "languageId": language_id,
            "version": version,
            "text": text
        }
    })
}

pub(crate) fn did_change_params(uri: &str, version: i32, text: &str) -> serde_json::Value {
    serde_json::json!({
        "textDocument": {
            "uri": uri,
            "version": version
        },
        "contentChanges": [{
            "text": text
        }]
    })
}

pub(crate) fn did_change_watched_files_params(
    events: &[FileEvent],
) -> Result<serde_json::Value, PathToUriError> {
    let changes = events
        .iter()
        .map(|event| {
            Ok(serde_json::json!({
                "uri": path_to_file_uri(event.path())?.as_str(),
                "type": event.kind().as_lsp(),
            }))
        })
        .collect::<Result<Vec<_>, PathToUriError>>()?;
    Ok(serde_json::json!({ "changes": changes }))
}

pub fn path_to_file_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}
