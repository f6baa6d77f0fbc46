//! Language client for the Swon language server.
//!
//! [`ClientController`] holds at most one live [`ServerConnection`] and
//! exposes idempotent `start`/`stop` plus a sequential `restart`.

pub mod codec;
pub mod types;

pub(crate) mod protocol;

mod connection;
mod controller;
mod launcher;
mod watch;

pub use connection::{Connection, ConnectionError, Launcher, ServerConnection};
pub use controller::ClientController;
pub use launcher::ProcessLauncher;
pub use protocol::{PathToUriError, path_to_file_uri};
pub use types::{ClientId, ClientStatus, Notifier, RestartOutcome, StartOutcome, StopOutcome};
pub use watch::{FileChangeKind, FileEvent, WatchFilter};
