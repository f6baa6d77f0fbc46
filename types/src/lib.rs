//! Core settings types for the Swon language client.
//!
//! This crate contains validated configuration types with no IO and no async.
//! Everything here can be used from any layer of the client.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod settings;

pub use settings::{
    ClientIdentity, ClientSettings, DEFAULT_INIT_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT, DocumentFilter,
    DocumentLanguage, LaunchOptions, ServerCommand, SettingsError, TransportKind, WatchPatterns,
};

/// Environment variable patterns that are never forwarded to a spawned
/// language server.
///
/// Patterns support a leading and/or trailing `*` and are matched against
/// the upper-cased variable name.
pub const ENV_SECRET_DENYLIST: &[&str] = &[
    "*_API_KEY",
    "*_SECRET",
    "*_SECRET_KEY",
    "*_TOKEN",
    "*_PASSWORD",
    "*_CREDENTIAL*",
    "AWS_*",
    "GITHUB_TOKEN",
];
