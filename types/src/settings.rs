//! Resolved client settings shared across crates.
//!
//! These types represent fully-validated, resolved configuration state.
//! Raw TOML deserialization structs stay private here and in `swon-config`;
//! the loader resolves them into these types at the parse boundary.
//!
//! Existence of a value is the proof of its validity.

use std::path::Path;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("server command must not be empty")]
    EmptyCommand,
    #[error("client {0} must not be empty")]
    EmptyIdentity(&'static str),
    #[error("document filter needs a scheme or a language")]
    EmptyFilter,
    #[error("language_id must not be empty")]
    EmptyLanguageId,
    #[error("document selector must not be empty")]
    EmptySelector,
    #[error("{0} timeout must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("invalid watch pattern '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },
}

/// How bytes travel between the client and the language server.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Duplex byte stream over the child's stdin/stdout.
    #[default]
    Stdio,
}

impl TransportKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
        }
    }
}

#[derive(Deserialize)]
struct RawServerCommand {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    transport: TransportKind,
}

/// Validated launch parameters for one language server process.
///
/// Invariant: `command` is non-empty (enforced via `#[serde(try_from)]`).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawServerCommand")]
pub struct ServerCommand {
    command: String,
    args: Vec<String>,
    transport: TransportKind,
}

impl TryFrom<RawServerCommand> for ServerCommand {
    type Error = SettingsError;

    fn try_from(raw: RawServerCommand) -> Result<Self, Self::Error> {
        Self::new(raw.command, raw.args, raw.transport)
    }
}

impl ServerCommand {
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        transport: TransportKind,
    ) -> Result<Self, SettingsError> {
        let command = command.into();
        if command.trim().is_empty() {
            return Err(SettingsError::EmptyCommand);
        }
        Ok(Self {
            command,
            args,
            transport,
        })
    }

    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn transport(&self) -> TransportKind {
        self.transport
    }
}

/// Production launch parameters plus an optional debug override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    run: ServerCommand,
    debug: Option<ServerCommand>,
}

impl LaunchOptions {
    #[must_use]
    pub fn new(run: ServerCommand, debug: Option<ServerCommand>) -> Self {
        Self { run, debug }
    }

    #[must_use]
    pub fn run(&self) -> &ServerCommand {
        &self.run
    }

    /// Debug launch parameters, falling back to the production ones.
    #[must_use]
    pub fn debug(&self) -> &ServerCommand {
        self.debug.as_ref().unwrap_or(&self.run)
    }

    #[must_use]
    pub fn select(&self, debug_mode: bool) -> &ServerCommand {
        if debug_mode { self.debug() } else { self.run() }
    }
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            run: ServerCommand {
                command: String::from("swon-ls"),
                args: Vec::new(),
                transport: TransportKind::Stdio,
            },
            debug: None,
        }
    }
}

/// Fixed `(id, name)` pair a client announces when connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    id: String,
    name: String,
}

impl ClientIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Result<Self, SettingsError> {
        let id = id.into();
        let name = name.into();
        if id.trim().is_empty() {
            return Err(SettingsError::EmptyIdentity("id"));
        }
        if name.trim().is_empty() {
            return Err(SettingsError::EmptyIdentity("name"));
        }
        Ok(Self { id, name })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            id: String::from("swon-ls"),
            name: String::from("Swon Language Server"),
        }
    }
}

#[derive(Deserialize)]
struct RawDocumentFilter {
    scheme: Option<String>,
    language: Option<String>,
}

/// Selects the documents a connection governs, by storage scheme and
/// language. A missing field matches anything.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawDocumentFilter")]
pub struct DocumentFilter {
    scheme: Option<String>,
    language: Option<String>,
}

impl TryFrom<RawDocumentFilter> for DocumentFilter {
    type Error = SettingsError;

    fn try_from(raw: RawDocumentFilter) -> Result<Self, Self::Error> {
        let scheme = raw.scheme.filter(|s| !s.trim().is_empty());
        let language = raw.language.filter(|l| !l.trim().is_empty());
        if scheme.is_none() && language.is_none() {
            return Err(SettingsError::EmptyFilter);
        }
        Ok(Self { scheme, language })
    }
}

impl DocumentFilter {
    #[must_use]
    pub fn new(scheme: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            scheme: Some(scheme.into()),
            language: Some(language.into()),
        }
    }

    #[must_use]
    pub fn matches(&self, scheme: &str, language: &str) -> bool {
        self.scheme.as_deref().is_none_or(|s| s == scheme)
            && self.language.as_deref().is_none_or(|l| l == language)
    }
}

/// Maps file extensions onto the LSP language identifier of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLanguage {
    language_id: String,
    file_extensions: Vec<String>,
}

impl DocumentLanguage {
    pub fn new(
        language_id: impl Into<String>,
        file_extensions: Vec<String>,
    ) -> Result<Self, SettingsError> {
        let language_id = language_id.into();
        if language_id.trim().is_empty() {
            return Err(SettingsError::EmptyLanguageId);
        }
        let file_extensions = file_extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .collect();
        Ok(Self {
            language_id,
            file_extensions,
        })
    }

    #[must_use]
    pub fn language_id(&self) -> &str {
        &self.language_id
    }

    #[must_use]
    pub fn file_extensions(&self) -> &[String] {
        &self.file_extensions
    }

    /// Language identifier for `path`, if its extension belongs to this language.
    #[must_use]
    pub fn language_for(&self, path: &Path) -> Option<&str> {
        let ext = path.extension()?.to_str()?;
        self.file_extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
            .then_some(self.language_id.as_str())
    }
}

impl Default for DocumentLanguage {
    fn default() -> Self {
        Self {
            language_id: String::from("swon"),
            file_extensions: vec![String::from("swon")],
        }
    }
}

/// Compiled file-system watch globs.
///
/// The source patterns are kept for display and for the LSP
/// registration payload; matching uses the compiled set.
#[derive(Debug, Clone)]
pub struct WatchPatterns {
    patterns: Vec<String>,
    set: GlobSet,
}

impl WatchPatterns {
    pub fn new(patterns: Vec<String>) -> Result<Self, SettingsError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            let glob = Glob::new(pattern).map_err(|e| SettingsError::InvalidGlob {
                pattern: pattern.clone(),
                reason: e.kind().to_string(),
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| SettingsError::InvalidGlob {
            pattern: patterns.join(", "),
            reason: e.to_string(),
        })?;
        Ok(Self { patterns, set })
    }

    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    #[must_use]
    pub fn is_match(&self, path: &Path) -> bool {
        self.set.is_match(path)
    }
}

impl Default for WatchPatterns {
    fn default() -> Self {
        let patterns = vec![String::from("**/*.swon")];
        let mut builder = GlobSetBuilder::new();
        if let Ok(glob) = Glob::new(&patterns[0]) {
            builder.add(glob);
        }
        let set = builder.build().unwrap_or_else(|_| GlobSet::empty());
        Self { patterns, set }
    }
}

impl PartialEq for WatchPatterns {
    fn eq(&self, other: &Self) -> bool {
        self.patterns == other.patterns
    }
}

impl Eq for WatchPatterns {}

/// Default bound on the `initialize` handshake.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on a graceful shutdown before the handle is dropped.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything the lifecycle controller needs to establish a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    identity: ClientIdentity,
    launch: LaunchOptions,
    debug_mode: bool,
    document_selector: Vec<DocumentFilter>,
    language: DocumentLanguage,
    watch: WatchPatterns,
    init_timeout: Duration,
    shutdown_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            identity: ClientIdentity::default(),
            launch: LaunchOptions::default(),
            debug_mode: false,
            document_selector: vec![DocumentFilter::new("file", "swon")],
            language: DocumentLanguage::default(),
            watch: WatchPatterns::default(),
            init_timeout: DEFAULT_INIT_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ClientSettings {
    #[must_use]
    pub fn with_identity(mut self, identity: ClientIdentity) -> Self {
        self.identity = identity;
        self
    }

    #[must_use]
    pub fn with_launch(mut self, launch: LaunchOptions) -> Self {
        self.launch = launch;
        self
    }

    #[must_use]
    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    pub fn with_document_selector(
        mut self,
        selector: Vec<DocumentFilter>,
    ) -> Result<Self, SettingsError> {
        if selector.is_empty() {
            return Err(SettingsError::EmptySelector);
        }
        self.document_selector = selector;
        Ok(self)
    }

    #[must_use]
    pub fn with_language(mut self, language: DocumentLanguage) -> Self {
        self.language = language;
        self
    }

    #[must_use]
    pub fn with_watch(mut self, watch: WatchPatterns) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_timeouts(mut self, init: Duration, shutdown: Duration) -> Result<Self, SettingsError> {
        if init.is_zero() {
            return Err(SettingsError::ZeroTimeout("init"));
        }
        if shutdown.is_zero() {
            return Err(SettingsError::ZeroTimeout("shutdown"));
        }
        self.init_timeout = init;
        self.shutdown_timeout = shutdown;
        Ok(self)
    }

    #[must_use]
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    #[must_use]
    pub fn launch(&self) -> &LaunchOptions {
        &self.launch
    }

    #[must_use]
    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    /// Launch parameters for the current mode.
    #[must_use]
    pub fn server_command(&self) -> &ServerCommand {
        self.launch.select(self.debug_mode)
    }

    #[must_use]
    pub fn document_selector(&self) -> &[DocumentFilter] {
        &self.document_selector
    }

    #[must_use]
    pub fn language(&self) -> &DocumentLanguage {
        &self.language
    }

    #[must_use]
    pub fn watch(&self) -> &WatchPatterns {
        &self.watch
    }

    #[must_use]
    pub fn init_timeout(&self) -> Duration {
        self.init_timeout
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Whether a document with this storage scheme and path is governed by
    /// the client.
    #[must_use]
    pub fn selects(&self, scheme: &str, path: &Path) -> bool {
        let Some(language) = self.language.language_for(path) else {
            return false;
        };
        self.document_selector
            .iter()
            .any(|filter| filter.matches(scheme, language))
    }
}
