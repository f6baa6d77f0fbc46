//! File-change events forwarded to the server.
//!
//! The host owns the actual file-system watcher; it reports events here and
//! the controller decides, via [`WatchFilter`], which ones the server sees.

use std::path::{Path, PathBuf};

use swon_types::WatchPatterns;

/// Kind of change, numbered as in `FileChangeType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileChangeKind {
    Created,
    Changed,
    Deleted,
}

impl FileChangeKind {
    #[must_use]
    pub const fn as_lsp(self) -> u8 {
        match self {
            Self::Created => 1,
            Self::Changed => 2,
            Self::Deleted => 3,
        }
    }

    /// Parse the host's textual event name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "created" | "create" | "new" => Some(Self::Created),
            "changed" | "change" | "modified" => Some(Self::Changed),
            "deleted" | "delete" | "removed" => Some(Self::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    path: PathBuf,
    kind: FileChangeKind,
}

impl FileEvent {
    #[must_use]
    pub fn new(path: PathBuf, kind: FileChangeKind) -> Self {
        Self { path, kind }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn kind(&self) -> FileChangeKind {
        self.kind
    }
}

/// Selects the events the server registered interest in.
///
/// Paths are matched both as given and relative to the workspace root, so
/// root-anchored globs like `src/*.swon` work alongside `**/*.swon`.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    patterns: WatchPatterns,
    root: PathBuf,
}

impl WatchFilter {
    #[must_use]
    pub fn new(patterns: WatchPatterns, root: PathBuf) -> Self {
        Self { patterns, root }
    }

    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        if self.patterns.is_match(path) {
            return true;
        }
        path.strip_prefix(&self.root)
            .is_ok_and(|relative| self.patterns.is_match(relative))
    }

    /// Keep only the events that match, preserving order.
    #[must_use]
    pub fn select(&self, events: &[FileEvent]) -> Vec<FileEvent> {
        events
            .iter()
            .filter(|event| self.matches(event.path()))
            .cloned()
            .collect()
    }
}
