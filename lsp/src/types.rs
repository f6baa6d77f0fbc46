//! Public types consumed by the host integration.
//!
//! The host supplies a [`Notifier`], calls the controller's operations and
//! reads back [`StartOutcome`] / [`StopOutcome`] / [`ClientStatus`].

use std::fmt;

/// Sink for user-visible messages.
///
/// Only informational messages are required; every lifecycle operation
/// emits exactly one (restart emits its own plus those of stop and start).
pub trait Notifier {
    fn info(&self, message: &str);
}

impl<F: Fn(&str)> Notifier for F {
    fn info(&self, message: &str) {
        self(message);
    }
}

/// Identity of one established connection.
///
/// Allocated by the controller; a restart always yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

impl ClientId {
    pub(crate) const fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(ClientId),
    /// A connection already occupies the slot; nothing was launched.
    AlreadyRunning(ClientId),
    /// Spawn or handshake failed; the slot is still empty.
    Failed(String),
}

impl StartOutcome {
    #[must_use]
    pub fn client_id(&self) -> Option<ClientId> {
        match self {
            Self::Started(id) | Self::AlreadyRunning(id) => Some(*id),
            Self::Failed(_) => None,
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The slot was emptied. `clean` is false when the server did not
    /// acknowledge shutdown in time.
    Stopped { id: ClientId, clean: bool },
    NotRunning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartOutcome {
    pub stop: StopOutcome,
    pub start: StartOutcome,
}

/// Read-only view of the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    Stopped,
    Running(ClientId),
    /// The slot holds a connection whose server has gone away; `stop` or
    /// `restart` clears it.
    Exited(ClientId),
}

impl ClientStatus {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running(_) => "running",
            Self::Exited(_) => "exited",
        }
    }
}
