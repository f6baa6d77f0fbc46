//! Text commands read from stdin.

use std::path::{Path, PathBuf};

use swon_lsp::{FileChangeKind, FileEvent};

const USAGE: &str = "commands: start | stop | restart | status | open <path> | \
                         created|changed|deleted <path> | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Start,
    Stop,
    Restart,
    Status,
    /// Read the file and push its text to the server.
    Open(PathBuf),
    FileChanged(FileEvent),
    Quit,
}

impl HostCommand {
    /// Parse one input line. Relative paths are resolved against `root`.
    ///
    /// `Ok(None)` for blank lines; `Err` carries a message for the user.
    pub fn parse(line: &str, root: &Path) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "stop" => Self::Stop,
            "restart" => Self::Restart,
            "status" => Self::Status,
            "quit" | "exit" => Self::Quit,
            "open" => Self::Open(path_arg(word, rest, root)?),
            other => match FileChangeKind::parse(other) {
                Some(kind) => Self::FileChanged(FileEvent::new(path_arg(word, rest, root)?, kind)),
                None => return Err(format!("unknown command `{word}`; {USAGE}")),
            },
        };
        Ok(Some(command))
    }
}

fn path_arg(word: &str, rest: &str, root: &Path) -> Result<PathBuf, String> {
    if rest.is_empty() {
        return Err(format!("`{word}` needs a path"));
    }
    Ok(root.join(rest))
}
