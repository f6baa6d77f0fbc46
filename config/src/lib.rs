//! Configuration loading for the Swon language client.
//!
//! The config file lives at `~/.swon/config.toml`. Every section is
//! optional; anything left out falls back to the built-in defaults in
//! [`ClientSettings::default`].
//!
//! ```toml
//! [client]
//! id = "swon-ls"
//! name = "Swon Language Server"
//! debug = false
//! init_timeout_secs = 30
//! shutdown_timeout_secs = 5
//! language_id = "swon"
//! file_extensions = ["swon"]
//! watch = ["**/*.swon"]
//!
//! [server.run]
//! command = "swon-ls"
//!
//! [server.debug]
//! command = "${SWON_DEV}/target/debug/swon-ls"
//!
//! [[document_selector]]
//! scheme = "file"
//! language = "swon"
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use swon_types::{
    ClientIdentity, ClientSettings, DocumentFilter, DocumentLanguage, LaunchOptions,
    ServerCommand, SettingsError, WatchPatterns,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config at {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        source: SettingsError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path,
        }
    }
}

/// Raw `config.toml` contents, before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwonConfig {
    pub client: Option<ClientSection>,
    pub server: Option<ServerSection>,
    pub document_selector: Option<Vec<DocumentFilter>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSection {
    pub id: Option<String>,
    pub name: Option<String>,
    /// Launch the server with the `[server.debug]` parameters.
    #[serde(default)]
    pub debug: bool,
    pub init_timeout_secs: Option<u64>,
    pub shutdown_timeout_secs: Option<u64>,
    pub language_id: Option<String>,
    pub file_extensions: Option<Vec<String>>,
    /// Globs for file changes forwarded to the server.
    pub watch: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub run: Option<ServerCommand>,
    pub debug: Option<ServerCommand>,
}

impl SwonConfig {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    /// Resolve into validated settings, filling gaps with defaults.
    pub fn resolve(self) -> Result<ClientSettings, SettingsError> {
        let defaults = ClientSettings::default();
        let client = self.client.unwrap_or_default();
        let server = self.server.unwrap_or_default();

        let identity = match (client.id, client.name) {
            (None, None) => defaults.identity().clone(),
            (id, name) => ClientIdentity::new(
                id.unwrap_or_else(|| defaults.identity().id().to_string()),
                name.unwrap_or_else(|| defaults.identity().name().to_string()),
            )?,
        };

        let run = match server.run {
            Some(cmd) => expand_command(&cmd)?,
            None => defaults.launch().run().clone(),
        };
        let debug = server.debug.as_ref().map(expand_command).transpose()?;
        let launch = LaunchOptions::new(run, debug);

        let language = match (client.language_id, client.file_extensions) {
            (None, None) => defaults.language().clone(),
            (language_id, extensions) => {
                let language_id =
                    language_id.unwrap_or_else(|| defaults.language().language_id().to_string());
                let extensions = extensions.unwrap_or_else(|| vec![language_id.clone()]);
                DocumentLanguage::new(language_id, extensions)?
            }
        };

        let watch = match client.watch {
            Some(patterns) => WatchPatterns::new(patterns)?,
            None => defaults.watch().clone(),
        };

        let init_timeout = client
            .init_timeout_secs
            .map_or(defaults.init_timeout(), Duration::from_secs);
        let shutdown_timeout = client
            .shutdown_timeout_secs
            .map_or(defaults.shutdown_timeout(), Duration::from_secs);

        let mut settings = defaults
            .with_identity(identity)
            .with_launch(launch)
            .with_debug_mode(client.debug)
            .with_language(language)
            .with_watch(watch)
            .with_timeouts(init_timeout, shutdown_timeout)?;

        if let Some(selector) = self.document_selector {
            settings = settings.with_document_selector(selector)?;
        }

        Ok(settings)
    }
}

/// Load and resolve the user's settings, or the defaults when no config
/// file exists.
pub fn load_settings() -> Result<ClientSettings, ConfigError> {
    match config_path() {
        Some(path) => load_settings_or_default(&path),
        None => Ok(ClientSettings::default()),
    }
}

fn load_settings_or_default(path: &Path) -> Result<ClientSettings, ConfigError> {
    if path.exists() {
        load_settings_from(path)
    } else {
        Ok(ClientSettings::default())
    }
}

pub fn load_settings_from(path: &Path) -> Result<ClientSettings, ConfigError> {
    SwonConfig::load_from(path)?
        .resolve()
        .map_err(|source| ConfigError::Invalid {
            path: path.to_path_buf(),
            source,
        })
}

fn expand_command(cmd: &ServerCommand) -> Result<ServerCommand, SettingsError> {
    ServerCommand::new(
        expand_env_vars(cmd.command()),
        cmd.args().iter().map(|arg| expand_env_vars(arg)).collect(),
        cmd.transport(),
    )
}

/// Replace `${VAR}` references with the variable's value (empty if unset).
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut i = 0;

    while i < value.len() {
        if value[i..].starts_with("${") {
            let start = i + 2;
            if let Some(end_rel) = value[start..].find('}') {
                let end = start + end_rel;
                let var = &value[start..end];
                if !var.is_empty() {
                    let replacement = env::var(var).unwrap_or_default();
                    out.push_str(&replacement);
                }
                i = end + 1;
                continue;
            }
        }

        let Some(ch) = value[i..].chars().next() else {
            break;
        };
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".swon").join("config.toml"))
}
