//! Config file to running client

use std::path::PathBuf;

use swon_config::{ConfigError, load_settings_from};
use swon_lsp::{ClientController, StartOutcome};

use crate::common::{DuplexLauncher, RecordingNotifier};

fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).unwrap();
    (dir, path)
}

#[tokio::test]
async fn configured_name_appears_in_notifications() {
    let (_dir, path) = write_config(
        r#"
[client]
name = "Swon Nightly"
shutdown_timeout_secs = 1

[server.run]
command = "swon-ls"
args = ["--stdio"]
"#,
    );
    let settings = load_settings_from(&path).unwrap();
    assert_eq!(settings.server_command().args(), ["--stdio"]);

    let notifier = RecordingNotifier::default();
    let mut controller = ClientController::new(
        settings,
        DuplexLauncher::new(),
        notifier.clone(),
        std::env::temp_dir(),
    );
    assert!(matches!(controller.start().await, StartOutcome::Started(_)));
    controller.stop().await;

    assert_eq!(
        notifier.messages(),
        ["Swon Nightly started.", "Swon Nightly stopped."]
    );
}

#[test]
fn debug_flag_selects_debug_command() {
    let (_dir, path) = write_config(
        r#"
[client]
debug = true

[server.run]
command = "swon-ls"

[server.debug]
command = "swon-ls-dev"
args = ["--log-level", "trace"]
"#,
    );
    let settings = load_settings_from(&path).unwrap();
    assert!(settings.debug_mode());
    assert_eq!(settings.server_command().command(), "swon-ls-dev");
    assert_eq!(settings.launch().run().command(), "swon-ls");
}

#[test]
fn empty_server_command_is_rejected() {
    let (_dir, path) = write_config(
        r#"
[server.run]
command = ""
"#,
    );
    let err = load_settings_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
    assert_eq!(err.path(), &path);
}
