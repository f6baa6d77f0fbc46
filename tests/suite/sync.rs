//! Document sync and file-watch forwarding

use std::path::PathBuf;
use std::time::Duration;

use swon_lsp::{ClientController, FileChangeKind, FileEvent};
use swon_types::ClientSettings;

use crate::common::{DuplexLauncher, RecordingNotifier};

fn controller(root: PathBuf) -> (ClientController<DuplexLauncher, RecordingNotifier>, DuplexLauncher) {
    let launcher = DuplexLauncher::new();
    let settings = ClientSettings::default()
        .with_timeouts(Duration::from_secs(2), Duration::from_millis(300))
        .unwrap();
    let controller = ClientController::new(settings, launcher.clone(), RecordingNotifier::default(), root);
    (controller, launcher)
}

#[tokio::test]
async fn nothing_is_forwarded_while_stopped() {
    let root = std::env::temp_dir();
    let (mut controller, launcher) = controller(root.clone());

    let event = FileEvent::new(root.join("a.swon"), FileChangeKind::Created);
    assert_eq!(controller.on_file_events(&[event]).await, 0);
    assert!(!controller.on_document_changed(&root.join("a.swon"), "a = 1").await);
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn documents_open_then_change() {
    let root = std::env::temp_dir();
    let (mut controller, launcher) = controller(root.clone());
    controller.start().await;

    let doc = root.join("main.swon");
    assert!(controller.on_document_changed(&doc, "a = 1").await);
    assert!(controller.on_document_changed(&doc, "a = 2").await);
    assert!(!controller.on_document_changed(&root.join("main.json"), "{}").await);
    controller.stop().await;

    let methods = launcher.methods_of(1);
    assert_eq!(
        methods[2..5],
        ["textDocument/didOpen", "textDocument/didChange", "shutdown"]
    );
}

#[tokio::test]
async fn matching_file_events_reach_the_server() {
    let root = std::env::temp_dir();
    let (mut controller, launcher) = controller(root.clone());
    controller.start().await;

    let events = [
        FileEvent::new(root.join("nested/lib.swon"), FileChangeKind::Changed),
        FileEvent::new(root.join("README.md"), FileChangeKind::Changed),
        FileEvent::new(root.join("old.swon"), FileChangeKind::Deleted),
    ];
    assert_eq!(controller.on_file_events(&events).await, 2);
    assert_eq!(controller.on_file_events(&events[1..2]).await, 0);
    controller.stop().await;

    let forwarded = launcher
        .methods_of(1)
        .iter()
        .filter(|m| *m == "workspace/didChangeWatchedFiles")
        .count();
    assert_eq!(forwarded, 1);
}
