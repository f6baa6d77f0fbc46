//! Start / stop / restart against scripted servers

use std::path::PathBuf;
use std::time::Duration;

use swon_lsp::{ClientController, ClientStatus, ProcessLauncher, StartOutcome, StopOutcome};
use swon_types::{ClientSettings, LaunchOptions, ServerCommand, TransportKind};

use crate::common::{DuplexLauncher, RecordingNotifier};

type Controller = ClientController<DuplexLauncher, RecordingNotifier>;

fn settings() -> ClientSettings {
    ClientSettings::default()
        .with_timeouts(Duration::from_secs(2), Duration::from_millis(300))
        .unwrap()
}

fn controller() -> (Controller, DuplexLauncher, RecordingNotifier) {
    let launcher = DuplexLauncher::new();
    let notifier = RecordingNotifier::default();
    let controller = ClientController::new(
        settings(),
        launcher.clone(),
        notifier.clone(),
        PathBuf::from("/work"),
    );
    (controller, launcher, notifier)
}

#[tokio::test]
async fn start_from_empty_runs_handshake() {
    let (mut controller, launcher, notifier) = controller();

    let outcome = controller.start().await;
    let id = outcome.client_id().unwrap();
    assert_eq!(outcome, StartOutcome::Started(id));
    assert_eq!(controller.status(), ClientStatus::Running(id));
    assert_eq!(notifier.messages(), ["Swon Language Server started."]);
    assert_eq!(
        controller.active_selector(),
        Some(settings().document_selector())
    );
    assert_eq!(launcher.methods_of(1).first().map(String::as_str), Some("initialize"));
}

#[tokio::test]
async fn start_while_running_launches_nothing() {
    let (mut controller, launcher, notifier) = controller();
    let first = controller.start().await.client_id().unwrap();

    assert_eq!(controller.start().await, StartOutcome::AlreadyRunning(first));
    assert_eq!(launcher.launches(), 1);
    assert_eq!(
        notifier.last().as_deref(),
        Some("Swon Language Server is already running.")
    );
}

#[tokio::test]
async fn stop_shuts_server_down() {
    let (mut controller, launcher, notifier) = controller();
    let id = controller.start().await.client_id().unwrap();

    assert_eq!(controller.stop().await, StopOutcome::Stopped { id, clean: true });
    assert_eq!(controller.status(), ClientStatus::Stopped);
    assert_eq!(controller.active_selector(), None);
    assert_eq!(notifier.last().as_deref(), Some("Swon Language Server stopped."));
    assert_eq!(
        launcher.methods_of(1)[..3],
        ["initialize", "initialized", "shutdown"]
    );
}

#[tokio::test]
async fn stop_while_stopped_is_a_no_op() {
    let (mut controller, launcher, notifier) = controller();

    assert_eq!(controller.stop().await, StopOutcome::NotRunning);
    assert_eq!(controller.stop().await, StopOutcome::NotRunning);
    assert_eq!(launcher.launches(), 0);
    assert!(launcher.log().is_empty());
    assert_eq!(
        notifier.messages(),
        [
            "Swon Language Server is not running.",
            "Swon Language Server is not running.",
        ]
    );
}

#[tokio::test]
async fn restart_stops_before_starting() {
    let (mut controller, launcher, notifier) = controller();
    let before = controller.start().await.client_id().unwrap();

    let outcome = controller.restart().await;
    assert_eq!(outcome.stop, StopOutcome::Stopped { id: before, clean: true });
    let after = outcome.start.client_id().unwrap();
    assert_ne!(before, after);
    assert_eq!(controller.status(), ClientStatus::Running(after));

    assert_eq!(
        notifier.messages()[1..],
        [
            "Restarting Swon Language Server...",
            "Swon Language Server stopped.",
            "Swon Language Server started.",
        ]
    );
    let old_shutdown = launcher.position("#1 shutdown").unwrap();
    let new_initialize = launcher.position("#2 initialize").unwrap();
    assert!(old_shutdown < new_initialize, "log: {:?}", launcher.log());
}

#[tokio::test]
async fn rejected_handshake_leaves_slot_empty_until_retry() {
    let (mut controller, launcher, notifier) = controller();
    launcher.reject_next_initialize();

    let outcome = controller.start().await;
    assert!(outcome.is_failure());
    assert!(!controller.is_running());
    let message = notifier.last().unwrap();
    assert!(message.starts_with("Failed to start Swon Language Server: "));
    assert!(message.contains("workspace is not a Swon project"), "{message}");

    assert!(matches!(controller.start().await, StartOutcome::Started(_)));
    assert_eq!(launcher.launches(), 2);
}

#[tokio::test]
async fn silent_handshake_times_out_until_retry() {
    let (mut controller, launcher, notifier) = controller();
    launcher.mute_next_initialize();

    let outcome = tokio::time::timeout(Duration::from_secs(10), controller.start())
        .await
        .expect("start is bounded by the init timeout");
    assert!(outcome.is_failure());
    assert_eq!(controller.status(), ClientStatus::Stopped);
    let message = notifier.last().unwrap();
    assert!(message.starts_with("Failed to start Swon Language Server: "));
    assert!(message.contains("initialize request timed out"), "{message}");

    assert!(matches!(controller.start().await, StartOutcome::Started(_)));
    assert_eq!(launcher.launches(), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn real_process_that_never_answers_is_abandoned() {
    let command = ServerCommand::new("sleep", vec!["100".to_string()], TransportKind::Stdio).unwrap();
    let settings = ClientSettings::default()
        .with_launch(LaunchOptions::new(command, None))
        .with_timeouts(Duration::from_millis(400), Duration::from_millis(300))
        .unwrap();
    let root = std::env::temp_dir();
    let notifier = RecordingNotifier::default();
    let mut controller = ClientController::new(
        settings,
        ProcessLauncher::new(root.clone()),
        notifier.clone(),
        root,
    );

    let started = std::time::Instant::now();
    let outcome = controller.start().await;
    assert!(started.elapsed() < Duration::from_secs(5));
    let StartOutcome::Failed(cause) = outcome else {
        panic!("silent server must not start");
    };
    assert!(cause.contains("initialize request timed out"), "{cause}");
    assert!(!controller.is_running());
    assert_eq!(
        notifier.last().as_deref(),
        Some(format!("Failed to start Swon Language Server: {cause}").as_str())
    );
}

#[cfg(unix)]
#[tokio::test]
async fn real_process_that_exits_immediately_fails_to_start() {
    let command = ServerCommand::new("true", Vec::new(), TransportKind::Stdio).unwrap();
    let settings = ClientSettings::default()
        .with_launch(LaunchOptions::new(command, None))
        .with_timeouts(Duration::from_secs(2), Duration::from_millis(300))
        .unwrap();
    let root = std::env::temp_dir();
    let mut controller = ClientController::new(
        settings,
        ProcessLauncher::new(root.clone()),
        RecordingNotifier::default(),
        root,
    );

    assert!(controller.start().await.is_failure());
    assert_eq!(controller.status(), ClientStatus::Stopped);
}

#[tokio::test]
async fn unanswered_shutdown_is_bounded_and_slot_cleared() {
    let (mut controller, launcher, notifier) = controller();
    launcher.ignore_shutdown();
    let id = controller.start().await.client_id().unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), controller.stop())
        .await
        .expect("stop is bounded by the shutdown timeout");
    assert_eq!(outcome, StopOutcome::Stopped { id, clean: false });
    assert!(!controller.is_running());
    assert_eq!(notifier.last().as_deref(), Some("Swon Language Server stopped."));

    assert!(matches!(controller.start().await, StartOutcome::Started(_)));
}

#[tokio::test]
async fn deactivate_shuts_down_silently() {
    let (mut controller, launcher, notifier) = controller();
    controller.start().await;

    let pending = controller.deactivate().expect("client was running");
    assert!(!controller.is_running());
    pending.await;

    assert!(launcher.position("#1 shutdown").is_some());
    assert_eq!(notifier.messages(), ["Swon Language Server started."]);
    assert!(controller.deactivate().is_none());
}
