#![cfg(unix)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sand_shell::error::SupervisorError;
use sand_shell::models::{LaunchOutcome, LogLevel, LogSource, ReadinessState};
use sand_shell::services::{
    BackendSupervisor, LaunchSpec, LogBuffer, PatternDetector, Presenter, ShellController,
};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

fn shell(script: &str) -> LaunchSpec {
    LaunchSpec::new("sh").arg("-c").arg(script)
}

fn supervisor(script: &str, timeout: Duration) -> (Arc<BackendSupervisor>, LogBuffer) {
    let logs = LogBuffer::new(200);
    let supervisor = BackendSupervisor::new(shell(script), timeout, Arc::new(logs.clone()));
    (Arc::new(supervisor), logs)
}

#[tokio::test]
async fn ready_marker_resolves_start() {
    let (supervisor, _logs) = supervisor(
        "echo 'INFO:     Started server process'; echo 'INFO:     Uvicorn running on http://127.0.0.1:8000'; sleep 30",
        STARTUP_TIMEOUT,
    );

    let state = supervisor.start().await.expect("backend becomes ready");

    assert_eq!(state, ReadinessState::Ready);
    let snapshot = supervisor.status().await.expect("process is owned");
    assert_eq!(snapshot.readiness, ReadinessState::Ready);
    assert!(snapshot.pid.is_some());
    assert!(supervisor.stop().await);
}

#[tokio::test]
async fn marker_on_stderr_counts_and_is_logged_as_warning() {
    let (supervisor, logs) = supervisor(
        "echo 'INFO:     Application startup complete.' >&2; sleep 30",
        STARTUP_TIMEOUT,
    );

    assert_eq!(supervisor.start().await.unwrap(), ReadinessState::Ready);
    supervisor.stop().await;

    let stderr = logs
        .snapshot()
        .into_iter()
        .find(|entry| entry.source == LogSource::Stderr)
        .expect("stderr chunk logged");
    assert_eq!(stderr.level, LogLevel::Warning);
    assert!(stderr.message.contains("Application startup complete"));
}

#[tokio::test]
async fn marker_printed_just_before_exit_still_counts() {
    let (supervisor, _logs) = supervisor(
        "echo 'INFO:     Uvicorn running on http://127.0.0.1:8000'; exit 0",
        STARTUP_TIMEOUT,
    );

    assert_eq!(supervisor.start().await.unwrap(), ReadinessState::Ready);
}

#[tokio::test]
async fn early_exit_reports_the_exit_code() {
    let (supervisor, logs) = supervisor(
        "echo 'ModuleNotFoundError: No module named fastapi' >&2; exit 3",
        STARTUP_TIMEOUT,
    );

    match supervisor.start().await {
        Err(SupervisorError::StartupFailed { exit_code }) => assert_eq!(exit_code, Some(3)),
        other => panic!("expected startup failure, got {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!supervisor.is_running().await);
    assert!(logs
        .snapshot()
        .iter()
        .any(|entry| entry.message.contains("No module named fastapi")));
}

#[tokio::test]
async fn clean_exit_before_ready_is_still_a_failure() {
    let (supervisor, _logs) = supervisor("echo booting; exit 0", STARTUP_TIMEOUT);

    assert!(matches!(
        supervisor.start().await,
        Err(SupervisorError::StartupFailed { exit_code: Some(0) })
    ));
}

#[tokio::test]
async fn silent_backend_is_assumed_ready_after_timeout() {
    let (supervisor, _logs) = supervisor("sleep 30", Duration::from_millis(300));

    let state = supervisor.start().await.expect("timeout is not an error");

    assert_eq!(state, ReadinessState::TimedOut);
    // 超时不会杀掉后端
    assert!(supervisor.is_running().await);
    assert_eq!(
        supervisor.status().await.map(|snapshot| snapshot.readiness),
        Some(ReadinessState::TimedOut)
    );
    assert!(supervisor.stop().await);
}

#[tokio::test]
async fn marker_after_timeout_does_not_change_readiness() {
    let (supervisor, _logs) = supervisor(
        "sleep 1; echo 'Uvicorn running on http://127.0.0.1:8000'; sleep 30",
        Duration::from_millis(200),
    );

    assert_eq!(supervisor.start().await.unwrap(), ReadinessState::TimedOut);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(
        supervisor.status().await.map(|snapshot| snapshot.readiness),
        Some(ReadinessState::TimedOut)
    );
    supervisor.stop().await;
}

#[tokio::test]
async fn bind_failure_fails_startup_and_releases_the_process() {
    let (supervisor, _logs) = supervisor(
        "echo \"ERROR:    [Errno 98] error while attempting to bind on address ('127.0.0.1', 8000): address already in use\" >&2; sleep 30",
        STARTUP_TIMEOUT,
    );

    match supervisor.start().await {
        Err(SupervisorError::FatalOutput { line }) => assert!(line.contains("[Errno 98]")),
        other => panic!("expected fatal output, got {other:?}"),
    }
    assert!(!supervisor.is_running().await);
}

#[tokio::test]
async fn second_start_while_running_is_rejected() {
    let (supervisor, _logs) = supervisor("echo 'Uvicorn running on'; sleep 30", STARTUP_TIMEOUT);

    supervisor.start().await.unwrap();
    assert!(matches!(
        supervisor.start().await,
        Err(SupervisorError::AlreadyRunning { pid: Some(_) })
    ));
    supervisor.stop().await;
}

#[tokio::test]
async fn stop_is_idempotent() {
    let (supervisor, _logs) = supervisor("echo 'Uvicorn running on'; sleep 30", STARTUP_TIMEOUT);
    supervisor.start().await.unwrap();

    assert!(supervisor.stop().await);
    assert!(!supervisor.stop().await);
    assert!(supervisor.status().await.is_none());
}

#[tokio::test]
async fn restart_after_stop_spawns_a_new_instance() {
    let (supervisor, _logs) = supervisor("echo 'Uvicorn running on'; sleep 30", STARTUP_TIMEOUT);

    supervisor.start().await.unwrap();
    let first = supervisor.status().await.unwrap().instance_id;
    assert_eq!(supervisor.restart().await.unwrap(), ReadinessState::Ready);
    let second = supervisor.status().await.unwrap().instance_id;

    assert_ne!(first, second);
    supervisor.stop().await;
}

#[tokio::test]
async fn custom_detector_replaces_default_markers() {
    let logs = LogBuffer::default();
    let detector = PatternDetector::new(r"listening on :\d+").unwrap();
    let supervisor = BackendSupervisor::new(
        shell("echo 'Uvicorn running on'; echo 'listening on :9000'; sleep 30"),
        STARTUP_TIMEOUT,
        Arc::new(logs),
    )
    .with_detector(Arc::new(detector));

    assert_eq!(supervisor.start().await.unwrap(), ReadinessState::Ready);
    supervisor.stop().await;
}

#[derive(Default)]
struct RecordingPresenter {
    calls: AtomicUsize,
    last: Mutex<Option<LaunchOutcome>>,
}

impl Presenter for RecordingPresenter {
    fn present(&self, outcome: &LaunchOutcome) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(outcome.clone());
    }
}

#[tokio::test]
async fn controller_presents_once_after_ready() {
    let (supervisor, logs) = supervisor("echo 'Uvicorn running on'; sleep 30", STARTUP_TIMEOUT);
    let presenter = Arc::new(RecordingPresenter::default());
    let controller = ShellController::new(supervisor.clone(), presenter.clone(), Arc::new(logs));

    assert_eq!(controller.launch().await, LaunchOutcome::Ready);
    assert_eq!(controller.relaunch().await, LaunchOutcome::Ready);

    assert_eq!(presenter.calls.load(Ordering::SeqCst), 1);
    assert!(controller.is_presented());

    assert!(controller.shutdown().await);
    assert!(!supervisor.is_running().await);
    assert!(!controller.shutdown().await);
}

#[tokio::test]
async fn controller_degrades_when_backend_fails() {
    let (supervisor, logs) = supervisor("exit 2", STARTUP_TIMEOUT);
    let presenter = Arc::new(RecordingPresenter::default());
    let controller = ShellController::new(supervisor, presenter.clone(), Arc::new(logs.clone()));

    let outcome = controller.launch().await;

    assert!(matches!(outcome, LaunchOutcome::Degraded { ref reason } if reason.contains("exit code 2")));
    assert_eq!(*presenter.last.lock().unwrap(), Some(outcome));
    assert!(logs
        .snapshot()
        .iter()
        .any(|entry| entry.level == LogLevel::Error));
}

#[tokio::test]
async fn controller_presents_degraded_ready_on_timeout() {
    let (supervisor, logs) = supervisor("sleep 30", Duration::from_millis(200));
    let presenter = Arc::new(RecordingPresenter::default());
    let controller = ShellController::new(supervisor, presenter.clone(), Arc::new(logs));

    assert_eq!(controller.launch().await, LaunchOutcome::AssumedReady);
    assert_eq!(presenter.calls.load(Ordering::SeqCst), 1);
    controller.shutdown().await;
}
