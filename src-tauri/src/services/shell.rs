use crate::models::{LaunchOutcome, LogEntry, LogLevel, ReadinessState};
use crate::services::log_sink::LogSink;
use crate::services::supervisor::BackendSupervisor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 界面展示的出口，桌面端由窗口实现
pub trait Presenter: Send + Sync {
    fn present(&self, outcome: &LaunchOutcome);
}

/// 先启动后端，再展示界面；退出时同步停止后端
pub struct ShellController {
    supervisor: Arc<BackendSupervisor>,
    presenter: Arc<dyn Presenter>,
    sink: Arc<dyn LogSink>,
    presented: AtomicBool,
}

impl ShellController {
    pub fn new(
        supervisor: Arc<BackendSupervisor>,
        presenter: Arc<dyn Presenter>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            supervisor,
            presenter,
            sink,
            presented: AtomicBool::new(false),
        }
    }

    pub fn supervisor(&self) -> &Arc<BackendSupervisor> {
        &self.supervisor
    }

    /// 启动失败不阻止界面展示，只是降级
    pub async fn launch(&self) -> LaunchOutcome {
        let outcome = Self::outcome_of(self.supervisor.start().await);
        if let LaunchOutcome::Degraded { reason } = &outcome {
            self.sink.record(LogEntry::lifecycle(
                None,
                LogLevel::Error,
                format!("backend unavailable, continuing in degraded mode: {}", reason),
            ));
        }
        self.present_once(&outcome);
        outcome
    }

    /// 重启后端；界面已展示过则不再重复展示
    pub async fn relaunch(&self) -> LaunchOutcome {
        let outcome = Self::outcome_of(self.supervisor.restart().await);
        self.present_once(&outcome);
        outcome
    }

    pub async fn shutdown(&self) -> bool {
        let stopped = self.supervisor.stop().await;
        if stopped {
            self.sink.record(LogEntry::lifecycle(
                None,
                LogLevel::Info,
                "backend terminated on shell shutdown",
            ));
        }
        stopped
    }

    pub fn is_presented(&self) -> bool {
        self.presented.load(Ordering::SeqCst)
    }

    fn present_once(&self, outcome: &LaunchOutcome) {
        if !self.presented.swap(true, Ordering::SeqCst) {
            self.presenter.present(outcome);
        }
    }

    fn outcome_of<E: std::fmt::Display>(result: Result<ReadinessState, E>) -> LaunchOutcome {
        match result {
            Ok(ReadinessState::Ready) => LaunchOutcome::Ready,
            Ok(ReadinessState::TimedOut) => LaunchOutcome::AssumedReady,
            Ok(other) => LaunchOutcome::Degraded {
                reason: format!("unexpected readiness state {:?}", other),
            },
            Err(error) => LaunchOutcome::Degraded {
                reason: error.to_string(),
            },
        }
    }
}
