use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 单个后端实例的启动就绪状态
/// 只有 `Starting` 可以迁移，其余状态对该实例而言都是终态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ReadinessState {
    Starting,
    Ready,
    TimedOut,
    Failed {
        #[serde(rename = "exitCode")]
        exit_code: Option<i32>,
    },
}

impl ReadinessState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, ReadinessState::Starting)
    }

    /// 尚未落定时迁移到 `next`
    pub fn advance(&mut self, next: ReadinessState) -> bool {
        if self.is_settled() {
            return false;
        }
        *self = next;
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendSnapshot {
    pub instance_id: Uuid,
    pub pid: Option<u32>,
    pub readiness: ReadinessState,
    pub started_at: DateTime<Utc>,
}

/// 启动流程结束后通知 UI 的结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum LaunchOutcome {
    Ready,
    AssumedReady,
    Degraded { reason: String },
}
