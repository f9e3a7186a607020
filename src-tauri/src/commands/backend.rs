use crate::state::AppState;
use sand_shell::models::{BackendSnapshot, LaunchOutcome, LogEntry};
use tauri::State;

#[tauri::command]
pub async fn backend_status(state: State<'_, AppState>) -> Result<Option<BackendSnapshot>, String> {
    Ok(state.controller.supervisor().status().await)
}

/// 停止当前后端并重新启动，返回新的启动结果
#[tauri::command]
pub async fn restart_backend(state: State<'_, AppState>) -> Result<LaunchOutcome, String> {
    Ok(state.controller.relaunch().await)
}

#[tauri::command]
pub fn backend_logs(state: State<'_, AppState>) -> Vec<LogEntry> {
    state.logs.snapshot()
}
