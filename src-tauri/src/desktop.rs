use sand_shell::models::{LaunchOutcome, LogEntry};
use sand_shell::services::{LogBuffer, LogSink, Presenter, TracingSink};

/// 启动结束后通知页面，并显示初始隐藏的主窗口
pub struct WindowPresenter {
    window: tauri::Window,
}

impl WindowPresenter {
    pub fn new(window: tauri::Window) -> Self {
        Self { window }
    }
}

impl Presenter for WindowPresenter {
    fn present(&self, outcome: &LaunchOutcome) {
        if let Err(e) = self.window.emit("backend_ready", outcome) {
            tracing::warn!("发送 backend_ready 事件失败: {}", e);
        }
        if let Err(e) = self.window.show() {
            tracing::error!("显示主窗口失败: {}", e);
        }
    }
}

/// 后端日志同时写入 tracing、内存缓冲，并以 `backend_log` 事件推送到页面
pub struct WindowLogSink {
    window: tauri::Window,
    buffer: LogBuffer,
}

impl WindowLogSink {
    pub fn new(window: tauri::Window, buffer: LogBuffer) -> Self {
        Self { window, buffer }
    }
}

impl LogSink for WindowLogSink {
    fn record(&self, entry: LogEntry) {
        TracingSink.record(entry.clone());
        let _ = self.window.emit("backend_log", &entry);
        self.buffer.record(entry);
    }
}
