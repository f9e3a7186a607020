use crate::desktop::{WindowLogSink, WindowPresenter};
use sand_shell::services::{
    BackendSupervisor, CommandProxy, CompletionClient, LogBuffer, LogSink, ShellController,
};
use sand_shell::ShellConfig;
use std::sync::Arc;

pub struct AppState {
    pub config: ShellConfig,
    pub controller: Arc<ShellController>,
    pub proxy: CommandProxy,
    pub completion: CompletionClient,
    pub logs: LogBuffer,
}

impl AppState {
    pub fn new(window: tauri::Window, config: ShellConfig) -> Result<Self, String> {
        let logs = LogBuffer::default();
        let sink: Arc<dyn LogSink> = Arc::new(WindowLogSink::new(window.clone(), logs.clone()));

        let supervisor = Arc::new(BackendSupervisor::from_config(&config.backend, sink.clone()));
        let controller = Arc::new(ShellController::new(
            supervisor,
            Arc::new(WindowPresenter::new(window)),
            sink,
        ));

        let proxy = CommandProxy::new(config.api.base_url.clone(), config.api.request_timeout)
            .map_err(|e| format!("初始化命令代理失败: {}", e))?;
        let completion = CompletionClient::new(&config.completion)
            .map_err(|e| format!("初始化对话客户端失败: {}", e))?;

        Ok(Self {
            config,
            controller,
            proxy,
            completion,
            logs,
        })
    }
}
