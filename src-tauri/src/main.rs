#![cfg_attr(
    all(not(debug_assertions), target_os = "windows"),
    windows_subsystem = "windows"
)]

mod commands;
mod desktop;
mod state;

use sand_shell::ShellConfig;
use state::AppState;
use tauri::{Manager, RunEvent, WindowEvent};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match ShellConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("配置无效: {}", e);
            std::process::exit(2);
        }
    };

    let app = tauri::Builder::default()
        .setup(move |app| {
            let window = app
                .get_window("main")
                .ok_or("tauri.conf.json 中缺少 main 窗口")?;
            let state = AppState::new(window.clone(), config)?;
            let controller = state.controller.clone();
            app.manage(state);

            // 主窗口初始隐藏，后端就绪或等待超时后再显示
            tauri::async_runtime::spawn(async move {
                controller.launch().await;
            });

            // 窗口关闭时同步停止后端，避免遗留孤儿进程
            let app_handle = app.handle();
            window.on_window_event(move |event| {
                if let WindowEvent::CloseRequested { .. } = event {
                    if let Some(state) = app_handle.try_state::<AppState>() {
                        tauri::async_runtime::block_on(state.controller.shutdown());
                    }
                }
            });

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Proxy commands
            commands::api_call,
            commands::get_image_url,
            commands::fetch_data,
            commands::test_server_connection,
            commands::chat_completion,

            // Backend commands
            commands::backend_status,
            commands::restart_backend,
            commands::backend_logs,

            // File commands
            commands::read_processing_results,
            commands::read_local_image,
            commands::check_file_exists,
            commands::read_file,
            commands::get_app_path,
        ])
        .build(tauri::generate_context!());

    let app = match app {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("启动 tauri 应用失败: {}", e);
            std::process::exit(1);
        }
    };

    app.run(|app_handle, event| {
        if let RunEvent::Exit = event {
            if let Some(state) = app_handle.try_state::<AppState>() {
                tauri::async_runtime::block_on(state.controller.shutdown());
            }
        }
    });
}
