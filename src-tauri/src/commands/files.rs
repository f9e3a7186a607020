use crate::state::AppState;
use sand_shell::models::CommandResult;
use sand_shell::services::local_files;
use std::path::PathBuf;
use tauri::{AppHandle, State};

#[tauri::command]
pub async fn read_processing_results(state: State<'_, AppState>) -> Result<CommandResult, String> {
    let result = local_files::read_processing_results(&state.config.results_path)
        .await
        .map(CommandResult::Ok)
        .unwrap_or_else(|e| {
            tracing::warn!("读取处理结果失败: {}", e);
            e.into()
        });
    Ok(result)
}

#[tauri::command]
pub async fn read_local_image(image_path: String) -> Result<CommandResult, String> {
    let result = local_files::read_local_image(&PathBuf::from(&image_path))
        .await
        .map(|data_url| CommandResult::Ok(data_url.into()))
        .unwrap_or_else(|e| {
            tracing::warn!("读取本地图片失败: {}", e);
            e.into()
        });
    Ok(result)
}

#[tauri::command]
pub async fn check_file_exists(file_path: String) -> bool {
    local_files::file_exists(&PathBuf::from(file_path)).await
}

/// 读取失败时返回 None，和页面约定的空值一致
#[tauri::command]
pub async fn read_file(file_path: String) -> Option<Vec<u8>> {
    local_files::read_file(&PathBuf::from(file_path))
        .await
        .map_err(|e| tracing::warn!("读取文件失败: {}", e))
        .ok()
}

#[tauri::command]
pub fn get_app_path(app_handle: AppHandle) -> Result<String, String> {
    app_handle
        .path_resolver()
        .resource_dir()
        .map(|dir| dir.display().to_string())
        .ok_or_else(|| "无法解析应用目录".to_string())
}
