use crate::state::AppState;
use sand_shell::models::{CommandRequest, CommandResult};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tauri::State;

/// 页面访问后端的统一入口，失败也以 `success: false` 的数据返回
#[tauri::command]
pub async fn api_call(
    verb: String,
    payload: Option<Value>,
    params: Option<BTreeMap<String, Value>>,
    state: State<'_, AppState>,
) -> Result<CommandResult, String> {
    let request = CommandRequest {
        verb,
        payload,
        params,
    };
    Ok(state.proxy.execute(&request).await)
}

#[tauri::command]
pub fn get_image_url(image_path: String, state: State<'_, AppState>) -> String {
    state.proxy.image_url(&image_path)
}

#[tauri::command]
pub async fn fetch_data(url: String, state: State<'_, AppState>) -> Result<CommandResult, String> {
    Ok(state.proxy.fetch(&url).await)
}

#[tauri::command]
pub async fn test_server_connection(state: State<'_, AppState>) -> Result<CommandResult, String> {
    Ok(state.proxy.test_connection().await)
}

#[tauri::command]
pub async fn chat_completion(
    user_message: String,
    state: State<'_, AppState>,
) -> Result<CommandResult, String> {
    let result = match state.completion.chat(user_message).await {
        Ok(content) => CommandResult::Ok(json!({ "content": content })),
        Err(e) => {
            tracing::warn!("对话补全调用失败: {}", e);
            e.into()
        }
    };
    Ok(result)
}
