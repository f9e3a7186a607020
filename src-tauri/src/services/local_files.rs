use crate::error::LocalFileError;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde_json::Value;
use std::path::Path;

/// 读取后端写出的处理结果 JSON
pub async fn read_processing_results(path: &Path) -> Result<Value, LocalFileError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LocalFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| LocalFileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// 把本地图片读成 data URL，页面可直接作为 `<img src>` 使用
pub async fn read_local_image(path: &Path) -> Result<String, LocalFileError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| LocalFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(format!(
        "data:{};base64,{}",
        image_mime_type(path),
        BASE64_STANDARD.encode(bytes)
    ))
}

/// 按原始字节读取任意文件，由页面自行解析
pub async fn read_file(path: &Path) -> Result<Vec<u8>, LocalFileError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| LocalFileError::Read {
            path: path.to_path_buf(),
            source,
        })
}

pub async fn file_exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

fn image_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "image/png",
    }
}
