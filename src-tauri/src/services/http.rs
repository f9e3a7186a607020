use crate::error::CommandError;
use reqwest::StatusCode;
use serde_json::Value;
use std::error::Error as _;
use std::time::Duration;

/// 把 reqwest 的传输层错误映射为超时或网络错误
pub(crate) fn transport_error(error: reqwest::Error, timeout: Duration) -> CommandError {
    if error.is_timeout() {
        return CommandError::Timeout(timeout);
    }
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    CommandError::Network { message }
}

/// 响应体能解析成 JSON 就按 JSON 返回，否则作为字符串返回
pub(crate) fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

pub(crate) fn http_error(status: StatusCode, body: &Value) -> CommandError {
    CommandError::Http {
        status: status.as_u16(),
        status_text: status.canonical_reason().map(str::to_string),
        message: error_message(status, body),
    }
}

/// FastAPI 的 `detail` 优先，其次 `message`/`error`，最后是通用描述
fn error_message(status: StatusCode, body: &Value) -> String {
    let generic = format!("Request failed with status code {}", status.as_u16());
    match body {
        Value::Object(fields) => {
            for key in ["detail", "message", "error"] {
                match fields.get(key) {
                    Some(Value::String(text)) if !text.trim().is_empty() => return text.clone(),
                    Some(Value::Null) | None => continue,
                    Some(other) => return format!("{}: {}", generic, other),
                }
            }
            generic
        }
        Value::String(text) if !text.trim().is_empty() => {
            format!("{}: {}", generic, truncate(text.trim(), 200))
        }
        _ => generic,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
