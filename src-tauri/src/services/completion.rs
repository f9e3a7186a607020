use crate::config::CompletionConfig;
use crate::error::{CommandError, ProxyInitError};
use crate::services::http::{http_error, parse_body, transport_error};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 大模型响应较慢，不沿用后端接口的 5 秒超时
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

/// 第三方对话补全的单次透传，与受监管的后端相互独立
#[derive(Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    model: String,
    timeout: Duration,
}

impl CompletionClient {
    pub fn new(config: &CompletionConfig) -> Result<Self, ProxyInitError> {
        Self::with_timeout(config, DEFAULT_COMPLETION_TIMEOUT)
    }

    pub fn with_timeout(config: &CompletionConfig, timeout: Duration) -> Result<Self, ProxyInitError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProxyInitError::Client)?;
        Ok(Self {
            client,
            url: config.url.clone(),
            token: config.token.clone(),
            model: config.model.clone(),
            timeout,
        })
    }

    /// 发送一轮对话，返回第一条候选的文本
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CommandError> {
        let token = self.token.as_deref().ok_or_else(|| {
            CommandError::InvalidRequest(
                "completion credential is not configured (set SAND_SHELL_COMPLETION_TOKEN)"
                    .to_string(),
            )
        })?;
        if messages.is_empty() {
            return Err(CommandError::InvalidRequest(
                "at least one message is required".to_string(),
            ));
        }

        let request = CompletionRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|error| transport_error(error, self.timeout))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|error| transport_error(error, self.timeout))?;

        if !status.is_success() {
            return Err(http_error(status, &parse_body(&text)));
        }

        let parsed: CompletionResponse = serde_json::from_str(&text)
            .map_err(|error| CommandError::MalformedUpstreamResponse(error.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                CommandError::MalformedUpstreamResponse("response contained no choices".to_string())
            })
    }

    pub async fn chat(&self, user_message: impl Into<String>) -> Result<String, CommandError> {
        self.complete(&[ChatMessage::user(user_message)]).await
    }
}
