use crate::error::{CommandError, ProxyInitError};
use crate::models::{CommandRequest, CommandResult, Verb};
use crate::services::endpoints::{BodyShape, Endpoint, EndpointMap, HttpMethod, STANDARD_ENDPOINTS};
use crate::services::http::{http_error, parse_body, transport_error};
use crate::utils::image_url;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// UI 访问后端的唯一通道
///
/// 每个 verb 对应一次 HTTP 调用，结果统一折叠为 `CommandResult`。
/// 代理本身无状态，可以并发调用；后端负责自身的互斥
#[derive(Clone)]
pub struct CommandProxy {
    client: reqwest::Client,
    base_url: String,
    endpoints: EndpointMap,
    request_timeout: Duration,
}

impl CommandProxy {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, ProxyInitError> {
        let endpoints = STANDARD_ENDPOINTS.as_ref().map_err(Clone::clone)?.clone();
        Self::with_endpoints(base_url, request_timeout, endpoints)
    }

    pub fn with_endpoints(
        base_url: impl Into<String>,
        request_timeout: Duration,
        endpoints: EndpointMap,
    ) -> Result<Self, ProxyInitError> {
        endpoints.validate()?;
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(ProxyInitError::Client)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            endpoints,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 执行命令，任何失败都以 `CommandResult::Err` 返回
    pub async fn execute(&self, request: &CommandRequest) -> CommandResult {
        let result = self.dispatch(request).await;
        if let Err(error) = &result {
            tracing::warn!(verb = %request.verb, kind = error.kind(), "command failed: {error}");
        }
        result.into()
    }

    pub async fn dispatch(&self, request: &CommandRequest) -> Result<Value, CommandError> {
        let verb: Verb = request.verb.parse()?;
        let endpoint = self
            .endpoints
            .get(verb)
            .ok_or_else(|| CommandError::UnsupportedVerb(request.verb.clone()))?;

        let path = fill_path(verb, endpoint, request)?;
        let url = format!("{}{}", self.base_url, path);

        let mut builder = match endpoint.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };

        if let Some(params) = &request.params {
            let query = query_pairs(params, &endpoint.placeholders());
            if !query.is_empty() {
                builder = builder.query(&query);
            }
        }

        if let Some(body) = shape_body(endpoint.body, request.payload.as_ref()) {
            builder = builder.json(&body);
        }

        tracing::debug!(%verb, method = %endpoint.method, %url, "forwarding command");

        let response = builder
            .send()
            .await
            .map_err(|error| transport_error(error, self.request_timeout))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|error| transport_error(error, self.request_timeout))?;
        let body = parse_body(&text);

        if status.is_success() {
            Ok(body)
        } else {
            Err(http_error(status, &body))
        }
    }

    /// 连通性测试，包装 `hello` 的结果
    pub async fn test_connection(&self) -> CommandResult {
        match self.dispatch(&CommandRequest::new(Verb::Hello.as_str())).await {
            Ok(data) => CommandResult::Ok(json!({
                "message": "server connection succeeded",
                "data": data,
            })),
            Err(error) => {
                tracing::warn!("server connection failed: {error}");
                error.into()
            }
        }
    }

    /// 任意 URL 的透传读取，返回响应文本
    pub async fn fetch(&self, url: &str) -> CommandResult {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return CommandError::InvalidRequest(format!("'{}' is not an http(s) URL", url)).into();
        }

        let result = self.fetch_text(url).await;
        if let Err(error) = &result {
            tracing::warn!(%url, "fetch failed: {error}");
        }
        result.into()
    }

    async fn fetch_text(&self, url: &str) -> Result<Value, CommandError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| transport_error(error, self.request_timeout))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|error| transport_error(error, self.request_timeout))?;
        if status.is_success() {
            Ok(Value::String(text))
        } else {
            Err(http_error(status, &parse_body(&text)))
        }
    }

    pub fn image_url(&self, image_path: &str) -> String {
        image_url(&self.base_url, image_path)
    }
}

/// 用 params 或 payload 中的同名字段填充路径占位符
fn fill_path(verb: Verb, endpoint: &Endpoint, request: &CommandRequest) -> Result<String, CommandError> {
    let mut path = endpoint.path.to_string();
    for name in endpoint.placeholders() {
        let value = request
            .params
            .as_ref()
            .and_then(|params| params.get(name))
            .or_else(|| request.payload.as_ref().and_then(|payload| payload.get(name)))
            .and_then(scalar_to_string)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                CommandError::InvalidRequest(format!("'{}' requires a '{}' value", verb, name))
            })?;
        path = path.replace(
            &format!("{{{}}}", name),
            &urlencoding::encode(value.trim()),
        );
    }
    Ok(path)
}

fn query_pairs(params: &BTreeMap<String, Value>, skip: &[&str]) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(key, _)| !skip.contains(&key.as_str()))
        .filter_map(|(key, value)| scalar_to_string(value).map(|value| (key.clone(), value)))
        .collect()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn shape_body(shape: BodyShape, payload: Option<&Value>) -> Option<Value> {
    let payload = payload.filter(|payload| !payload.is_null());
    match shape {
        BodyShape::Empty => None,
        BodyShape::Forward => payload.cloned(),
        BodyShape::ObjectOrEmpty => Some(payload.cloned().unwrap_or_else(|| json!({}))),
        BodyShape::SnakeCaseKeys => Some(match payload {
            Some(Value::Object(fields)) => Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| (camel_to_snake(key), value.clone()))
                    .collect::<Map<String, Value>>(),
            ),
            Some(other) => other.clone(),
            None => json!({}),
        }),
    }
}

fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut previous_lower = false;
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            if previous_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            previous_lower = false;
        } else {
            previous_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
            out.push(ch);
        }
    }
    out
}
