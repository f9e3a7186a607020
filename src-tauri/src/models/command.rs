use crate::error::{CommandError, LocalFileError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// UI 可请求后端执行的全部动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verb {
    Status,
    Initialize,
    LightOpen,
    LightClose,
    ProcessStart,
    ProcessStop,
    CleanStart,
    CleanStatus,
    CleanStop,
    ScalePorts,
    ScaleStatus,
    ScaleConnect,
    ScaleDisconnect,
    ScaleZero,
    ScaleGain,
    ScaleWeight,
    ImagesList,
    ImagesFile,
    Results,
    Hello,
}

impl Verb {
    pub const ALL: [Verb; 20] = [
        Verb::Status,
        Verb::Initialize,
        Verb::LightOpen,
        Verb::LightClose,
        Verb::ProcessStart,
        Verb::ProcessStop,
        Verb::CleanStart,
        Verb::CleanStatus,
        Verb::CleanStop,
        Verb::ScalePorts,
        Verb::ScaleStatus,
        Verb::ScaleConnect,
        Verb::ScaleDisconnect,
        Verb::ScaleZero,
        Verb::ScaleGain,
        Verb::ScaleWeight,
        Verb::ImagesList,
        Verb::ImagesFile,
        Verb::Results,
        Verb::Hello,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Status => "status",
            Verb::Initialize => "initialize",
            Verb::LightOpen => "light.open",
            Verb::LightClose => "light.close",
            Verb::ProcessStart => "process.start",
            Verb::ProcessStop => "process.stop",
            Verb::CleanStart => "clean.start",
            Verb::CleanStatus => "clean.status",
            Verb::CleanStop => "clean.stop",
            Verb::ScalePorts => "scale.ports",
            Verb::ScaleStatus => "scale.status",
            Verb::ScaleConnect => "scale.connect",
            Verb::ScaleDisconnect => "scale.disconnect",
            Verb::ScaleZero => "scale.zero",
            Verb::ScaleGain => "scale.gain",
            Verb::ScaleWeight => "scale.weight",
            Verb::ImagesList => "images.list",
            Verb::ImagesFile => "images.file",
            Verb::Results => "results",
            Verb::Hello => "hello",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = CommandError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == "connectivity" {
            return Ok(Verb::Hello);
        }
        Verb::ALL
            .into_iter()
            .find(|verb| verb.as_str() == value)
            .ok_or_else(|| CommandError::UnsupportedVerb(value.to_string()))
    }
}

/// UI 发出的命令
/// verb 保持字符串形式，由代理解析，未知 verb 以数据形式拒绝
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandRequest {
    pub verb: String,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub params: Option<BTreeMap<String, Value>>,
}

impl CommandRequest {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            payload: None,
            params: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// 代理调用结果，始终以数据返回
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ResultEnvelope", from = "ResultEnvelope")]
pub enum CommandResult {
    Ok(Value),
    Err {
        message: String,
        kind: String,
        status: Option<u16>,
        status_text: Option<String>,
    },
}

impl CommandResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, CommandResult::Ok(_))
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            CommandResult::Ok(data) => Some(data),
            CommandResult::Err { .. } => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            CommandResult::Err { status, .. } => *status,
            CommandResult::Ok(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            CommandResult::Err { message, .. } => Some(message),
            CommandResult::Ok(_) => None,
        }
    }

    pub fn error_kind(&self) -> Option<&str> {
        match self {
            CommandResult::Err { kind, .. } => Some(kind),
            CommandResult::Ok(_) => None,
        }
    }
}

impl From<Result<Value, CommandError>> for CommandResult {
    fn from(result: Result<Value, CommandError>) -> Self {
        match result {
            Ok(data) => CommandResult::Ok(data),
            Err(error) => error.into(),
        }
    }
}

impl From<LocalFileError> for CommandResult {
    fn from(error: LocalFileError) -> Self {
        CommandResult::Err {
            kind: error.kind().to_string(),
            status: None,
            status_text: None,
            message: error.to_string(),
        }
    }
}

impl From<CommandError> for CommandResult {
    fn from(error: CommandError) -> Self {
        CommandResult::Err {
            kind: error.kind().to_string(),
            status: error.status(),
            status_text: error.status_text(),
            message: error.to_string(),
        }
    }
}

/// UI 看到的结构: `{success, data}` 或 `{success, error, ...}`
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultEnvelope {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status_text: Option<String>,
}

impl From<CommandResult> for ResultEnvelope {
    fn from(result: CommandResult) -> Self {
        match result {
            CommandResult::Ok(data) => ResultEnvelope {
                success: true,
                data: Some(data),
                error: None,
                kind: None,
                status: None,
                status_text: None,
            },
            CommandResult::Err {
                message,
                kind,
                status,
                status_text,
            } => ResultEnvelope {
                success: false,
                data: None,
                error: Some(message),
                kind: Some(kind),
                status,
                status_text,
            },
        }
    }
}

impl From<ResultEnvelope> for CommandResult {
    fn from(envelope: ResultEnvelope) -> Self {
        if envelope.success {
            CommandResult::Ok(envelope.data.unwrap_or(Value::Null))
        } else {
            CommandResult::Err {
                message: envelope.error.unwrap_or_default(),
                kind: envelope.kind.unwrap_or_default(),
                status: envelope.status,
                status_text: envelope.status_text,
            }
        }
    }
}
