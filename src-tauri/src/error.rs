use crate::services::endpoints::EndpointMapError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a whole number of seconds, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var} must be greater than zero")]
    ZeroTimeout { var: &'static str },
    #[error("{var} must be an http(s) URL, got '{value}'")]
    InvalidUrl { var: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("backend process is already running (pid {pid:?})")]
    AlreadyRunning { pid: Option<u32> },
    #[error("failed to spawn backend '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("backend exited before it was ready (exit code {})", display_code(.exit_code))]
    StartupFailed { exit_code: Option<i32> },
    #[error("backend reported a fatal startup error: {line}")]
    FatalOutput { line: String },
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}

/// 单次代理调用的失败，不会以异常形式抛给 UI，而是折叠进 `CommandResult::Err`
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unsupported command verb '{0}'")]
    UnsupportedVerb(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{message}")]
    Network { message: String },
    #[error("{message}")]
    Http {
        status: u16,
        status_text: Option<String>,
        message: String,
    },
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("unexpected upstream response: {0}")]
    MalformedUpstreamResponse(String),
}

impl CommandError {
    /// 供 UI 分支判断的稳定标识
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedVerb(_) => "unsupported_verb",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Network { .. } => "network",
            Self::Http { .. } => "http",
            Self::Timeout(_) => "timeout",
            Self::MalformedUpstreamResponse(_) => "malformed_response",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn status_text(&self) -> Option<String> {
        match self {
            Self::Http { status_text, .. } => status_text.clone(),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProxyInitError {
    #[error(transparent)]
    Endpoints(#[from] EndpointMapError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum LocalFileError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl LocalFileError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Read { .. } => "file_read",
            Self::Parse { .. } => "file_parse",
        }
    }
}
