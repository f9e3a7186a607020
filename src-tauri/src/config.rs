use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_PYTHON: &str = "SAND_SHELL_PYTHON";
pub const ENV_BACKEND_SCRIPT: &str = "SAND_SHELL_BACKEND_SCRIPT";
pub const ENV_BACKEND_DIR: &str = "SAND_SHELL_BACKEND_DIR";
pub const ENV_BACKEND_URL: &str = "SAND_SHELL_BACKEND_URL";
pub const ENV_STARTUP_TIMEOUT_SECS: &str = "SAND_SHELL_STARTUP_TIMEOUT_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "SAND_SHELL_REQUEST_TIMEOUT_SECS";
pub const ENV_COMPLETION_URL: &str = "SAND_SHELL_COMPLETION_URL";
pub const ENV_COMPLETION_TOKEN: &str = "SAND_SHELL_COMPLETION_TOKEN";
pub const ENV_COMPLETION_MODEL: &str = "SAND_SHELL_COMPLETION_MODEL";
pub const ENV_RESULTS_PATH: &str = "SAND_SHELL_RESULTS_PATH";

const DEFAULT_PYTHON: &str = "python";
const DEFAULT_BACKEND_SCRIPT: &str = "src/main/python/api/app.py";
const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 15;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;
const DEFAULT_COMPLETION_PATH: &str = "/xfyun-api/v1/chat/completions";
const DEFAULT_COMPLETION_MODEL: &str = "4.0Ultra";
const DEFAULT_RESULTS_PATH: &str = "src/main/python/results/processing_results.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub backend: BackendConfig,
    pub api: ApiConfig,
    pub completion: CompletionConfig,
    pub results_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub interpreter: PathBuf,
    pub script: PathBuf,
    pub working_dir: Option<PathBuf>,
    pub startup_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionConfig {
    pub url: String,
    pub token: Option<String>,
    pub model: String,
}

impl ShellConfig {
    /// 从环境变量读取配置，未设置的项使用默认值
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let base_url = read(ENV_BACKEND_URL)
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        validate_url(ENV_BACKEND_URL, &base_url)?;

        let completion_url = read(ENV_COMPLETION_URL)
            .unwrap_or_else(|| format!("{}{}", base_url, DEFAULT_COMPLETION_PATH));
        validate_url(ENV_COMPLETION_URL, &completion_url)?;

        Ok(Self {
            backend: BackendConfig {
                interpreter: PathBuf::from(
                    read(ENV_PYTHON).unwrap_or_else(|| DEFAULT_PYTHON.to_string()),
                ),
                script: PathBuf::from(
                    read(ENV_BACKEND_SCRIPT).unwrap_or_else(|| DEFAULT_BACKEND_SCRIPT.to_string()),
                ),
                working_dir: read(ENV_BACKEND_DIR).map(PathBuf::from),
                startup_timeout: parse_secs(
                    ENV_STARTUP_TIMEOUT_SECS,
                    read(ENV_STARTUP_TIMEOUT_SECS),
                    DEFAULT_STARTUP_TIMEOUT_SECS,
                )?,
            },
            api: ApiConfig {
                base_url,
                request_timeout: parse_secs(
                    ENV_REQUEST_TIMEOUT_SECS,
                    read(ENV_REQUEST_TIMEOUT_SECS),
                    DEFAULT_REQUEST_TIMEOUT_SECS,
                )?,
            },
            completion: CompletionConfig {
                url: completion_url,
                token: read(ENV_COMPLETION_TOKEN),
                model: read(ENV_COMPLETION_MODEL)
                    .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
            },
            results_path: PathBuf::from(
                read(ENV_RESULTS_PATH).unwrap_or_else(|| DEFAULT_RESULTS_PATH.to_string()),
            ),
        })
    }
}

fn parse_secs(
    var: &'static str,
    value: Option<String>,
    default: u64,
) -> Result<Duration, ConfigError> {
    let secs = match value {
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { var, value })?,
        None => default,
    };
    if secs == 0 {
        return Err(ConfigError::ZeroTimeout { var });
    }
    Ok(Duration::from_secs(secs))
}

fn validate_url(var: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            var,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<ShellConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ShellConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_the_stock_backend() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.backend.interpreter, PathBuf::from("python"));
        assert_eq!(config.backend.startup_timeout, Duration::from_secs(15));
        assert_eq!(config.api.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.api.request_timeout, Duration::from_secs(5));
        assert_eq!(
            config.completion.url,
            "http://127.0.0.1:8000/xfyun-api/v1/chat/completions"
        );
        assert_eq!(config.completion.token, None);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_with(&[
            (ENV_BACKEND_URL, "http://localhost:9000/"),
            (ENV_STARTUP_TIMEOUT_SECS, "30"),
            (ENV_COMPLETION_TOKEN, "  secret  "),
            (ENV_BACKEND_DIR, "/opt/sand"),
        ])
        .unwrap();

        assert_eq!(config.api.base_url, "http://localhost:9000");
        assert_eq!(config.backend.startup_timeout, Duration::from_secs(30));
        assert_eq!(config.completion.token.as_deref(), Some("secret"));
        assert_eq!(config.backend.working_dir, Some(PathBuf::from("/opt/sand")));
        assert!(config.completion.url.starts_with("http://localhost:9000/"));
    }

    #[test]
    fn malformed_timeouts_are_rejected() {
        let error = config_with(&[(ENV_REQUEST_TIMEOUT_SECS, "soon")]).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidNumber { .. }));

        let error = config_with(&[(ENV_STARTUP_TIMEOUT_SECS, "0")]).unwrap_err();
        assert!(matches!(error, ConfigError::ZeroTimeout { .. }));
    }

    #[test]
    fn non_http_backend_url_is_rejected() {
        let error = config_with(&[(ENV_BACKEND_URL, "127.0.0.1:8000")]).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidUrl { .. }));
    }
}
