use crate::models::Verb;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// 请求体的整形方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    /// GET 请求，payload 被忽略
    Empty,
    /// 有 payload 就原样发送，否则不带请求体
    Forward,
    /// 原样发送，缺省时发送 `{}`
    ObjectOrEmpty,
    /// 顶层 camelCase 键转为 snake_case，缺省时发送 `{}`
    SnakeCaseKeys,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub path: &'static str,
    pub body: BodyShape,
}

impl Endpoint {
    pub const fn get(path: &'static str) -> Self {
        Self {
            method: HttpMethod::Get,
            path,
            body: BodyShape::Empty,
        }
    }

    pub const fn post(path: &'static str) -> Self {
        Self {
            method: HttpMethod::Post,
            path,
            body: BodyShape::Forward,
        }
    }

    pub const fn with_body(mut self, body: BodyShape) -> Self {
        self.body = body;
        self
    }

    /// 路径模板中的占位符名，例如 `/scale/connect/{port}` -> `["port"]`
    pub fn placeholders(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut rest = self.path;
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            match after.find('}') {
                Some(end) => {
                    names.push(&after[..end]);
                    rest = &after[end + 1..];
                }
                None => break,
            }
        }
        names
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EndpointMapError {
    #[error("verb '{0}' is mapped more than once")]
    Duplicate(Verb),
    #[error("verb '{0}' has no endpoint")]
    Missing(Verb),
    #[error("endpoint for '{verb}' has malformed path '{path}'")]
    MalformedPath { verb: Verb, path: &'static str },
    #[error("GET endpoint for '{0}' cannot carry a body")]
    BodyOnGet(Verb),
}

/// verb -> HTTP 方法与路径的唯一映射表
#[derive(Debug, Clone)]
pub struct EndpointMap {
    entries: BTreeMap<Verb, Endpoint>,
}

impl EndpointMap {
    pub fn from_entries<I>(entries: I) -> Result<Self, EndpointMapError>
    where
        I: IntoIterator<Item = (Verb, Endpoint)>,
    {
        let mut map = BTreeMap::new();
        for (verb, endpoint) in entries {
            if map.insert(verb, endpoint).is_some() {
                return Err(EndpointMapError::Duplicate(verb));
            }
        }
        Ok(Self { entries: map })
    }

    /// 后端 FastAPI 服务的标准路由
    pub fn standard() -> Result<Self, EndpointMapError> {
        Self::from_entries([
            (Verb::Status, Endpoint::get("/status")),
            (Verb::Initialize, Endpoint::post("/initialize")),
            (Verb::LightOpen, Endpoint::post("/light/open")),
            (Verb::LightClose, Endpoint::post("/light/close")),
            (Verb::ProcessStart, Endpoint::post("/start")),
            (Verb::ProcessStop, Endpoint::post("/stop")),
            (
                Verb::CleanStart,
                Endpoint::post("/clean").with_body(BodyShape::ObjectOrEmpty),
            ),
            (Verb::CleanStatus, Endpoint::get("/clean/status")),
            (Verb::CleanStop, Endpoint::post("/clean/stop")),
            (Verb::ScalePorts, Endpoint::get("/scale/ports")),
            (Verb::ScaleStatus, Endpoint::get("/scale/status")),
            (Verb::ScaleConnect, Endpoint::post("/scale/connect/{port}")),
            (Verb::ScaleDisconnect, Endpoint::post("/scale/disconnect")),
            (Verb::ScaleZero, Endpoint::post("/scale/calibrate/zero")),
            (
                Verb::ScaleGain,
                Endpoint::post("/scale/calibrate/gain").with_body(BodyShape::SnakeCaseKeys),
            ),
            (Verb::ScaleWeight, Endpoint::get("/scale/weight")),
            (Verb::ImagesList, Endpoint::get("/images/list")),
            (Verb::ImagesFile, Endpoint::get("/images/file")),
            (Verb::Results, Endpoint::get("/results")),
            (Verb::Hello, Endpoint::get("/hello")),
        ])
    }

    /// 每个 verb 恰好一个条目，且路径格式正确
    pub fn validate(&self) -> Result<(), EndpointMapError> {
        for verb in Verb::ALL {
            if !self.entries.contains_key(&verb) {
                return Err(EndpointMapError::Missing(verb));
            }
        }
        for (verb, endpoint) in &self.entries {
            if !is_well_formed(endpoint.path) {
                return Err(EndpointMapError::MalformedPath {
                    verb: *verb,
                    path: endpoint.path,
                });
            }
            if endpoint.method == HttpMethod::Get && endpoint.body != BodyShape::Empty {
                return Err(EndpointMapError::BodyOnGet(*verb));
            }
        }
        Ok(())
    }

    pub fn get(&self, verb: Verb) -> Option<&Endpoint> {
        self.entries.get(&verb)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Verb, &Endpoint)> {
        self.entries.iter()
    }
}

/// 进程内共享的标准映射表，首次访问时构建并校验
pub static STANDARD_ENDPOINTS: Lazy<Result<EndpointMap, EndpointMapError>> = Lazy::new(|| {
    let map = EndpointMap::standard()?;
    map.validate()?;
    Ok(map)
});

fn is_well_formed(path: &str) -> bool {
    if !path.starts_with('/') || path.contains("//") || path.contains(char::is_whitespace) {
        return false;
    }
    let mut open = false;
    for ch in path.chars() {
        match ch {
            '{' if open => return false,
            '{' => open = true,
            '}' if !open => return false,
            '}' => open = false,
            _ => {}
        }
    }
    !open && !path.contains("{}")
}
