//! HTTP 方法与请求信息

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 支持的 HTTP 方法
///
/// 在路由树中作为键使用，序列化为小写（`"get"`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported HTTP method: {0}")]
pub struct UnsupportedMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnsupportedMethod(s.to_string()))
    }
}

impl TryFrom<&http::Method> for HttpMethod {
    type Error = UnsupportedMethod;

    fn try_from(method: &http::Method) -> Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Patch => http::Method::PATCH,
            HttpMethod::Delete => http::Method::DELETE,
        }
    }
}

/// 路由器需要的请求信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// 请求目标（路径 + 查询串）
    pub target: String,
    pub method: HttpMethod,
    /// 客户端是否期望 JSON（`Accept` 包含 `application/json`）
    pub wants_json: bool,
}

impl RequestInfo {
    pub fn new(target: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            target: target.into(),
            method,
            wants_json: false,
        }
    }

    pub fn json(mut self) -> Self {
        self.wants_json = true;
        self
    }

    /// 根据 `Accept` 头判断
    pub fn accepting(mut self, accept: Option<&str>) -> Self {
        self.wants_json = accept.is_some_and(|value| value.contains("application/json"));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("Delete".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert!("HEAD".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_serialized_lowercase() {
        assert_eq!(serde_json::to_string(&HttpMethod::Patch).unwrap(), "\"patch\"");
        assert_eq!(serde_json::from_str::<HttpMethod>("\"post\"").unwrap(), HttpMethod::Post);
    }

    #[test]
    fn test_from_http_method() {
        assert_eq!(HttpMethod::try_from(&http::Method::PUT).unwrap(), HttpMethod::Put);
        assert!(HttpMethod::try_from(&http::Method::OPTIONS).is_err());
        assert_eq!(http::Method::from(HttpMethod::Get), http::Method::GET);
    }

    #[test]
    fn test_wants_json() {
        let request = RequestInfo::new("/", HttpMethod::Get)
            .accepting(Some("application/json, text/plain, */*"));
        assert!(request.wants_json);
        assert!(!RequestInfo::new("/", HttpMethod::Get).accepting(Some("text/html")).wants_json);
        assert!(!RequestInfo::new("/", HttpMethod::Get).accepting(None).wants_json);
    }
}
