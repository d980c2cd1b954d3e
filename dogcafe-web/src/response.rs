//! 响应类型
//!
//! 控制器方法返回 `ActionResult`：
//! - `Body` 是已经格式化好的响应体（JSON / HTML），原样返回
//! - `ViewParameters` 交给视图渲染器
//! - `Redirect` 直接跳转

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::{json, Map, Value};

use crate::error::WebError;

pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";
pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";

/// 面向客户端的错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    RequiredParameterMissing,
    ParameterInvalidValue,
    ParameterTooShort,
    ParameterTooLong,
    ItemNotFound,
    ParameterTooSmall,
    ParameterTooLarge,
    NotLoggedIn,
    SystemError,
}

impl ErrorCode {
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::RequiredParameterMissing => 1,
            ErrorCode::ParameterInvalidValue => 2,
            ErrorCode::ParameterTooShort => 3,
            ErrorCode::ParameterTooLong => 4,
            ErrorCode::ItemNotFound => 5,
            ErrorCode::ParameterTooSmall => 6,
            ErrorCode::ParameterTooLarge => 7,
            ErrorCode::NotLoggedIn => 8,
            ErrorCode::SystemError => 9,
        }
    }

    /// 消息模板，`:field` / `:parameter` 为占位符
    pub fn template(&self) -> &'static str {
        match self {
            ErrorCode::RequiredParameterMissing => "`:field` is required",
            ErrorCode::ParameterInvalidValue => "Value given for `:field` is not valid",
            ErrorCode::ParameterTooShort => "`:field` can't be shorter than :parameter",
            ErrorCode::ParameterTooLong => "`:field` can't be longer than :parameter",
            ErrorCode::ParameterTooSmall => "`:field` can't be smaller than :parameter",
            ErrorCode::ParameterTooLarge => "`:field` can't be larger than :parameter",
            ErrorCode::ItemNotFound => "Item not found",
            ErrorCode::NotLoggedIn => "Not logged in",
            ErrorCode::SystemError => "System error",
        }
    }

    /// 替换占位符后的消息，仍有未替换的占位符时返回错误
    pub fn message(&self, placeholders: &[(&str, &str)]) -> Result<String, WebError> {
        let mut message = self.template().to_string();
        for (key, value) in placeholders {
            message = message.replace(&format!(":{}", key), value);
        }

        let missing: Vec<&str> = message
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == ':'))
            .filter(|word| word.len() > 1 && word.starts_with(':'))
            .collect();

        if missing.is_empty() {
            Ok(message)
        } else {
            Err(WebError::MissingPlaceholder(missing.join(", ")))
        }
    }
}

/// 单条错误：`{"code": 5, "message": "Item not found"}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    /// 不带占位符的错误
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.template().to_string(),
        }
    }

    pub fn with_placeholders(code: ErrorCode, placeholders: &[(&str, &str)]) -> Result<Self, WebError> {
        Ok(Self {
            code,
            message: code.message(placeholders)?,
        })
    }
}

impl Serialize for ApiError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ApiError", 2)?;
        state.serialize_field("code", &self.code.code())?;
        state.serialize_field("message", &self.message)?;
        state.end()
    }
}

/// 已格式化的响应体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub content: String,
}

impl Body {
    /// `{"data": content}`
    pub fn json<T: serde::Serialize>(content: &T, status: u16) -> Result<Self, WebError> {
        let data = serde_json::to_value(content)?;
        Ok(Self::raw_json(json!({ "data": data }), status))
    }

    /// `{"data": {"errors": [...]}}`
    pub fn json_errors(errors: &[ApiError], status: u16) -> Self {
        Self::raw_json(json!({ "data": { "errors": errors } }), status)
    }

    pub fn json_error(code: ErrorCode, status: u16) -> Self {
        Self::json_errors(&[ApiError::new(code)], status)
    }

    pub fn html(content: impl Into<String>, status: u16) -> Self {
        Self {
            status,
            content_type: Some(CONTENT_TYPE_HTML),
            content: content.into(),
        }
    }

    /// 204 No Content
    pub fn empty() -> Self {
        Self {
            status: 204,
            content_type: None,
            content: String::new(),
        }
    }

    fn raw_json(value: Value, status: u16) -> Self {
        Self {
            status,
            content_type: Some(CONTENT_TYPE_JSON),
            content: value.to_string(),
        }
    }
}

/// 视图参数：布局、头部、主体三个模板及其变量
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ViewParameters {
    pub layout: String,
    pub head: String,
    pub body: String,
    pub layout_parameters: Map<String, Value>,
    pub head_parameters: Map<String, Value>,
    pub body_parameters: Map<String, Value>,
    pub status: u16,
}

impl ViewParameters {
    pub fn new(layout: impl Into<String>, head: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            layout: layout.into(),
            head: head.into(),
            body: body.into(),
            layout_parameters: Map::new(),
            head_parameters: Map::new(),
            body_parameters: Map::new(),
            status: 200,
        }
    }

    pub fn layout_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.layout_parameters.insert(key.into(), value.into());
        self
    }

    pub fn head_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.head_parameters.insert(key.into(), value.into());
        self
    }

    pub fn body_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body_parameters.insert(key.into(), value.into());
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// 错误页面（`main` 布局，`error` 头部和主体）
    pub fn error(status: u16) -> Self {
        let canonical = format!("/{}", status);
        Self::new("main", "error", "error")
            .layout_parameter("search", false)
            .layout_parameter("canonical", canonical.clone())
            .head_parameter("canonical", canonical)
            .head_parameter("status", status)
            .body_parameter("status", status)
            .status(status)
    }
}

/// 控制器方法的返回值
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    Body(Body),
    View(ViewParameters),
    Redirect { location: String, status: u16 },
}

impl ActionResult {
    /// 302 跳转
    pub fn redirect(location: impl Into<String>) -> Self {
        ActionResult::Redirect {
            location: location.into(),
            status: 302,
        }
    }
}

impl From<Body> for ActionResult {
    fn from(body: Body) -> Self {
        ActionResult::Body(body)
    }
}

impl From<ViewParameters> for ActionResult {
    fn from(view: ViewParameters) -> Self {
        ActionResult::View(view)
    }
}

/// 路由器的最终输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub location: Option<String>,
    pub body: String,
}

impl Response {
    /// 渲染失败时的兜底响应
    pub fn internal_error() -> Self {
        Self {
            status: 500,
            content_type: Some("text/plain; charset=utf-8"),
            location: None,
            body: "Internal Server Error".to_string(),
        }
    }

    pub fn redirect(location: impl Into<String>, status: u16) -> Self {
        Self {
            status,
            content_type: None,
            location: Some(location.into()),
            body: String::new(),
        }
    }
}

impl From<Body> for Response {
    fn from(body: Body) -> Self {
        Self {
            status: body.status,
            content_type: body.content_type,
            location: None,
            body: body.content,
        }
    }
}
