//! Web 层错误类型
//!
//! - `RouteError`：路由注册和匹配错误。注册错误在启动时出现，直接终止启动；
//!   `NotFound` 是正常的请求结果。
//! - `WebError`：控制器可以返回的业务错误，由错误映射器转换为响应。

use thiserror::Error;

use crate::request::HttpMethod;
use crate::response::ApiError;

/// 路由结果
pub type RouteResult<T> = std::result::Result<T, RouteError>;

/// 路由错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// 路由模板格式错误
    #[error("Route `{0}` is not valid")]
    NotValid(String),

    /// 两个路由落在同一位置，或同一位置的参数名不一致
    #[error("Route `{path}` ({method}) conflicts with an existing route")]
    Conflict { path: String, method: HttpMethod },

    /// 没有与请求匹配的路由
    #[error("Route not found")]
    NotFound,
}

/// 控制器可以返回的错误
#[derive(Debug, Error)]
pub enum WebError {
    /// 请求的资源不存在 - 404
    #[error("Item not found")]
    NotFound,

    /// 未登录 - 401，HTML 客户端在 `redirect` 为真时跳转到登录页
    #[error("Not logged in")]
    Unauthenticated { redirect: bool },

    /// 输入校验失败 - 422
    #[error("Input validation failed")]
    InputValidation(Vec<ApiError>),

    /// 控制器返回了无法转换为响应的类型
    #[error("Action `{0}` returned an unsupported result type")]
    UnsupportedResult(String),

    /// 错误消息中有未替换的占位符
    #[error("Missing placeholders in error message: {0}")]
    MissingPlaceholder(String),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// 视图渲染失败
    #[error("Failed to render view: {0}")]
    Render(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_error_messages() {
        let conflict = RouteError::Conflict {
            path: "/abc".to_string(),
            method: HttpMethod::Get,
        };
        assert_eq!(conflict.to_string(), "Route `/abc` (GET) conflicts with an existing route");
        assert_eq!(RouteError::NotValid("abc".into()).to_string(), "Route `abc` is not valid");
    }
}
