//! 全局异常处理
//!
//! 路由器把解析和执行阶段的所有错误交给 `ErrorMapper`，转换为响应。
//! 默认实现沿错误链查找已知的错误类型：
//!
//! | 错误 | JSON 客户端 | HTML 客户端 |
//! |------|-------------|-------------|
//! | `RouteError::NotFound` / `WebError::NotFound` | 404 `ItemNotFound` | 404 错误页 |
//! | `WebError::Unauthenticated` | 401 `NotLoggedIn` | 跳转登录页或 401 错误页 |
//! | `WebError::InputValidation` | 422 错误列表 | 422 错误页 |
//! | 其他（包括 `ContainerError::NotFound`） | 500 `SystemError` | 500 错误页 |

use crate::constants::LOGIN_PATH;
use crate::error::{RouteError, WebError};
use crate::request::RequestInfo;
use crate::response::{ActionResult, ApiError, Body, ErrorCode, ViewParameters};

/// 错误映射器 trait
pub trait ErrorMapper: Send + Sync {
    fn map(&self, error: &anyhow::Error, request: &RequestInfo) -> ActionResult;
}

/// 错误分类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind<'a> {
    NotFound,
    Unauthenticated { redirect: bool },
    InputValidation(&'a [ApiError]),
    System,
}

impl<'a> ErrorKind<'a> {
    /// 沿错误链查找第一个已知错误
    pub fn of(error: &'a anyhow::Error) -> Self {
        for cause in error.chain() {
            if let Some(RouteError::NotFound) = cause.downcast_ref::<RouteError>() {
                return ErrorKind::NotFound;
            }
            match cause.downcast_ref::<WebError>() {
                Some(WebError::NotFound) => return ErrorKind::NotFound,
                Some(WebError::Unauthenticated { redirect }) => {
                    return ErrorKind::Unauthenticated {
                        redirect: *redirect,
                    }
                }
                Some(WebError::InputValidation(errors)) => return ErrorKind::InputValidation(errors),
                _ => {}
            }
        }
        ErrorKind::System
    }
}

/// 默认错误映射器
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorMapper;

impl ErrorMapper for DefaultErrorMapper {
    fn map(&self, error: &anyhow::Error, request: &RequestInfo) -> ActionResult {
        let json = request.wants_json;

        match ErrorKind::of(error) {
            ErrorKind::NotFound => {
                tracing::debug!("{} {} not found: {}", request.method, request.target, error);
                if json {
                    Body::json_error(ErrorCode::ItemNotFound, 404).into()
                } else {
                    ViewParameters::error(404).into()
                }
            }
            ErrorKind::Unauthenticated { redirect } => {
                if json {
                    Body::json_error(ErrorCode::NotLoggedIn, 401).into()
                } else if redirect {
                    ActionResult::redirect(LOGIN_PATH)
                } else {
                    ViewParameters::error(401).into()
                }
            }
            ErrorKind::InputValidation(errors) => {
                tracing::debug!("Input validation failed for {}: {:?}", request.target, errors);
                if json {
                    Body::json_errors(errors, 422).into()
                } else {
                    ViewParameters::error(422).into()
                }
            }
            ErrorKind::System => {
                tracing::error!(
                    method = %request.method,
                    target = %request.target,
                    "Request failed: {:#}",
                    error
                );
                if json {
                    Body::json_error(ErrorCode::SystemError, 500).into()
                } else {
                    ViewParameters::error(500).into()
                }
            }
        }
    }
}
