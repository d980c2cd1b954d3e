//! # Dog Cafe Web
//!
//! 路由与请求分发，基于 Axum 提供 HTTP 服务
//!
//! ## 核心组成
//!
//! - **路由表** - 路径模板编译为前缀树，并写入缓存供下次启动复用
//! - **动作执行** - 匹配到的控制器方法交给容器调用，路径参数按名称注入
//! - **错误映射** - 未找到、未登录、输入校验失败等错误统一转换为响应
//! - **应用启动** - 配置、缓存、容器和 HTTP 服务一次组装完成

pub mod application;
pub mod constants;
pub mod controller;
pub mod error;
pub mod exception_handler;
pub mod executor;
pub mod registry;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod view;

pub use application::{Application, WebApplication};
pub use controller::{ActionRoutes, Controller, ControllerRoutes, Route};
pub use error::{RouteError, RouteResult, WebError};
pub use exception_handler::{DefaultErrorMapper, ErrorKind, ErrorMapper};
pub use executor::ActionExecutor;
pub use registry::{Actionable, ControllerAction, RouteRegistry};
pub use request::{HttpMethod, RequestInfo};
pub use response::{ActionResult, ApiError, Body, ErrorCode, Response, ViewParameters};
pub use router::Router;
pub use server::ServerProperties;
pub use view::{JsonViewRenderer, ViewRenderer};

pub mod prelude {
    //! 预导入模块

    pub use crate::application::{Application, WebApplication};
    pub use crate::controller::{ActionRoutes, Controller, ControllerRoutes, Route};
    pub use crate::error::{RouteError, WebError};
    pub use crate::exception_handler::{DefaultErrorMapper, ErrorMapper};
    pub use crate::request::{HttpMethod, RequestInfo};
    pub use crate::response::{ActionResult, ApiError, Body, ErrorCode, ViewParameters};
    pub use crate::view::{JsonViewRenderer, ViewRenderer};
}
