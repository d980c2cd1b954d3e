//! Web 服务器模块
//!
//! 所有请求都走同一个 fallback handler，由 `Router` 完成匹配和分发。

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use dogcafe_core::{ApplicationError, ApplicationResult, Environment};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::constants::{SERVER_HOST, SERVER_PORT};
use crate::request::{HttpMethod, RequestInfo};
use crate::response::Response;
use crate::router::Router;

/// Web 服务器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerProperties {
    /// 服务器监听地址
    pub host: String,

    /// 服务器监听端口
    pub port: u16,
}

impl Default for ServerProperties {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerProperties {
    /// 从 Environment 加载配置
    pub fn from_environment(env: &Environment) -> Self {
        let defaults = Self::default();
        Self {
            host: env.get_string_or(SERVER_HOST, &defaults.host),
            port: env
                .get_i64(SERVER_PORT)
                .and_then(|port| u16::try_from(port).ok())
                .unwrap_or(defaults.port),
        }
    }

    /// 获取服务器地址
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 把路由器包装成 axum 路由
pub fn routes(router: Arc<Router>) -> axum::Router {
    axum::Router::new()
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(router)
}

async fn dispatch(
    State(router): State<Arc<Router>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> axum::response::Response {
    let Ok(method) = HttpMethod::try_from(&method) else {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    };

    let target = uri
        .path_and_query()
        .map(|target| target.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok());
    let request = RequestInfo::new(target, method).accepting(accept);

    // 动作同步执行，不占用 runtime 的工作线程
    match tokio::task::spawn_blocking(move || router.resolve(&request)).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::error!("Request handler panicked: {}", e);
            Response::internal_error().into_response()
        }
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        let headers = response.headers_mut();

        match self.content_type {
            Some(content_type) => {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
            None => {
                headers.remove(header::CONTENT_TYPE);
            }
        }

        if let Some(location) = self.location {
            match HeaderValue::from_str(&location) {
                Ok(value) => {
                    headers.insert(header::LOCATION, value);
                }
                Err(e) => tracing::warn!("Dropping invalid redirect location {:?}: {}", location, e),
            }
        }

        response
    }
}

/// 启动服务器，收到 Ctrl+C 后优雅退出
pub async fn serve(router: Arc<Router>, properties: &ServerProperties) -> ApplicationResult<()> {
    let addr = properties.address();

    tracing::info!("Starting web server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ApplicationError::Other(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, routes(router))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApplicationError::Other(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
