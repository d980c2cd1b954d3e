//! 视图渲染
//!
//! 模板渲染由应用自己提供，这里只定义接口和一个把视图参数输出为 JSON 的默认实现。

use crate::request::RequestInfo;
use crate::response::{Body, ViewParameters, CONTENT_TYPE_JSON};

/// 视图渲染器
pub trait ViewRenderer: Send + Sync {
    fn render(&self, view: &ViewParameters, request: &RequestInfo) -> anyhow::Result<Body>;
}

/// 默认渲染器：直接输出视图参数
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonViewRenderer;

impl ViewRenderer for JsonViewRenderer {
    fn render(&self, view: &ViewParameters, _request: &RequestInfo) -> anyhow::Result<Body> {
        Ok(Body {
            status: view.status,
            content_type: Some(CONTENT_TYPE_JSON),
            content: serde_json::to_string(view)?,
        })
    }
}
