use std::sync::Arc;

use dogcafe_core::{Arguments, Component, Parameter};

use crate::exception_handler::ErrorMapper;
use crate::executor::ActionExecutor;
use crate::registry::RouteRegistry;
use crate::request::RequestInfo;
use crate::response::{ActionResult, Response, ViewParameters};
use crate::view::ViewRenderer;

/// 路由器 - 每个请求的入口
///
/// 先匹配路由并执行动作；任何错误都交给错误映射器。
/// 得到的结果如果是响应体就原样返回，视图参数则交给渲染器。
pub struct Router {
    registry: Arc<RouteRegistry>,
    executor: Arc<ActionExecutor>,
    renderer: Arc<dyn ViewRenderer>,
    error_mapper: Arc<dyn ErrorMapper>,
}

impl Router {
    pub fn new(
        registry: Arc<RouteRegistry>,
        executor: Arc<ActionExecutor>,
        renderer: Arc<dyn ViewRenderer>,
        error_mapper: Arc<dyn ErrorMapper>,
    ) -> Self {
        Self {
            registry,
            executor,
            renderer,
            error_mapper,
        }
    }

    pub fn resolve(&self, request: &RequestInfo) -> Response {
        let result = self
            .dispatch(request)
            .unwrap_or_else(|error| self.error_mapper.map(&error, request));

        self.respond(result, request)
    }

    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    fn dispatch(&self, request: &RequestInfo) -> anyhow::Result<ActionResult> {
        let actionable = self.registry.resolve(&request.target, request.method)?;
        tracing::debug!(
            "{} {} -> {}::{}",
            request.method,
            request.target,
            actionable.class,
            actionable.method
        );
        self.executor.handle(&actionable)
    }

    fn respond(&self, result: ActionResult, request: &RequestInfo) -> Response {
        match result {
            ActionResult::Body(body) => body.into(),
            ActionResult::Redirect { location, status } => Response::redirect(location, status),
            ActionResult::View(view) => match self.render(&view, request) {
                Ok(response) => response,
                Err(error) => self.respond_to_render_failure(&error, request),
            },
        }
    }

    /// 渲染失败再映射一次；错误页本身也无法渲染时返回纯文本 500
    fn respond_to_render_failure(&self, error: &anyhow::Error, request: &RequestInfo) -> Response {
        match self.error_mapper.map(error, request) {
            ActionResult::Body(body) => body.into(),
            ActionResult::Redirect { location, status } => Response::redirect(location, status),
            ActionResult::View(view) => self.render(&view, request).unwrap_or_else(|error| {
                tracing::error!("Failed to render error view: {:#}", error);
                Response::internal_error()
            }),
        }
    }

    fn render(&self, view: &ViewParameters, request: &RequestInfo) -> anyhow::Result<Response> {
        self.renderer.render(view, request).map(Response::from)
    }
}

impl Component for Router {
    fn dependencies() -> Vec<Parameter> {
        vec![
            Parameter::of::<RouteRegistry>("registry"),
            Parameter::of::<ActionExecutor>("executor"),
            Parameter::of::<dyn ViewRenderer>("renderer"),
            Parameter::of::<dyn ErrorMapper>("error_mapper"),
        ]
    }

    fn construct(args: &Arguments) -> anyhow::Result<Self> {
        Ok(Self::new(
            args.get::<RouteRegistry>("registry")?,
            args.get::<ActionExecutor>("executor")?,
            args.service::<dyn ViewRenderer>("renderer")?,
            args.service::<dyn ErrorMapper>("error_mapper")?,
        ))
    }
}
