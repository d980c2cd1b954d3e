use std::collections::HashMap;
use std::sync::Arc;

use dogcafe_core::{Arguments, Component, Container, Instance, Parameter};

use crate::error::WebError;
use crate::registry::Actionable;
use crate::response::{ActionResult, Body, ViewParameters};

/// 动作执行器 - 把匹配结果交给容器调用
///
/// 路径参数以同名实参的形式提供，优先于按类型的自动装配
pub struct ActionExecutor {
    container: Container,
}

impl ActionExecutor {
    pub fn new(container: Container) -> Self {
        Self { container }
    }

    pub fn handle(&self, actionable: &Actionable) -> anyhow::Result<ActionResult> {
        let provided: HashMap<String, Instance> = actionable
            .params
            .iter()
            .map(|(name, value)| (name.clone(), Arc::new(value.clone()) as Instance))
            .collect();

        let result = self
            .container
            .call(&actionable.class, &actionable.method, &provided)?;

        into_action_result(result).ok_or_else(|| {
            WebError::UnsupportedResult(format!("{}::{}", actionable.class, actionable.method)).into()
        })
    }
}

/// 支持的返回类型：`ActionResult`、`Body`、`ViewParameters`、`String`（HTML）
fn into_action_result(result: Instance) -> Option<ActionResult> {
    if let Some(result) = result.downcast_ref::<ActionResult>() {
        return Some(result.clone());
    }
    if let Some(body) = result.downcast_ref::<Body>() {
        return Some(ActionResult::Body(body.clone()));
    }
    if let Some(view) = result.downcast_ref::<ViewParameters>() {
        return Some(ActionResult::View(view.clone()));
    }
    result
        .downcast_ref::<String>()
        .map(|html| ActionResult::Body(Body::html(html.clone(), 200)))
}

impl Component for ActionExecutor {
    fn dependencies() -> Vec<Parameter> {
        vec![Parameter::of::<Container>("container")]
    }

    fn construct(args: &Arguments) -> anyhow::Result<Self> {
        Ok(Self::new(args.get::<Container>("container")?.as_ref().clone()))
    }
}
