//! 控制器与路由声明
//!
//! 控制器是一个 `Component`，额外声明每个方法对应的路由。
//! 方法名必须与 `descriptor()` 中注册的方法一致，由容器负责调用。

use std::any::type_name;

use dogcafe_core::Component;

use crate::request::HttpMethod;

/// 单条路由：路径模板 + HTTP 方法
///
/// 路径以 `/` 分隔，`:name` 表示命名参数，例如 `/venue/:venueReference`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub method: HttpMethod,
}

impl Route {
    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(path, HttpMethod::Get)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(path, HttpMethod::Post)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(path, HttpMethod::Put)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(path, HttpMethod::Patch)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(path, HttpMethod::Delete)
    }
}

/// 一个控制器方法及其全部路由
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRoutes {
    pub method_name: String,
    pub routes: Vec<Route>,
}

impl ActionRoutes {
    pub fn new(method_name: impl Into<String>, routes: Vec<Route>) -> Self {
        Self {
            method_name: method_name.into(),
            routes,
        }
    }
}

/// 控制器 trait
///
/// # 示例
///
/// ```
/// use dogcafe_core::prelude::*;
/// use dogcafe_web::prelude::*;
///
/// #[derive(Default)]
/// struct HomeController;
///
/// impl Component for HomeController {
///     fn construct(_: &Arguments) -> anyhow::Result<Self> {
///         Ok(Self)
///     }
///
///     fn descriptor() -> ClassDescriptor {
///         ClassDescriptor::new::<Self>().method("home", vec![], |_: &Self, _| {
///             Ok(ActionResult::from(Body::html("<h1>Woof</h1>", 200)))
///         })
///     }
/// }
///
/// impl Controller for HomeController {
///     fn routes() -> Vec<ActionRoutes> {
///         vec![ActionRoutes::new("home", vec![Route::get("/")])]
///     }
/// }
///
/// let routes = ControllerRoutes::of::<HomeController>();
/// assert_eq!(routes.actions.len(), 1);
/// ```
pub trait Controller: Component {
    /// 方法名 -> 路由，按声明顺序
    fn routes() -> Vec<ActionRoutes>;
}

/// 控制器的路由声明（类标识符 + 方法路由），用于编译路由表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerRoutes {
    pub class: String,
    pub actions: Vec<ActionRoutes>,
}

impl ControllerRoutes {
    pub fn new(class: impl Into<String>, actions: Vec<ActionRoutes>) -> Self {
        Self {
            class: class.into(),
            actions,
        }
    }

    /// 收集控制器 `C` 的路由，类标识符为 `type_name::<C>()`
    pub fn of<C: Controller>() -> Self {
        Self::new(type_name::<C>(), C::routes())
    }
}
