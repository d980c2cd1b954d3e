use crate::class::{Arguments, ClassDescriptor, Parameter};

/// Component trait - 可以被容器自动构造的类型
///
/// 类型自己声明构造依赖（按声明顺序），容器据此完成自动装配。
/// 需要暴露方法（例如控制器）时覆盖 `descriptor()` 并追加 `.method(...)`。
///
/// # 示例
///
/// ```
/// use dogcafe_core::prelude::*;
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Clock;
///
/// struct Greeter {
///     clock: Arc<Clock>,
/// }
///
/// impl Component for Greeter {
///     fn dependencies() -> Vec<Parameter> {
///         vec![Parameter::of::<Clock>("clock")]
///     }
///
///     fn construct(args: &Arguments) -> anyhow::Result<Self> {
///         Ok(Self { clock: args.get::<Clock>("clock")? })
///     }
/// }
///
/// let container = Container::builder()
///     .class(ClassDescriptor::new::<Clock>())
///     .component::<Greeter>()
///     .build();
///
/// let greeter = container.get_typed::<Greeter>().unwrap();
/// let clock = container.get_typed::<Clock>().unwrap();
/// assert!(Arc::ptr_eq(&greeter.clock, &clock));
/// ```
pub trait Component: Sized + Send + Sync + 'static {
    /// 构造函数参数列表
    fn dependencies() -> Vec<Parameter> {
        Vec::new()
    }

    /// 用自动装配得到的实参构造实例
    fn construct(args: &Arguments) -> anyhow::Result<Self>;

    /// 注册到类注册表的描述符
    fn descriptor() -> ClassDescriptor {
        ClassDescriptor::build::<Self, _>(Self::dependencies(), Self::construct)
    }
}
