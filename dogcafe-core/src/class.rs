//! 类描述与类注册表
//!
//! Rust 没有运行时反射，这里用显式注册的描述符代替：
//! 每个可构造的类型声明自己的构造参数列表和构造函数，
//! 控制器额外声明可被调用的方法。容器只通过这些描述符进行自动装配。

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ContainerError, ContainerResult};

/// 容器中保存的对象
pub type Instance = Arc<dyn Any + Send + Sync>;

type Body = Arc<dyn Fn(&Arguments) -> anyhow::Result<Instance> + Send + Sync>;
type Invoker = Arc<dyn Fn(Instance, &Arguments) -> anyhow::Result<Instance> + Send + Sync>;

/// 参数声明的类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterType {
    /// 没有类型声明
    Untyped,
    /// 内建标量类型（如 `string`、`int`），不会被自动装配
    Builtin(&'static str),
    /// 类或接口标识符，递归解析
    Named(String),
    /// 联合类型，不支持自动装配
    Union(Vec<String>),
}

/// 构造函数 / 方法的单个参数
#[derive(Clone)]
pub struct Parameter {
    name: String,
    ty: ParameterType,
    default: Option<Instance>,
    variadic: bool,
}

impl Parameter {
    fn new(name: impl Into<String>, ty: ParameterType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            variadic: false,
        }
    }

    /// 以 `T` 的类型名作为依赖标识符
    pub fn of<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Named(type_name::<T>().to_string()))
    }

    /// 以任意标识符作为依赖
    pub fn named(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Named(id.into()))
    }

    pub fn builtin(name: impl Into<String>, ty: &'static str) -> Self {
        Self::new(name, ParameterType::Builtin(ty))
    }

    /// `string` 参数，通常由路由参数提供
    pub fn string(name: impl Into<String>) -> Self {
        Self::builtin(name, "string")
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, ParameterType::Untyped)
    }

    pub fn union<I, S>(name: impl Into<String>, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            ParameterType::Union(types.into_iter().map(Into::into).collect()),
        )
    }

    /// 设置默认值
    pub fn with_default<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.default = Some(Arc::new(value));
        self
    }

    /// 标记为可变参数
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &ParameterType {
        &self.ty
    }

    pub fn default_value(&self) -> Option<&Instance> {
        self.default.as_ref()
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("has_default", &self.default.is_some())
            .field("variadic", &self.variadic)
            .finish()
    }
}

/// 自动装配得到的实参列表（按声明顺序，带参数名）
#[derive(Clone, Default)]
pub struct Arguments {
    values: Vec<(String, Instance)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Instance) {
        self.values.push((name.into(), value));
    }

    /// 按参数名取出原始实例
    pub fn instance(&self, name: &str) -> ContainerResult<&Instance> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| {
                ContainerError::UnresolvableParameter(format!("argument `{}` was not built", name))
            })
    }

    /// 按参数名取出并 downcast 为 `T`
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>> {
        Arc::clone(self.instance(name)?)
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>().to_string(),
            })
    }

    /// 取出以 trait 对象注册的服务（见 `Instruction::service`）
    pub fn service<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> ContainerResult<Arc<T>> {
        self.get::<Arc<T>>(name).map(|service| Arc::clone(&*service))
    }

    /// 取出字符串参数（路由参数均为字符串）
    pub fn string(&self, name: &str) -> ContainerResult<String> {
        self.get::<String>(name).map(|s| s.as_ref().clone())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// 可调用对象：参数列表 + 函数体，用于工厂指令和构造函数
#[derive(Clone)]
pub struct Callable {
    parameters: Vec<Parameter>,
    body: Body,
}

impl Callable {
    pub fn new<T, F>(parameters: Vec<Parameter>, body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            parameters,
            body: Arc::new(move |args: &Arguments| Ok(Arc::new(body(args)?) as Instance)),
        }
    }

    /// 函数体直接返回 `Instance`（用于共享已有的 `Arc`）
    pub fn from_instance<F>(parameters: Vec<Parameter>, body: F) -> Self
    where
        F: Fn(&Arguments) -> anyhow::Result<Instance> + Send + Sync + 'static,
    {
        Self {
            parameters,
            body: Arc::new(body),
        }
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn invoke(&self, args: &Arguments) -> anyhow::Result<Instance> {
        (self.body)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// 类上可被容器调用的方法
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    parameters: Vec<Parameter>,
    invoker: Invoker,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn invoke(&self, receiver: Instance, args: &Arguments) -> anyhow::Result<Instance> {
        (self.invoker)(receiver, args)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// 类描述符
#[derive(Clone)]
pub struct ClassDescriptor {
    id: String,
    type_id: Option<TypeId>,
    constructor: Option<Callable>,
    methods: HashMap<String, MethodDescriptor>,
}

impl ClassDescriptor {
    /// 无参构造的具体类型（使用 `Default`）
    pub fn new<T: Any + Send + Sync + Default>() -> Self {
        Self::build::<T, _>(Vec::new(), |_| Ok(T::default()))
    }

    /// 带构造参数的具体类型
    pub fn build<T, F>(parameters: Vec<Parameter>, constructor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            id: type_name::<T>().to_string(),
            type_id: Some(TypeId::of::<T>()),
            constructor: Some(Callable::new(parameters, constructor)),
            methods: HashMap::new(),
        }
    }

    /// 抽象类型 / 接口：可以被注册，但不能被实例化
    pub fn abstract_type(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_id: None,
            constructor: None,
            methods: HashMap::new(),
        }
    }

    /// 使用自定义标识符注册（默认是 `type_name::<T>()`）
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// 声明一个可调用的方法
    ///
    /// `method` 的第一个参数是类实例本身，第二个参数是自动装配得到的实参。
    pub fn method<T, R, F>(mut self, name: impl Into<String>, parameters: Vec<Parameter>, method: F) -> Self
    where
        T: Any + Send + Sync,
        R: Any + Send + Sync,
        F: Fn(&T, &Arguments) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        let name = name.into();
        let class = self.id.clone();
        let method_name = name.clone();
        let invoker: Invoker = Arc::new(move |receiver: Instance, args: &Arguments| {
            let this = receiver.downcast::<T>().map_err(|_| ContainerError::TypeMismatch {
                name: format!("{}::{}", class, method_name),
                expected: type_name::<T>().to_string(),
            })?;
            Ok(Arc::new(method(&*this, args)?) as Instance)
        });

        self.methods.insert(
            name.clone(),
            MethodDescriptor {
                name,
                parameters,
                invoker,
            },
        );
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    pub fn is_instantiable(&self) -> bool {
        self.constructor.is_some()
    }

    pub fn constructor(&self) -> Option<&Callable> {
        self.constructor.as_ref()
    }

    pub fn get_method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("id", &self.id)
            .field("instantiable", &self.is_instantiable())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// 类注册表：标识符 -> 描述符，同时维护 `TypeId` 索引用于方法查找
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: HashMap<String, ClassDescriptor>,
    by_type: HashMap<TypeId, String>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册描述符，同名覆盖
    pub fn register(&mut self, descriptor: ClassDescriptor) {
        tracing::trace!("Registering class descriptor '{}'", descriptor.id());
        if let Some(type_id) = descriptor.type_id() {
            self.by_type.insert(type_id, descriptor.id().to_string());
        }
        self.classes.insert(descriptor.id().to_string(), descriptor);
    }

    pub fn get(&self, id: &str) -> Option<&ClassDescriptor> {
        self.classes.get(id)
    }

    pub fn get_by_type(&self, type_id: TypeId) -> Option<&ClassDescriptor> {
        self.by_type.get(&type_id).and_then(|id| self.classes.get(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.classes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
