use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::class::{Arguments, Callable, ClassDescriptor, ClassRegistry, Instance, Parameter, ParameterType};
use crate::component::Component;
use crate::constants::is_container_type_name;
use crate::error::{ContainerError, ContainerResult};
use crate::utils::dependency::LoopTracker;

/// 容器的公开接口
///
/// 参数类型声明为 `dyn ServiceLocator` 或 `Container` 时，注入的都是当前容器句柄
pub trait ServiceLocator: Send + Sync {
    /// 通过标识符获取实例
    fn get(&self, id: &str) -> ContainerResult<Instance>;

    /// 是否存在该标识符的指令（不会触发解析）
    fn has(&self, id: &str) -> bool;
}

/// 容器指令 - 描述一个标识符如何得到实例
#[derive(Clone)]
pub enum Instruction {
    /// 工厂函数，参数会被自动装配；第一次解析后被替换为其产物
    Factory(Callable),

    /// 指向另一个标识符，本身不会被缓存
    Alias(String),

    /// 已构建好的实例
    Instance(Instance),
}

impl Instruction {
    /// 创建工厂指令
    pub fn factory<T, F>(parameters: Vec<Parameter>, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Instruction::Factory(Callable::new(parameters, factory))
    }

    /// 创建别名指令
    pub fn alias(id: impl Into<String>) -> Self {
        Instruction::Alias(id.into())
    }

    /// 包装一个新值
    pub fn instance<T: Any + Send + Sync>(value: T) -> Self {
        Instruction::Instance(Arc::new(value))
    }

    /// 共享一个已有的 `Arc`，之后 `get` 返回的是同一个对象
    pub fn shared<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Instruction::Instance(value)
    }

    /// 以 trait 对象注册服务，通过 `Arguments::service` / `Container::get_service` 取回
    pub fn service<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Instruction::Instance(Arc::new(value))
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Factory(callable) => f.debug_tuple("Factory").field(callable).finish(),
            Instruction::Alias(id) => f.debug_tuple("Alias").field(id).finish(),
            Instruction::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

struct ContainerInner {
    /// 指令表，同时充当单例缓存
    instructions: RwLock<HashMap<String, Instruction>>,

    /// 类注册表（反射的替代）
    classes: RwLock<ClassRegistry>,
}

/// 依赖注入容器
///
/// 克隆得到的是同一个容器的句柄。解析过程中不持有任何锁去调用工厂，
/// 工厂和构造函数可以安全地再次访问容器。
///
/// 缓存的单例如果自己持有容器句柄，会和容器形成引用环，需要 `dispose()` 释放。
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    /// 创建空容器
    pub fn new() -> Self {
        Self::with_classes(ClassRegistry::new())
    }

    /// 使用已有的类注册表创建容器
    pub fn with_classes(classes: ClassRegistry) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                instructions: RwLock::new(HashMap::new()),
                classes: RwLock::new(classes),
            }),
        }
    }

    /// 构建器模式创建容器
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// 注册类描述符
    pub fn register_class(&self, descriptor: ClassDescriptor) {
        self.inner.classes.write().register(descriptor);
    }

    /// 注册组件
    pub fn register_component<T: Component>(&self) {
        self.register_class(T::descriptor());
    }

    /// 通过标识符获取单例实例
    pub fn get(&self, id: &str) -> ContainerResult<Instance> {
        self.resolve(id, &LoopTracker::new())
    }

    /// 获取并 downcast 为 `T`
    pub fn get_as<T: Any + Send + Sync>(&self, id: &str) -> ContainerResult<Arc<T>> {
        self.get(id)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                name: id.to_string(),
                expected: type_name::<T>().to_string(),
            })
    }

    /// 以 `T` 的类型名作为标识符获取
    pub fn get_typed<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        self.get_as::<T>(type_name::<T>())
    }

    /// 获取以 `type_name::<T>()` 注册的 trait 对象服务
    pub fn get_service<T: ?Sized + Send + Sync + 'static>(&self) -> ContainerResult<Arc<T>> {
        self.get_as::<Arc<T>>(type_name::<T>())
            .map(|service| Arc::clone(&*service))
    }

    /// 注册或覆盖指令，不会立即构建
    pub fn set(&self, id: impl Into<String>, instruction: Instruction) {
        let id = id.into();
        tracing::trace!("Setting instruction for '{}': {:?}", id, instruction);
        self.inner.instructions.write().insert(id, instruction);
    }

    /// 清空所有指令和已缓存的实例
    ///
    /// 持有容器句柄的单例（例如动作执行器）与容器互相引用，只能通过这里释放。
    pub fn dispose(&self) {
        let instructions = std::mem::take(&mut *self.inner.instructions.write());
        tracing::debug!("Disposing {} container entries", instructions.len());
        drop(instructions);
    }

    /// 是否存在该标识符的指令
    pub fn has(&self, id: &str) -> bool {
        self.inner.instructions.read().contains_key(id)
    }

    /// 解析 `class` 并调用其方法 `method`
    ///
    /// `provided` 中与参数同名的值会原样传入，优先于按类型的自动装配。
    /// 方法本身返回的错误原样向上传递。
    pub fn call(
        &self,
        class: &str,
        method: &str,
        provided: &HashMap<String, Instance>,
    ) -> anyhow::Result<Instance> {
        let instance = self.get(class)?;

        let descriptor = {
            let classes = self.inner.classes.read();
            let concrete: &dyn Any = &*instance;
            let class_descriptor = classes
                .get_by_type(concrete.type_id())
                .or_else(|| classes.get(class))
                .ok_or_else(|| ContainerError::NotFound(class.to_string()))?;

            class_descriptor
                .get_method(method)
                .cloned()
                .ok_or_else(|| ContainerError::MethodNotFound {
                    class: class.to_string(),
                    method: method.to_string(),
                })?
        };

        let tracker = LoopTracker::new().enter(class)?;
        let args = self.build_dependencies(descriptor.parameters(), &tracker, provided)?;

        tracing::debug!("Calling {}::{} with arguments {:?}", class, method, args);
        descriptor.invoke(instance, &args)
    }

    fn resolve(&self, id: &str, tracker: &LoopTracker) -> ContainerResult<Instance> {
        let tracker = tracker.enter(id)?;

        let instruction = self.inner.instructions.read().get(id).cloned();

        match instruction {
            None => self.resolve_class_name(id, &tracker),
            Some(Instruction::Factory(callable)) => self.resolve_callable(id, &callable, &tracker),
            Some(Instruction::Instance(instance)) => Ok(instance),
            Some(Instruction::Alias(target)) => {
                tracing::trace!("Resolving alias '{}' -> '{}'", id, target);
                self.resolve(&target, &tracker)
            }
        }
    }

    fn resolve_callable(
        &self,
        id: &str,
        callable: &Callable,
        tracker: &LoopTracker,
    ) -> ContainerResult<Instance> {
        let args = self.build_dependencies(callable.parameters(), tracker, &HashMap::new())?;

        let instance = callable.invoke(&args).map_err(|source| {
            tracing::error!("Factory for '{}' failed: {:#}", id, source);
            ContainerError::CreationFailed {
                id: id.to_string(),
                source,
            }
        })?;

        self.remember(id, &instance);
        tracing::debug!("Factory instance '{}' created and cached", id);
        Ok(instance)
    }

    fn resolve_class_name(&self, id: &str, tracker: &LoopTracker) -> ContainerResult<Instance> {
        let constructor = {
            let classes = self.inner.classes.read();
            let descriptor = classes.get(id).ok_or_else(|| {
                tracing::debug!("Class '{}' not found in registry", id);
                ContainerError::NotFound(id.to_string())
            })?;

            descriptor
                .constructor()
                .cloned()
                .ok_or_else(|| ContainerError::NotInstantiable(id.to_string()))?
        };

        let args = self.build_dependencies(constructor.parameters(), tracker, &HashMap::new())?;

        let instance = constructor.invoke(&args).map_err(|source| {
            tracing::error!("Constructor of '{}' failed: {:#}", id, source);
            ContainerError::CreationFailed {
                id: id.to_string(),
                source,
            }
        })?;

        self.remember(id, &instance);
        tracing::debug!("Class instance '{}' created and cached", id);
        Ok(instance)
    }

    fn remember(&self, id: &str, instance: &Instance) {
        self.inner
            .instructions
            .write()
            .insert(id.to_string(), Instruction::Instance(Arc::clone(instance)));
    }

    fn build_dependencies(
        &self,
        parameters: &[Parameter],
        tracker: &LoopTracker,
        provided: &HashMap<String, Instance>,
    ) -> ContainerResult<Arguments> {
        let parameters = match parameters.split_last() {
            Some((last, rest)) if last.is_variadic() => rest,
            _ => parameters,
        };

        let mut args = Arguments::new();
        for parameter in parameters {
            let value = self.autowire(parameter, tracker, provided)?;
            args.push(parameter.name(), value);
        }

        Ok(args)
    }

    fn autowire(
        &self,
        parameter: &Parameter,
        tracker: &LoopTracker,
        provided: &HashMap<String, Instance>,
    ) -> ContainerResult<Instance> {
        let name = parameter.name();

        if let Some(value) = provided.get(name) {
            return Ok(Arc::clone(value));
        }

        match parameter.ty() {
            // 默认值也不能代替类型声明
            ParameterType::Untyped => Err(ContainerError::MissingTypeHint(name.to_string())),
            ParameterType::Named(id) if is_container_type_name(id) => Ok(Arc::new(self.clone())),
            ParameterType::Union(_) => Err(ContainerError::UnionType(name.to_string())),
            ParameterType::Named(id) => self.resolve(id, tracker),
            ParameterType::Builtin(_) => parameter
                .default_value()
                .map(Arc::clone)
                .ok_or_else(|| ContainerError::UnresolvableParameter(name.to_string())),
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("instructions", &self.inner.instructions.read().len())
            .field("classes", &self.inner.classes.read().len())
            .finish()
    }
}

impl ServiceLocator for Container {
    fn get(&self, id: &str) -> ContainerResult<Instance> {
        Container::get(self, id)
    }

    fn has(&self, id: &str) -> bool {
        Container::has(self, id)
    }
}

/// 容器构建器
#[derive(Default)]
pub struct ContainerBuilder {
    classes: ClassRegistry,
    instructions: Vec<(String, Instruction)>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册类描述符
    pub fn class(mut self, descriptor: ClassDescriptor) -> Self {
        self.classes.register(descriptor);
        self
    }

    /// 注册组件
    pub fn component<T: Component>(self) -> Self {
        self.class(T::descriptor())
    }

    /// 预置指令
    pub fn set(mut self, id: impl Into<String>, instruction: Instruction) -> Self {
        self.instructions.push((id.into(), instruction));
        self
    }

    /// 构建容器
    pub fn build(self) -> Container {
        let container = Container::with_classes(self.classes);
        for (id, instruction) in self.instructions {
            container.set(id, instruction);
        }
        tracing::debug!("Container built: {:?}", container);
        container
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Config;

    struct Repository {
        config: Arc<Config>,
    }

    impl Component for Repository {
        fn dependencies() -> Vec<Parameter> {
            vec![Parameter::of::<Config>("config")]
        }

        fn construct(args: &Arguments) -> anyhow::Result<Self> {
            Ok(Self {
                config: args.get::<Config>("config")?,
            })
        }
    }

    struct Controller {
        repository: Arc<Repository>,
    }

    impl Controller {
        fn show(&self, id: String, config: Arc<Config>) -> String {
            assert!(Arc::ptr_eq(&config, &self.repository.config));
            format!("venue {}", id)
        }
    }

    impl Component for Controller {
        fn dependencies() -> Vec<Parameter> {
            vec![Parameter::of::<Repository>("repository")]
        }

        fn construct(args: &Arguments) -> anyhow::Result<Self> {
            Ok(Self {
                repository: args.get::<Repository>("repository")?,
            })
        }

        fn descriptor() -> ClassDescriptor {
            ClassDescriptor::build::<Self, _>(Self::dependencies(), Self::construct).method(
                "show",
                vec![Parameter::string("id"), Parameter::of::<Config>("config")],
                |this: &Controller, args| Ok(this.show(args.string("id")?, args.get::<Config>("config")?)),
            )
        }
    }

    fn container() -> Container {
        Container::builder()
            .class(ClassDescriptor::new::<Config>())
            .component::<Repository>()
            .component::<Controller>()
            .build()
    }

    #[test]
    fn test_class_is_autowired_and_cached() {
        let container = container();
        assert!(!container.has(type_name::<Repository>()));

        let first = container.get_typed::<Repository>().unwrap();
        let second = container.get_typed::<Repository>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(container.has(type_name::<Repository>()));
        assert!(container.has(type_name::<Config>()));
        assert!(Arc::ptr_eq(&first.config, &container.get_typed::<Config>().unwrap()));
    }

    #[test]
    fn test_factory_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let container = container();
        container.set(
            "greeting",
            Instruction::factory(vec![Parameter::of::<Config>("config")], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("woof".to_string())
            }),
        );

        let first = container.get_as::<String>("greeting").unwrap();
        let second = container.get_as::<String>("greeting").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.as_str(), "woof");
    }

    #[test]
    fn test_prebuilt_instance_is_returned() {
        let shared = Arc::new(Config);
        let container = Container::builder()
            .set("config", Instruction::shared(Arc::clone(&shared)))
            .build();

        assert!(container.has("config"));
        assert!(Arc::ptr_eq(&container.get_as::<Config>("config").unwrap(), &shared));
    }

    #[test]
    fn test_alias_resolves_to_same_instance() {
        let container = container();
        container.set("repo", Instruction::alias("repository"));
        container.set("repository", Instruction::alias(type_name::<Repository>()));

        let via_alias = container.get_as::<Repository>("repo").unwrap();
        let via_target = container.get_as::<Repository>("repository").unwrap();
        let via_class = container.get_typed::<Repository>().unwrap();

        assert!(Arc::ptr_eq(&via_alias, &via_target));
        assert!(Arc::ptr_eq(&via_alias, &via_class));
        assert!(matches!(
            container.inner.instructions.read().get("repo"),
            Some(Instruction::Alias(_))
        ));
    }

    #[test]
    fn test_alias_is_not_cached() {
        let container = Container::new();
        container.set("name", Instruction::alias("first"));
        container.set("first", Instruction::instance("rex".to_string()));
        assert_eq!(container.get_as::<String>("name").unwrap().as_str(), "rex");

        container.set("first", Instruction::instance("fido".to_string()));
        assert_eq!(container.get_as::<String>("name").unwrap().as_str(), "fido");
    }

    struct A;
    struct B;
    struct C;

    fn cyclic(id: &'static str, next: &'static str) -> ClassDescriptor {
        ClassDescriptor::build::<A, _>(vec![Parameter::named("next", next)], |_| Ok(A)).with_id(id)
    }

    #[test]
    fn test_circular_dependency_is_detected() {
        let container = Container::builder()
            .class(cyclic("A", "B"))
            .class(cyclic("B", "C"))
            .class(cyclic("C", "A"))
            .build();

        match container.get("A") {
            Err(ContainerError::CircularDependency(chain)) => assert_eq!(chain, "A -> B -> C -> A"),
            other => panic!("Expected CircularDependency, got {:?}", other.map(|_| ())),
        }
        assert!(!container.has("A"));
    }

    #[test]
    fn test_circular_dependency_through_factory() {
        let container = Container::builder()
            .set("b", Instruction::factory(vec![Parameter::named("c", "c")], |_| Ok(B)))
            .set("c", Instruction::factory(vec![Parameter::named("b", "b")], |_| Ok(C)))
            .build();

        assert!(matches!(
            container.get("b"),
            Err(ContainerError::CircularDependency(_))
        ));
    }

    #[test]
    fn test_unknown_and_abstract_classes() {
        let container = Container::builder()
            .class(ClassDescriptor::abstract_type("Cache"))
            .build();

        let missing = container.get("Nope").unwrap_err();
        assert!(missing.is_not_found());

        let abstract_class = container.get("Cache").unwrap_err();
        assert!(matches!(abstract_class, ContainerError::NotInstantiable(_)));
        assert!(!abstract_class.is_not_found());
    }

    #[test]
    fn test_parameter_rules() {
        let container = Container::new();

        let union = Callable::new(
            vec![Parameter::union("store", ["Redis", "Memory"])],
            |_| Ok(()),
        );
        let untyped = Callable::new(vec![Parameter::untyped("value")], |_| Ok(()));
        let untyped_defaulted = Callable::new(
            vec![Parameter::untyped("value").with_default(5_i64)],
            |args| Ok(*args.get::<i64>("value")?),
        );
        let scalar = Callable::new(vec![Parameter::builtin("limit", "int")], |_| Ok(()));
        let defaulted = Callable::new(
            vec![Parameter::builtin("limit", "int").with_default(25_i64)],
            |args| Ok(*args.get::<i64>("limit")?),
        );

        container.set("union", Instruction::Factory(union));
        container.set("untyped", Instruction::Factory(untyped));
        container.set("untyped_defaulted", Instruction::Factory(untyped_defaulted));
        container.set("scalar", Instruction::Factory(scalar));
        container.set("defaulted", Instruction::Factory(defaulted));

        assert!(matches!(container.get("union"), Err(ContainerError::UnionType(_))));
        assert!(matches!(container.get("untyped"), Err(ContainerError::MissingTypeHint(_))));
        assert!(matches!(
            container.get("untyped_defaulted"),
            Err(ContainerError::MissingTypeHint(_))
        ));
        assert!(matches!(
            container.get("scalar"),
            Err(ContainerError::UnresolvableParameter(_))
        ));
        assert_eq!(*container.get_as::<i64>("defaulted").unwrap(), 25);
    }

    #[test]
    fn test_trailing_variadic_is_skipped() {
        let container = Container::new();
        container.set(
            "count",
            Instruction::factory(
                vec![
                    Parameter::builtin("first", "int").with_default(1_i64),
                    Parameter::untyped("rest").variadic(),
                ],
                |args| Ok(args.len()),
            ),
        );

        assert_eq!(*container.get_as::<usize>("count").unwrap(), 1);
    }

    #[test]
    fn test_container_injects_itself() {
        let container = Container::new();
        container.set(
            "locator",
            Instruction::factory(
                vec![
                    Parameter::of::<Container>("container"),
                    Parameter::of::<dyn ServiceLocator>("locator"),
                ],
                |args| {
                    let a = args.get::<Container>("container")?;
                    let b = args.get::<Container>("locator")?;
                    Ok(Arc::ptr_eq(&a.inner, &b.inner))
                },
            ),
        );

        assert!(*container.get_as::<bool>("locator").unwrap());
    }

    #[test]
    fn test_dispose_releases_self_referencing_singletons() {
        let container = Container::new();
        container.set(
            "dispatcher",
            Instruction::factory(vec![Parameter::of::<Container>("container")], |args| {
                Ok(args.get::<Container>("container")?.as_ref().clone())
            }),
        );

        let dispatcher = Arc::downgrade(&container.get_as::<Container>("dispatcher").unwrap());
        assert!(dispatcher.upgrade().is_some());

        container.dispose();
        assert!(dispatcher.upgrade().is_none());
        assert!(!container.has("dispatcher"));
    }

    #[test]
    fn test_call_with_provided_arguments() {
        let container = container();
        let mut provided: HashMap<String, Instance> = HashMap::new();
        provided.insert("id".to_string(), Arc::new("42".to_string()));

        let result = container
            .call(type_name::<Controller>(), "show", &provided)
            .unwrap();

        assert_eq!(result.downcast_ref::<String>().unwrap(), "venue 42");
    }

    #[test]
    fn test_call_unknown_method() {
        let container = container();
        let err = container
            .call(type_name::<Controller>(), "destroy", &HashMap::new())
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ContainerError>(),
            Some(ContainerError::MethodNotFound { .. })
        ));
    }

    #[test]
    fn test_call_missing_provided_argument() {
        let container = container();
        let err = container
            .call(type_name::<Controller>(), "show", &HashMap::new())
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ContainerError>(),
            Some(ContainerError::UnresolvableParameter(_))
        ));
    }

    #[test]
    fn test_constructor_failure_is_wrapped() {
        let container = Container::new();
        container.set(
            "broken",
            Instruction::factory(Vec::new(), |_| -> anyhow::Result<()> {
                anyhow::bail!("database unreachable")
            }),
        );

        match container.get("broken") {
            Err(ContainerError::CreationFailed { id, source }) => {
                assert_eq!(id, "broken");
                assert_eq!(source.to_string(), "database unreachable");
            }
            other => panic!("Expected CreationFailed, got {:?}", other.map(|_| ())),
        }
        assert!(matches!(
            container.inner.instructions.read().get("broken"),
            Some(Instruction::Factory(_))
        ));
    }
}
