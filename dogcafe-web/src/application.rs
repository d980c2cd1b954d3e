//! 应用启动
//!
//! 组装配置、缓存、容器和路由器。路由表在 `build()` 时编译（或从缓存加载），
//! 路由有冲突或格式错误时启动直接失败。

use std::any::type_name;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use dogcafe_core::{
    AppProperties, ApplicationResult, Cache, CacheProperties, ClassDescriptor,
    Component, ConfigError, ConfigValue, Container, Environment, EnvironmentPropertySource,
    Instruction, LoggingConfig, MapPropertySource, MemoryCache, Parameter, TomlPropertySource,
};

use crate::controller::{Controller, ControllerRoutes};
use crate::exception_handler::{DefaultErrorMapper, ErrorMapper};
use crate::executor::ActionExecutor;
use crate::registry::RouteRegistry;
use crate::router::Router;
use crate::server::{self, ServerProperties};
use crate::view::{JsonViewRenderer, ViewRenderer};

enum LoggingSetup {
    Explicit(LoggingConfig),
    FromEnvironment,
}

/// Web 应用构建器
pub struct WebApplication {
    name: String,
    config_files: Vec<String>,
    env_prefix: String,
    logging: Option<LoggingSetup>,
    overrides: Vec<(String, ConfigValue)>,
    classes: Vec<ClassDescriptor>,
    controllers: Vec<ControllerRoutes>,
    instructions: Vec<(String, Instruction)>,
    cache: Option<Arc<dyn Cache>>,
    renderer: Option<Arc<dyn ViewRenderer>>,
    error_mapper: Option<Arc<dyn ErrorMapper>>,
}

impl WebApplication {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config_files: vec!["application.toml".to_string()],
            env_prefix: "APP_".to_string(),
            logging: None,
            overrides: Vec::new(),
            classes: Vec::new(),
            controllers: Vec::new(),
            instructions: Vec::new(),
            cache: None,
            renderer: None,
            error_mapper: None,
        }
    }

    /// 设置配置文件路径（文件不存在时跳过）
    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.config_files = vec![path.into()];
        self
    }

    /// 设置环境变量前缀
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// 设置后在 `build()` 时初始化日志
    pub fn logging(mut self, config: LoggingConfig) -> Self {
        self.logging = Some(LoggingSetup::Explicit(config));
        self
    }

    /// 按配置中的 `logging.*` 初始化日志
    pub fn logging_from_config(mut self) -> Self {
        self.logging = Some(LoggingSetup::FromEnvironment);
        self
    }

    /// 运行时覆盖配置，优先级介于环境变量和配置文件之间
    pub fn property(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.overrides.push((key.into(), value));
        self
    }

    /// 注册控制器：类描述符 + 路由
    pub fn controller<C: Controller>(mut self) -> Self {
        self.classes.push(C::descriptor());
        self.controllers.push(ControllerRoutes::of::<C>());
        self
    }

    pub fn component<T: Component>(mut self) -> Self {
        self.classes.push(T::descriptor());
        self
    }

    pub fn class(mut self, descriptor: ClassDescriptor) -> Self {
        self.classes.push(descriptor);
        self
    }

    /// 预置指令，会覆盖同名的内置绑定
    pub fn instruction(mut self, id: impl Into<String>, instruction: Instruction) -> Self {
        self.instructions.push((id.into(), instruction));
        self
    }

    /// 使用指定的缓存，不再根据 `cache.driver` 创建
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn ViewRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn error_mapper(mut self, error_mapper: Arc<dyn ErrorMapper>) -> Self {
        self.error_mapper = Some(error_mapper);
        self
    }

    /// 构建容器并解析路由器
    pub fn build(mut self) -> ApplicationResult<Application> {
        let start_time = Instant::now();
        let environment = Arc::new(self.load_environment());

        match self.logging.take() {
            Some(LoggingSetup::Explicit(config)) => config.init()?,
            Some(LoggingSetup::FromEnvironment) => LoggingConfig::from_environment(&environment).init()?,
            None => {}
        }

        tracing::info!("Starting {} application", self.name);
        let app = AppProperties::from_environment(&environment);
        let server = ServerProperties::from_environment(&environment);
        let cache_properties = CacheProperties::from_environment(&environment);
        tracing::info!("Environment: {}", app.env);

        let cache = match self.cache {
            Some(cache) => cache,
            None => create_cache(&cache_properties)?,
        };
        let renderer = self
            .renderer
            .unwrap_or_else(|| Arc::new(JsonViewRenderer) as Arc<dyn ViewRenderer>);
        let error_mapper = self
            .error_mapper
            .unwrap_or_else(|| Arc::new(DefaultErrorMapper) as Arc<dyn ErrorMapper>);
        let controllers = self.controllers;

        let mut builder = Container::builder()
            .component::<ActionExecutor>()
            .component::<Router>()
            .set(type_name::<Environment>(), Instruction::shared(environment))
            .set(type_name::<AppProperties>(), Instruction::instance(app.clone()))
            .set(type_name::<ServerProperties>(), Instruction::instance(server.clone()))
            .set(type_name::<CacheProperties>(), Instruction::instance(cache_properties))
            .set(type_name::<dyn Cache>(), Instruction::service(cache))
            .set(type_name::<dyn ViewRenderer>(), Instruction::service(renderer))
            .set(type_name::<dyn ErrorMapper>(), Instruction::service(error_mapper))
            .set(
                type_name::<RouteRegistry>(),
                Instruction::factory(vec![Parameter::of::<dyn Cache>("cache")], move |args| {
                    let cache = args.service::<dyn Cache>("cache")?;
                    Ok(RouteRegistry::start(cache.as_ref(), &controllers)?)
                }),
            );

        for descriptor in self.classes {
            builder = builder.class(descriptor);
        }
        for (id, instruction) in self.instructions {
            builder = builder.set(id, instruction);
        }

        let container = builder.build();
        let router = container.get_typed::<Router>()?;

        tracing::info!(
            "Started {} in {}ms ({} actions)",
            self.name,
            start_time.elapsed().as_millis(),
            router.registry().len()
        );

        Ok(Application {
            name: self.name,
            container,
            router,
            server,
            app,
        })
    }

    /// 配置源优先级：环境变量 > 运行时覆盖 > 配置文件
    fn load_environment(&self) -> Environment {
        let environment = Environment::new();

        for config_file in &self.config_files {
            if !Path::new(config_file).exists() {
                tracing::debug!("Configuration file not found: {}", config_file);
                continue;
            }
            match TomlPropertySource::from_file(config_file) {
                Ok(source) => {
                    tracing::info!("Loaded configuration from: {}", config_file);
                    environment.add_property_source(Box::new(source));
                }
                Err(e) => tracing::warn!("Failed to load {}: {}", config_file, e),
            }
        }

        if !self.overrides.is_empty() {
            let overrides = self
                .overrides
                .iter()
                .fold(MapPropertySource::new("overrides"), |source, (key, value)| {
                    source.with_property(key.clone(), value.clone())
                });
            environment.add_property_source(Box::new(overrides));
        }

        environment.add_property_source(Box::new(EnvironmentPropertySource::new(&self.env_prefix)));
        tracing::debug!("Environment variable prefix: {}", self.env_prefix);

        environment
    }
}

fn create_cache(properties: &CacheProperties) -> ApplicationResult<Arc<dyn Cache>> {
    match properties.driver.as_str() {
        "memory" => Ok(Arc::new(MemoryCache::new())),
        #[cfg(feature = "redis")]
        "redis" => Ok(Arc::new(dogcafe_core::RedisCache::connect(properties)?)),
        other => Err(ConfigError::InvalidValue {
            key: "cache.driver".to_string(),
            message: format!("unsupported cache driver `{}`", other),
        }
        .into()),
    }
}

/// 构建完成的应用
pub struct Application {
    name: String,
    container: Container,
    router: Arc<Router>,
    server: ServerProperties,
    app: AppProperties,
}

impl Application {
    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn router(&self) -> Arc<Router> {
        Arc::clone(&self.router)
    }

    pub fn server_properties(&self) -> &ServerProperties {
        &self.server
    }

    pub fn app_properties(&self) -> &AppProperties {
        &self.app
    }

    /// axum 路由（用于测试或嵌入到其他服务）
    pub fn routes(&self) -> axum::Router {
        server::routes(self.router())
    }

    /// 启动 HTTP 服务，直到收到 Ctrl+C，退出前释放容器
    pub async fn run(self) -> ApplicationResult<()> {
        tracing::info!("Serving {}", self.name);
        let result = server::serve(Arc::clone(&self.router), &self.server).await;
        self.shutdown();
        result
    }

    /// 释放容器中的全部单例
    ///
    /// 容器缓存的 `Router` 通过 `ActionExecutor` 持有容器句柄，不调用这里两者都不会被释放。
    /// 之后仍被外部持有的 `Router` 无法再执行任何动作。
    pub fn shutdown(self) {
        self.container.dispose();
        tracing::info!("{} shut down", self.name);
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.name)
            .field("container", &self.container)
            .field("server", &self.server)
            .field("app", &self.app)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ActionRoutes, Route};
    use crate::error::RouteError;
    use crate::request::{HttpMethod, RequestInfo};
    use crate::response::{ActionResult, Body};
    use dogcafe_core::{ApplicationError, Arguments, ContainerError};

    struct Greeting(String);

    #[derive(Default)]
    struct HelloController;

    impl Component for HelloController {
        fn construct(_: &Arguments) -> anyhow::Result<Self> {
            Ok(Self)
        }

        fn descriptor() -> ClassDescriptor {
            ClassDescriptor::new::<Self>().method(
                "hello",
                vec![Parameter::string("name"), Parameter::of::<Greeting>("greeting")],
                |_: &Self, args| {
                    let greeting = args.get::<Greeting>("greeting")?;
                    Ok(format!("{}, {}!", greeting.0, args.string("name")?))
                },
            )
        }
    }

    impl Controller for HelloController {
        fn routes() -> Vec<ActionRoutes> {
            vec![ActionRoutes::new("hello", vec![Route::get("/hello/:name")])]
        }
    }

    #[derive(Default)]
    struct ShadowController;

    impl Component for ShadowController {
        fn construct(_: &Arguments) -> anyhow::Result<Self> {
            Ok(Self)
        }

        fn descriptor() -> ClassDescriptor {
            ClassDescriptor::new::<Self>().method("hello", vec![], |_: &Self, _| {
                Ok(ActionResult::from(Body::empty()))
            })
        }
    }

    impl Controller for ShadowController {
        fn routes() -> Vec<ActionRoutes> {
            vec![ActionRoutes::new("hello", vec![Route::get("/hello/:name")])]
        }
    }

    fn application() -> WebApplication {
        WebApplication::new("test")
            .config_file("does-not-exist.toml")
            .instruction(type_name::<Greeting>(), Instruction::instance(Greeting("Woof".into())))
            .controller::<HelloController>()
    }

    #[test]
    fn test_build_and_resolve() {
        let app = application().build().unwrap();

        let response = app
            .router()
            .resolve(&RequestInfo::new("/hello/Rex", HttpMethod::Get));
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "Woof, Rex!");

        assert!(app.container().has(type_name::<RouteRegistry>()));
        assert_eq!(app.app_properties().env, "production");
    }

    #[test]
    fn test_shutdown_releases_router() {
        let app = application().build().unwrap();
        let router = Arc::downgrade(&app.router());
        assert!(router.upgrade().is_some());

        app.shutdown();
        assert!(router.upgrade().is_none());
    }

    #[test]
    fn test_conflicting_routes_fail_boot() {
        let err = application().controller::<ShadowController>().build().unwrap_err();

        match err {
            ApplicationError::Container(ContainerError::CreationFailed { id, source }) => {
                assert_eq!(id, type_name::<RouteRegistry>());
                assert!(matches!(
                    source.downcast_ref::<RouteError>(),
                    Some(RouteError::Conflict { .. })
                ));
            }
            other => panic!("Expected route conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_property_overrides() {
        let app = application()
            .property("server.port", ConfigValue::Int(9090))
            .property("app.env", ConfigValue::String("development".into()))
            .build()
            .unwrap();

        assert_eq!(app.server_properties().port, 9090);
        assert_eq!(app.app_properties().env, "development");
    }

    #[test]
    fn test_unknown_cache_driver() {
        let err = application()
            .property("cache.driver", ConfigValue::String("memcached".into()))
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            ApplicationError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_provided_cache_is_used() {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        application().cache(Arc::clone(&cache)).build().unwrap();

        assert!(cache.has(crate::constants::ROUTES_CACHE_KEY).unwrap());
    }
}
