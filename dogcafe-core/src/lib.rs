// dogcafe-core: Dog Cafe 的依赖注入容器与基础设施
//
// 提供：
// - 基于类描述符的自动装配容器（单例、别名、循环依赖检测）
// - 键值缓存抽象（内存 / Redis）
// - 分层配置与日志初始化

pub mod cache;
pub mod class;
pub mod component;
pub mod config;
pub mod constants;
pub mod container;
pub mod error;
pub mod logging;
pub mod utils;

// 重新导出常用类型
pub use cache::{Cache, CacheProperties, MemoryCache};
#[cfg(feature = "redis")]
pub use cache::RedisCache;
pub use class::{
    Arguments, Callable, ClassDescriptor, ClassRegistry, Instance, MethodDescriptor, Parameter,
    ParameterType,
};
pub use component::Component;
pub use config::{
    AppProperties, ConfigValue, Environment, EnvironmentPropertySource, MapPropertySource,
    PropertySource, TomlPropertySource,
};
pub use container::{Container, ContainerBuilder, Instruction, ServiceLocator};
pub use error::{
    ApplicationError, ApplicationResult, CacheError, CacheResult, ConfigError, ContainerError,
    ContainerResult, Result,
};
pub use logging::{LogFormat, LogLevel, LoggingConfig};

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::cache::{Cache, MemoryCache};
    pub use crate::class::{
        Arguments, Callable, ClassDescriptor, ClassRegistry, Instance, Parameter, ParameterType,
    };
    pub use crate::component::Component;
    pub use crate::config::{AppProperties, ConfigValue, Environment, MapPropertySource};
    pub use crate::container::{Container, ContainerBuilder, Instruction, ServiceLocator};
    pub use crate::error::{
        ApplicationError, CacheError, ConfigError, ContainerError, ContainerResult, Result,
    };
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use anyhow::{anyhow, Context};
}
