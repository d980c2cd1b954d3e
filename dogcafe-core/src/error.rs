/// 统一的错误处理类型
///
/// 容器、缓存、配置各自有 `thiserror` 定义的错误枚举；
/// 工厂函数、构造函数和控制器方法的返回值使用 `anyhow::Result`，
/// 由调用方按需 downcast 出具体的错误类型。
pub use anyhow::Result;

use thiserror::Error;

/// 容器操作结果
pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

/// 应用启动结果
pub type ApplicationResult<T> = std::result::Result<T, ApplicationError>;

/// 依赖注入容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 标识符既没有指令，也不是已注册的类
    #[error("Cannot reflect: `{0}` is not a class")]
    NotFound(String),

    /// 类已注册但不可实例化（抽象类型 / 接口）
    #[error("Cannot reflect: `{0}` is not instantiable")]
    NotInstantiable(String),

    /// 循环依赖，携带完整的解析链
    #[error("Circular dependency: {0}")]
    CircularDependency(String),

    #[error("Cannot resolve parameter `{0}`: no type hint provided")]
    MissingTypeHint(String),

    #[error("Cannot resolve parameter `{0}`: union types are not supported yet")]
    UnionType(String),

    #[error("Cannot resolve parameter: {0}")]
    UnresolvableParameter(String),

    #[error("Method `{method}` not found on `{class}`")]
    MethodNotFound { class: String, method: String },

    #[error("Type mismatch for `{name}`: expected `{expected}`")]
    TypeMismatch { name: String, expected: String },

    /// 工厂或构造函数自身执行失败
    #[error("Failed to build `{id}`: {source}")]
    CreationFailed {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ContainerError {
    /// 是否属于 "未找到" 一类（其余均为配置错误）
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContainerError::NotFound(_))
    }
}

/// 缓存错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache operation failed for key `{key}`: {message}")]
    Operation { key: String, message: String },
}

/// 缓存操作结果
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config not found: `{0}`")]
    NotFound(String),

    #[error("Failed to read config file `{path}`: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse config file `{path}`: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid value for `{key}`: {message}")]
    InvalidValue { key: String, message: String },
}

/// 应用启动错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Failed to initialize logging: {0}")]
    LoggingInitFailed(String),

    #[error("{0}")]
    Other(String),
}
