//! 日志初始化
//!
//! 级别和格式可以来自 `LOG_LEVEL` / `LOG_FORMAT` 环境变量，
//! 也可以来自配置文件中的 `logging.level` / `logging.format`。

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::{fmt as subscriber, EnvFilter};

use crate::config::Environment;
use crate::error::{ApplicationError, ApplicationResult};

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("Invalid log level: {}", other)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 单行紧凑输出（默认）
    Compact,
    Full,
    /// 每行一个 JSON 对象，适合日志收集
    Json,
    /// 多行彩色输出，适合本地开发
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "full" => Ok(LogFormat::Full),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("Invalid log format: {}", other)),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,

    /// 是否输出模块路径
    pub show_target: bool,

    pub show_thread_ids: bool,

    /// 自定义过滤器，例如 `dogcafe_web=debug,tower_http=info`
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
            filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// 从进程环境变量读取（`RUST_LOG`、`LOG_LEVEL`、`LOG_FORMAT`）
    ///
    /// 无法解析的值会被忽略，保留默认值
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(filter) = std::env::var("RUST_LOG") {
            config.filter = Some(filter);
        }
        if let Some(level) = std::env::var("LOG_LEVEL").ok().and_then(|v| v.parse().ok()) {
            config.level = level;
        }
        if let Some(format) = std::env::var("LOG_FORMAT").ok().and_then(|v| v.parse().ok()) {
            config.format = format;
        }

        config
    }

    /// 从配置读取 `logging.*`
    pub fn from_environment(env: &Environment) -> Self {
        let defaults = Self::default();
        Self {
            level: env
                .get_string("logging.level")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.level),
            format: env
                .get_string("logging.format")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.format),
            show_target: env.get_bool_or("logging.show-target", defaults.show_target),
            show_thread_ids: env.get_bool_or("logging.show-thread-ids", defaults.show_thread_ids),
            filter: env.get_string("logging.filter"),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.as_str());
        match &self.filter {
            Some(filter) => EnvFilter::try_new(filter).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }

    /// 安装全局订阅者，重复调用会返回 `LoggingInitFailed`
    pub fn init(self) -> ApplicationResult<()> {
        let filter = self.env_filter();
        let builder = subscriber()
            .with_env_filter(filter)
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids);

        let result = match self.format {
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Full => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        };

        result.map_err(|e| ApplicationError::LoggingInitFailed(e.to_string()))?;
        tracing::debug!("Logging initialized: level={}, format={:?}", self.level, self.format);
        Ok(())
    }
}
