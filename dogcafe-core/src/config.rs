//! 配置管理
//!
//! 配置按优先级从多个来源读取：环境变量 > 运行时覆盖 > TOML 文件。
//! 键统一使用点分格式，例如 `redis.host`。

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use parking_lot::RwLock;

use crate::error::ConfigError;

/// 配置值类型
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<ConfigValue>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 转换为字符串（标量都可以转换）
    pub fn to_string_value(&self) -> Option<String> {
        match self {
            ConfigValue::String(s) => Some(s.clone()),
            ConfigValue::Int(i) => Some(i.to_string()),
            ConfigValue::Float(f) => Some(f.to_string()),
            ConfigValue::Bool(b) => Some(b.to_string()),
            ConfigValue::Array(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

/// 配置源 trait
pub trait PropertySource: Send + Sync {
    /// 配置源名称（用于日志）
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<ConfigValue>;

    /// 数字越大优先级越高
    fn priority(&self) -> i32 {
        0
    }
}

/// Environment - 配置管理器
pub struct Environment {
    sources: RwLock<Vec<Box<dyn PropertySource>>>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources = self.sources.read();
        f.debug_struct("Environment")
            .field("sources", &sources.iter().map(|s| s.name().to_string()).collect::<Vec<_>>())
            .finish()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
        }
    }

    /// 添加配置源
    pub fn add_property_source(&self, source: Box<dyn PropertySource>) {
        let mut sources = self.sources.write();
        tracing::debug!("Adding property source '{}'", source.name());
        sources.push(source);
        sources.sort_by_key(|s| std::cmp::Reverse(s.priority()));
    }

    /// 获取配置值
    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        let sources = self.sources.read();
        sources.iter().find_map(|source| {
            source.get(key).inspect(|_| {
                tracing::trace!("Config '{}' found in source '{}'", key, source.name());
            })
        })
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.to_string_value())
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    /// 必需的字符串配置
    pub fn require_string(&self, key: &str) -> Result<String, ConfigError> {
        self.get_string(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_i64(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// 应用级配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppProperties {
    /// 运行环境，默认 `production`
    pub env: String,
}

impl AppProperties {
    pub fn from_environment(env: &Environment) -> Self {
        Self {
            env: env.get_string_or("app.env", "production"),
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}

// ========== Property Sources ==========

/// 环境变量配置源
///
/// `redis.host` 对应 `APP_REDIS_HOST`，`-` 同样映射为 `_`
pub struct EnvironmentPropertySource {
    prefix: String,
}

impl EnvironmentPropertySource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn key_to_env(&self, key: &str) -> String {
        format!(
            "{}{}",
            self.prefix,
            key.replace(['.', '-'], "_").to_uppercase()
        )
    }
}

impl PropertySource for EnvironmentPropertySource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        std::env::var(self.key_to_env(key))
            .ok()
            .map(ConfigValue::String)
    }

    fn priority(&self) -> i32 {
        100
    }
}

/// TOML 文件配置源
pub struct TomlPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
}

impl TomlPropertySource {
    /// 从文件加载
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Self::parse(&content, path.display().to_string())
    }

    /// 从字符串解析
    pub fn parse(content: &str, name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        let table: toml::Table = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: name.clone(),
            message: e.to_string(),
        })?;

        let mut properties = HashMap::new();
        for (key, value) in &table {
            flatten(value, key.clone(), &mut properties);
        }

        Ok(Self { name, properties })
    }
}

/// `{ redis = { host = "x" } }` -> `redis.host = "x"`
fn flatten(value: &toml::Value, prefix: String, out: &mut HashMap<String, ConfigValue>) {
    match value {
        toml::Value::Table(table) => {
            for (key, nested) in table {
                flatten(nested, format!("{}.{}", prefix, key), out);
            }
        }
        other => {
            out.insert(prefix, scalar(other));
        }
    }
}

fn scalar(value: &toml::Value) -> ConfigValue {
    match value {
        toml::Value::String(s) => ConfigValue::String(s.clone()),
        toml::Value::Integer(i) => ConfigValue::Int(*i),
        toml::Value::Float(f) => ConfigValue::Float(*f),
        toml::Value::Boolean(b) => ConfigValue::Bool(*b),
        toml::Value::Array(items) => ConfigValue::Array(items.iter().map(scalar).collect()),
        toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
        toml::Value::Table(_) => ConfigValue::String(value.to_string()),
    }
}

impl PropertySource for TomlPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }
}

/// 内存配置源（用于测试或运行时覆盖）
pub struct MapPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn priority(&self) -> i32 {
        50
    }
}
