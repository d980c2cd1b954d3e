//! Web 层常量定义

// ==================== 缓存键 ====================

/// 编译后的路由树
pub const ROUTES_CACHE_KEY: &str = "routerRoutes";

/// 动作表
pub const ACTIONS_CACHE_KEY: &str = "routerActions";

// ==================== Server 配置 ====================

/// 服务器监听地址
pub const SERVER_HOST: &str = "server.host";

/// 服务器监听端口
pub const SERVER_PORT: &str = "server.port";

// ==================== 默认值 ====================

/// 未登录时 HTML 客户端跳转的地址
pub const LOGIN_PATH: &str = "/login";
