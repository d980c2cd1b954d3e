//! 核心组件常量定义
//!
//! 容器和 Web 层使用同一组标识符，避免在不同地方硬编码

use std::any::type_name;

use crate::container::{Container, ServiceLocator};

/// 检查给定的类型标识符是否指向容器自身
///
/// 容器自身类型和它的公开接口都会被注入为当前容器句柄
pub fn is_container_type_name(id: &str) -> bool {
    id == type_name::<Container>() || id == type_name::<dyn ServiceLocator>()
}
