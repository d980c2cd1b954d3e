//! 路由注册表
//!
//! 路由按 `/` 分段编译成一棵前缀树，每个节点有：
//! - `segments`：字面量子节点
//! - `parameter`：至多一个命名参数子节点
//! - `actions`：HTTP 方法 -> 动作表下标
//!
//! 匹配时字面量优先于参数，且不回溯。编译结果（树 + 动作表）以 JSON
//! 写入缓存，后续启动直接读取。

use std::collections::{BTreeMap, HashMap};

use dogcafe_core::Cache;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::{ACTIONS_CACHE_KEY, ROUTES_CACHE_KEY};
use crate::controller::ControllerRoutes;
use crate::error::{RouteError, RouteResult};
use crate::request::HttpMethod;

/// `:` 加合法标识符
static PARAMETER_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^:[A-Za-z_][A-Za-z0-9_]*$").expect("parameter pattern is valid"));

/// 字母数字和 `. _ ~ -`
static LITERAL_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._~-]+$").expect("literal pattern is valid"));

/// 路由树节点
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteNode {
    #[serde(rename = "seg", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub segments: BTreeMap<String, RouteNode>,

    #[serde(rename = "par", default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<Box<ParameterNode>>,

    #[serde(rename = "act", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub actions: BTreeMap<HttpMethod, usize>,
}

impl RouteNode {
    fn action_indices(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        let own = self.actions.values().copied();
        let literals = self.segments.values().flat_map(RouteNode::action_indices);
        let parameter = self
            .parameter
            .iter()
            .flat_map(|parameter| parameter.node.action_indices());
        Box::new(own.chain(literals).chain(parameter))
    }
}

/// 命名参数子节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterNode {
    pub name: String,
    pub node: RouteNode,
}

/// 动作表中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerAction {
    pub class: String,
    pub method: String,
}

/// 匹配结果：控制器、方法和路径参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actionable {
    pub class: String,
    pub method: String,
    pub params: HashMap<String, String>,
}

/// 编译好的路由表，`start` 之后不再修改
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteRegistry {
    routes: RouteNode,
    actions: Vec<ControllerAction>,
}

impl RouteRegistry {
    /// 优先从缓存加载，缓存缺失或损坏时重新编译并写回缓存
    ///
    /// 缓存读写失败只记录警告；路由本身有错误时返回错误，启动应当终止
    pub fn start(cache: &dyn Cache, controllers: &[ControllerRoutes]) -> RouteResult<Self> {
        if let Some(registry) = Self::from_cache(cache) {
            tracing::info!("Route table loaded from cache ({} actions)", registry.len());
            return Ok(registry);
        }

        let registry = Self::compile(controllers)?;
        registry.store(cache);
        tracing::info!(
            "Route table compiled from {} controllers ({} actions)",
            controllers.len(),
            registry.len()
        );
        Ok(registry)
    }

    /// 只编译，不访问缓存
    ///
    /// 至少声明了一条路由的方法才会进入动作表，下标按声明顺序分配
    pub fn compile(controllers: &[ControllerRoutes]) -> RouteResult<Self> {
        let mut registry = Self::default();

        for controller in controllers {
            for action in controller.actions.iter().filter(|a| !a.routes.is_empty()) {
                registry.actions.push(ControllerAction {
                    class: controller.class.clone(),
                    method: action.method_name.clone(),
                });
                let index = registry.actions.len() - 1;

                for route in &action.routes {
                    registry.register_route(&route.path, route.method, index)?;
                }
            }
        }

        Ok(registry)
    }

    /// 把一条路由挂到树上
    pub fn register_route(&mut self, path: &str, method: HttpMethod, index: usize) -> RouteResult<()> {
        let segments = template_segments(path)?;
        let conflict = || RouteError::Conflict {
            path: path.to_string(),
            method,
        };

        let mut node = &mut self.routes;
        for segment in &segments {
            node = match segment.strip_prefix(':') {
                Some(name) => {
                    let parameter = node.parameter.get_or_insert_with(|| {
                        Box::new(ParameterNode {
                            name: name.to_string(),
                            node: RouteNode::default(),
                        })
                    });
                    if parameter.name != name {
                        return Err(conflict());
                    }
                    &mut parameter.node
                }
                None => node.segments.entry(segment.to_string()).or_default(),
            };
        }

        if node.actions.contains_key(&method) {
            return Err(conflict());
        }
        node.actions.insert(method, index);

        tracing::debug!("Registered route {} {} -> action #{}", method, path, index);
        Ok(())
    }

    /// 匹配请求目标，查询串会被忽略
    pub fn resolve(&self, target: &str, method: HttpMethod) -> RouteResult<Actionable> {
        let path = target.split('?').next().unwrap_or_default();
        let mut parts = path.split('/');
        if parts.next() != Some("") {
            return Err(RouteError::NotFound);
        }

        let segments: Vec<&str> = parts.collect();
        if segments.is_empty() {
            return Err(RouteError::NotFound);
        }

        let mut params = HashMap::new();
        let index = match_segments(&self.routes, &segments, method, &mut params)
            .ok_or(RouteError::NotFound)?;
        let action = self.actions.get(index).ok_or(RouteError::NotFound)?;

        Ok(Actionable {
            class: action.class.clone(),
            method: action.method.clone(),
            params,
        })
    }

    pub fn actions(&self) -> &[ControllerAction] {
        &self.actions
    }

    pub fn routes(&self) -> &RouteNode {
        &self.routes
    }

    /// 动作数量
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn from_cache(cache: &dyn Cache) -> Option<Self> {
        let routes = read_cached(cache, ROUTES_CACHE_KEY)?;
        let actions = read_cached(cache, ACTIONS_CACHE_KEY)?;

        let registry = match (
            serde_json::from_str::<RouteNode>(&routes),
            serde_json::from_str::<Vec<ControllerAction>>(&actions),
        ) {
            (Ok(routes), Ok(actions)) => Self { routes, actions },
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Cached route table is malformed, recompiling: {}", e);
                return None;
            }
        };

        let actions = registry.actions.len();
        if let Some(index) = registry.routes.action_indices().find(|i| *i >= actions) {
            tracing::warn!(
                "Cached route table references action #{} but only {} actions exist, recompiling",
                index,
                actions
            );
            return None;
        }

        Some(registry)
    }

    fn store(&self, cache: &dyn Cache) {
        let encoded = serde_json::to_string(&self.routes)
            .and_then(|routes| Ok((routes, serde_json::to_string(&self.actions)?)));

        let (routes, actions) = match encoded {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!("Failed to encode route table: {}", e);
                return;
            }
        };

        for (key, value) in [(ROUTES_CACHE_KEY, routes), (ACTIONS_CACHE_KEY, actions)] {
            if let Err(e) = cache.set(key, &value, None) {
                tracing::warn!("Failed to cache '{}': {}", key, e);
            }
        }
    }
}

fn read_cached(cache: &dyn Cache, key: &str) -> Option<String> {
    match cache.get(key) {
        Ok(value) => {
            if value.is_none() {
                tracing::debug!("Cache miss for '{}'", key);
            }
            value
        }
        Err(e) => {
            tracing::warn!("Failed to read '{}' from cache: {}", key, e);
            None
        }
    }
}

/// 校验路由模板并拆分成段
///
/// 必须以 `/` 开头，不能有空段；唯一的例外是根路由 `/`（一个空段）
fn template_segments(path: &str) -> RouteResult<Vec<&str>> {
    let invalid = || RouteError::NotValid(path.to_string());

    let mut parts = path.split('/');
    if parts.next() != Some("") {
        return Err(invalid());
    }

    let segments: Vec<&str> = parts.collect();
    if segments.is_empty() {
        return Err(invalid());
    }

    let is_root = segments == [""];
    let valid = |segment: &&str| PARAMETER_SEGMENT.is_match(segment) || LITERAL_SEGMENT.is_match(segment);
    if !is_root && !segments.iter().all(valid) {
        return Err(invalid());
    }

    Ok(segments)
}

fn match_segments(
    node: &RouteNode,
    segments: &[&str],
    method: HttpMethod,
    params: &mut HashMap<String, String>,
) -> Option<usize> {
    let (segment, rest) = segments.split_first()?;

    if let Some(child) = node.segments.get(*segment) {
        if !rest.is_empty() {
            return match_segments(child, rest, method, params);
        }
        if let Some(index) = child.actions.get(&method) {
            return Some(*index);
        }

        // 字面量终点没有该方法的动作时，视为其后的参数留空
        let parameter = child.parameter.as_ref()?;
        let index = parameter.node.actions.get(&method)?;
        params.insert(parameter.name.clone(), String::new());
        return Some(*index);
    }

    let parameter = node.parameter.as_ref()?;
    params.insert(parameter.name.clone(), segment.to_string());

    if rest.is_empty() {
        parameter.node.actions.get(&method).copied()
    } else {
        match_segments(&parameter.node, rest, method, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ActionRoutes, Route};
    use dogcafe_core::MemoryCache;

    fn controller(class: &str, actions: Vec<(&str, Vec<Route>)>) -> ControllerRoutes {
        ControllerRoutes::new(
            class,
            actions
                .into_iter()
                .map(|(name, routes)| ActionRoutes::new(name, routes))
                .collect(),
        )
    }

    fn venue_controllers() -> Vec<ControllerRoutes> {
        vec![
            controller(
                "BasicController",
                vec![
                    ("home", vec![Route::get("/")]),
                    ("about", vec![Route::get("/about"), Route::get("/about-us")]),
                    ("helper", vec![]),
                ],
            ),
            controller(
                "VenueController",
                vec![
                    ("venueFull", vec![Route::get("/venue/:venueReference")]),
                    ("venueMinimal", vec![Route::get("/api/v1/venue-short")]),
                    ("favourite", vec![Route::post("/api/v1/venue/:extId/favourite")]),
                ],
            ),
            controller(
                "TownController",
                vec![
                    ("town", vec![Route::get("/towns/:town")]),
                    ("townList", vec![Route::get("/towns/:town/list/:page")]),
                ],
            ),
        ]
    }

    fn resolved(registry: &RouteRegistry, target: &str, method: HttpMethod) -> (String, String, HashMap<String, String>) {
        let actionable = registry.resolve(target, method).unwrap();
        (actionable.class, actionable.method, actionable.params)
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_action_table_order() {
        let registry = RouteRegistry::compile(&venue_controllers()).unwrap();
        let methods: Vec<&str> = registry.actions().iter().map(|a| a.method.as_str()).collect();

        // 没有路由的方法不进入动作表
        assert_eq!(
            methods,
            ["home", "about", "venueFull", "venueMinimal", "favourite", "town", "townList"]
        );
        assert_eq!(registry.len(), 7);
    }

    #[test]
    fn test_parameter_extraction() {
        let registry = RouteRegistry::compile(&venue_controllers()).unwrap();

        assert_eq!(
            resolved(&registry, "/venue/abc123", HttpMethod::Get),
            (
                "VenueController".to_string(),
                "venueFull".to_string(),
                params(&[("venueReference", "abc123")])
            )
        );
        assert_eq!(
            resolved(&registry, "/towns/leeds/list/2", HttpMethod::Get).2,
            params(&[("town", "leeds"), ("page", "2")])
        );
        assert_eq!(
            resolved(&registry, "/api/v1/venue/V1/favourite", HttpMethod::Post).1,
            "favourite"
        );
    }

    #[test]
    fn test_root_and_multiple_routes_per_action() {
        let registry = RouteRegistry::compile(&venue_controllers()).unwrap();

        assert_eq!(resolved(&registry, "/", HttpMethod::Get).1, "home");
        assert_eq!(resolved(&registry, "/about", HttpMethod::Get).1, "about");
        assert_eq!(resolved(&registry, "/about-us", HttpMethod::Get).1, "about");
    }

    #[test]
    fn test_literal_precedence() {
        let registry = RouteRegistry::compile(&[controller(
            "Foo",
            vec![
                ("param", vec![Route::get("/:param")]),
                ("literal", vec![Route::get("/abc")]),
            ],
        )])
        .unwrap();

        assert_eq!(resolved(&registry, "/abc", HttpMethod::Get).1, "literal");
        assert_eq!(
            resolved(&registry, "/xyz", HttpMethod::Get),
            ("Foo".to_string(), "param".to_string(), params(&[("param", "xyz")]))
        );
    }

    #[test]
    fn test_no_backtracking_into_parameter() {
        let registry = RouteRegistry::compile(&[controller(
            "Foo",
            vec![
                ("literal", vec![Route::get("/abc/def")]),
                ("param", vec![Route::get("/:first/ghi")]),
            ],
        )])
        .unwrap();

        assert_eq!(
            registry.resolve("/abc/ghi", HttpMethod::Get),
            Err(RouteError::NotFound)
        );
        assert_eq!(resolved(&registry, "/xyz/ghi", HttpMethod::Get).1, "param");
    }

    #[test]
    fn test_blank_parameter_fallback() {
        let registry = RouteRegistry::compile(&[controller(
            "ListController",
            vec![("list", vec![Route::get("/list/:page")])],
        )])
        .unwrap();

        assert_eq!(
            resolved(&registry, "/list", HttpMethod::Get),
            (
                "ListController".to_string(),
                "list".to_string(),
                params(&[("page", "")])
            )
        );
        assert_eq!(
            resolved(&registry, "/list/", HttpMethod::Get).2,
            params(&[("page", "")])
        );
        assert!(registry.resolve("/list", HttpMethod::Post).is_err());
    }

    #[test]
    fn test_conflicts() {
        let twice = RouteRegistry::compile(&[
            controller("Foo", vec![("a", vec![Route::get("/abc")])]),
            controller("Bar", vec![("b", vec![Route::get("/abc")])]),
        ]);
        assert_eq!(
            twice,
            Err(RouteError::Conflict {
                path: "/abc".to_string(),
                method: HttpMethod::Get
            })
        );

        let renamed = RouteRegistry::compile(&[controller(
            "Foo",
            vec![
                ("a", vec![Route::get("/venue/:id/photos")]),
                ("b", vec![Route::get("/venue/:reference")]),
            ],
        )]);
        assert!(matches!(renamed, Err(RouteError::Conflict { .. })));

        let same_parameter_twice = RouteRegistry::compile(&[controller(
            "Foo",
            vec![
                ("a", vec![Route::get("/venue/:id")]),
                ("b", vec![Route::get("/venue/:id")]),
            ],
        )]);
        assert!(matches!(same_parameter_twice, Err(RouteError::Conflict { .. })));
    }

    #[test]
    fn test_same_path_different_methods() {
        let registry = RouteRegistry::compile(&[controller(
            "Foo",
            vec![
                ("show", vec![Route::get("/venue/:id")]),
                ("update", vec![Route::put("/venue/:id"), Route::patch("/venue/:id")]),
                ("remove", vec![Route::delete("/venue/:id")]),
            ],
        )])
        .unwrap();

        assert_eq!(resolved(&registry, "/venue/1", HttpMethod::Get).1, "show");
        assert_eq!(resolved(&registry, "/venue/1", HttpMethod::Patch).1, "update");
        assert_eq!(resolved(&registry, "/venue/1", HttpMethod::Delete).1, "remove");
        assert!(registry.resolve("/venue/1", HttpMethod::Post).is_err());
    }

    #[test]
    fn test_invalid_templates() {
        for path in ["abc", "/abc//def", "/abc/", "", "/:", "/:1abc", "/caf\u{e9}", "/a b"] {
            let mut registry = RouteRegistry::default();
            assert_eq!(
                registry.register_route(path, HttpMethod::Get, 0),
                Err(RouteError::NotValid(path.to_string())),
                "{} should be rejected",
                path
            );
        }
    }

    #[test]
    fn test_resolve_misses() {
        let registry = RouteRegistry::compile(&venue_controllers()).unwrap();

        for target in ["venue/abc", "", "/missing", "/venue/abc/extra", "/api/v1"] {
            assert_eq!(
                registry.resolve(target, HttpMethod::Get),
                Err(RouteError::NotFound),
                "{} should not match",
                target
            );
        }
        assert_eq!(
            registry.resolve("/venue/abc", HttpMethod::Post),
            Err(RouteError::NotFound)
        );
    }

    #[test]
    fn test_query_string_is_ignored() {
        let registry = RouteRegistry::compile(&venue_controllers()).unwrap();

        assert_eq!(
            resolved(&registry, "/api/v1/venue-short?ext_id=V1&x=y", HttpMethod::Get).1,
            "venueMinimal"
        );
        assert_eq!(
            resolved(&registry, "/venue/bark-bar?ref=map", HttpMethod::Get).2,
            params(&[("venueReference", "bark-bar")])
        );
    }

    #[test]
    fn test_cache_round_trip() {
        let cache = MemoryCache::new();
        let controllers = venue_controllers();

        let compiled = RouteRegistry::start(&cache, &controllers).unwrap();
        assert!(cache.has(ROUTES_CACHE_KEY).unwrap());
        assert!(cache.has(ACTIONS_CACHE_KEY).unwrap());

        // 缓存命中时不需要控制器列表
        let loaded = RouteRegistry::start(&cache, &[]).unwrap();
        assert_eq!(loaded, compiled);

        for (target, method) in [
            ("/", HttpMethod::Get),
            ("/venue/abc123", HttpMethod::Get),
            ("/towns/york/list/3", HttpMethod::Get),
            ("/api/v1/venue/V9/favourite", HttpMethod::Post),
            ("/missing", HttpMethod::Get),
        ] {
            assert_eq!(
                loaded.resolve(target, method),
                compiled.resolve(target, method)
            );
        }
    }

    #[test]
    fn test_corrupted_cache_is_recompiled() {
        let cache = MemoryCache::new();
        cache.set(ROUTES_CACHE_KEY, "not json", None).unwrap();
        cache.set(ACTIONS_CACHE_KEY, "[]", None).unwrap();

        let registry = RouteRegistry::start(&cache, &venue_controllers()).unwrap();
        assert_eq!(registry.len(), 7);

        let cached: RouteNode =
            serde_json::from_str(&cache.get(ROUTES_CACHE_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(&cached, registry.routes());
    }

    #[test]
    fn test_dangling_index_is_recompiled() {
        let cache = MemoryCache::new();
        cache
            .set(ROUTES_CACHE_KEY, r#"{"seg":{"abc":{"act":{"get":3}}}}"#, None)
            .unwrap();
        cache
            .set(ACTIONS_CACHE_KEY, r#"[{"class":"Foo","method":"bar"}]"#, None)
            .unwrap();

        let registry = RouteRegistry::start(&cache, &venue_controllers()).unwrap();
        assert_eq!(registry.len(), 7);
        assert!(registry.resolve("/abc", HttpMethod::Get).is_err());
    }

    #[test]
    fn test_partial_cache_is_recompiled() {
        let cache = MemoryCache::new();
        cache.set(ACTIONS_CACHE_KEY, "[]", None).unwrap();

        let registry = RouteRegistry::start(&cache, &venue_controllers()).unwrap();
        assert_eq!(registry.len(), 7);
    }

    #[test]
    fn test_serialized_shape() {
        let registry = RouteRegistry::compile(&[controller(
            "Foo",
            vec![("bar", vec![Route::get("/items/:id")])],
        )])
        .unwrap();

        let json = serde_json::to_value(registry.routes()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "seg": { "items": { "par": { "name": "id", "node": { "act": { "get": 0 } } } } }
            })
        );
    }
}
