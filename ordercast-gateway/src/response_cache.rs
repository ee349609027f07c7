/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/

//! Distributed cache of GET responses with deterministic keys.

use ordercast_core::conf::CacheConfig;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;

/** Build the canonical cache key of a request.

`METHOD ':' lowercased-path`, optionally followed by `?` and the query
parameters sorted by lowercased key. Parameter keys and values stay in their
URL-encoded form as received. Two query strings that differ only in
parameter order therefore produce the same key.
*/
pub fn build_cache_key(method: &str, path: &str, query: &str) -> String {
    let mut key = format!("{method}:{}", path.to_lowercase());
    if !query.is_empty() {
        let mut pairs = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((parameter_key, parameter_value)) => {
                    (parameter_key.to_lowercase(), parameter_value.to_string())
                }
                None => (pair.to_lowercase(), String::new()),
            })
            .collect::<Vec<_>>();
        pairs.sort();
        key.push('?');
        key.push_str(
            &pairs
                .into_iter()
                .map(|(parameter_key, parameter_value)| {
                    format!("{parameter_key}={parameter_value}")
                })
                .collect::<Vec<_>>()
                .join("&"),
        );
    }
    key
}

/// Per-prefix cache policies with the global default fallback.
pub struct CachePolicyTable {
    /// `(lowercased prefix, ttl)` pairs, longest prefix wins.
    policies: Vec<(String, Duration)>,
}

impl CachePolicyTable {
    /// Return a new instance from the cache configuration.
    pub fn new(cache_config: &CacheConfig) -> Self {
        let default_ttl = Duration::from_secs(cache_config.default_duration_secs());
        let mut policies = cache_config
            .policies()
            .iter()
            .map(|policy| {
                let ttl = u64::try_from(policy.ttl_secs())
                    .ok()
                    .filter(|ttl_secs| *ttl_secs > 0)
                    .map(Duration::from_secs)
                    // Non-positive policy values fall back to the default.
                    .unwrap_or(default_ttl);
                (policy.prefix().to_lowercase(), ttl)
            })
            .collect::<Vec<_>>();
        // Longest prefix first so the most specific policy wins.
        policies.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { policies }
    }

    /// Time to live for a request path, or `None` when the path is not
    /// cacheable at all.
    pub fn ttl_for_path(&self, path: &str) -> Option<Duration> {
        let path = path.to_lowercase();
        self.policies
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix))
            .map(|(_, ttl)| *ttl)
    }
}

/** GET response cache backed by Redis.

Never on the failure path of a request: a miss, a read error or a write
error all degrade into calling downstream. When Redis is unreachable at
startup the cache starts disabled and the gateway serves uncached.
*/
pub struct ResponseCache {
    enabled: bool,
    instance_name: String,
    policy_table: CachePolicyTable,
    connection: Option<ConnectionManager>,
}

impl ResponseCache {
    /// Return a new instance. Connects to Redis when caching is enabled.
    pub async fn new(cache_config: &CacheConfig) -> Arc<Self> {
        let policy_table = CachePolicyTable::new(cache_config);
        let connection = if cache_config.enabled() {
            match Self::connect(cache_config.connection_string()).await {
                Ok(connection) => Some(connection),
                Err(e) => {
                    log::warn!("Response cache is disabled. Redis is unreachable: {e}");
                    None
                }
            }
        } else {
            None
        };
        Arc::new(Self {
            enabled: cache_config.enabled() && connection.is_some(),
            instance_name: cache_config.instance_name().to_string(),
            policy_table,
            connection,
        })
    }

    async fn connect(connection_string: &str) -> Result<ConnectionManager, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        client.get_connection_manager().await
    }

    /// `true` when the cache is on and reachable.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Policy lookup for a request path.
    pub fn ttl_for_path(&self, path: &str) -> Option<Duration> {
        self.policy_table.ttl_for_path(path)
    }

    /// Load a cached response body. Errors degrade into a miss.
    pub async fn get(&self, cache_key: &str) -> Option<String> {
        let mut connection = self.connection.clone()?;
        match connection
            .get::<_, Option<String>>(self.namespaced(cache_key))
            .await
        {
            Ok(cached_body) => cached_body,
            Err(e) => {
                log::debug!("Cache read for '{cache_key}' failed: {e}");
                None
            }
        }
    }

    /// Store a response body. Errors are logged and swallowed.
    pub async fn put(&self, cache_key: &str, body: &[u8], ttl: Duration) {
        let Some(mut connection) = self.connection.clone() else {
            return;
        };
        if let Err(e) = connection
            .set_ex::<_, _, ()>(self.namespaced(cache_key), body, ttl.as_secs())
            .await
        {
            log::debug!("Cache write for '{cache_key}' failed: {e}");
        }
    }

    fn namespaced(&self, cache_key: &str) -> String {
        format!("{}:{cache_key}", self.instance_name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn query_parameter_order_does_not_change_the_key() {
        let first = build_cache_key("GET", "/products/list", "pageNumber=1&pageSize=20");
        let second = build_cache_key("GET", "/products/list", "pageSize=20&pageNumber=1");
        assert_eq!(first, second);
        assert_eq!(first, "GET:/products/list?pagenumber=1&pagesize=20");
    }

    #[test]
    fn path_is_lowercased_and_query_is_optional() {
        assert_eq!(build_cache_key("GET", "/Products/List", ""), "GET:/products/list");
        assert_eq!(
            build_cache_key("GET", "/products", "q=Shoes"),
            "GET:/products?q=Shoes"
        );
    }

    #[test]
    fn valueless_parameters_keep_a_stable_shape() {
        assert_eq!(
            build_cache_key("GET", "/products", "b&A=1"),
            "GET:/products?a=1&b="
        );
    }

    fn policy_table(policies_json: serde_json::Value) -> CachePolicyTable {
        let cache_config: CacheConfig = serde_json::from_value(serde_json::json!({
            "enabled": true,
            "connectionstring": "redis://127.0.0.1:6379",
            "instancename": "test",
            "defaultdurationsecs": "60",
            "policies": policies_json,
        }))
        .unwrap();
        CachePolicyTable::new(&cache_config)
    }

    #[test]
    fn longest_matching_prefix_wins() {
        let table = policy_table(serde_json::json!([
            {"prefix": "/products", "ttlsecs": 120},
            {"prefix": "/products/list", "ttlsecs": 30},
        ]));
        assert_eq!(
            table.ttl_for_path("/products/list"),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            table.ttl_for_path("/products/42"),
            Some(Duration::from_secs(120))
        );
        assert_eq!(table.ttl_for_path("/orders"), None);
    }

    #[test]
    fn non_positive_ttl_falls_back_to_the_default_duration() {
        let table = policy_table(serde_json::json!([
            {"prefix": "/products", "ttlsecs": 0},
        ]));
        assert_eq!(
            table.ttl_for_path("/products"),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn prefix_match_is_case_insensitive() {
        let table = policy_table(serde_json::json!([
            {"prefix": "/Products", "ttlsecs": 120},
        ]));
        assert_eq!(
            table.ttl_for_path("/products/List"),
            Some(Duration::from_secs(120))
        );
    }
}
