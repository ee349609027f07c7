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

//! Parsing of configuration for the distributed response cache.

use config::ConfigBuilder;
use config::builder::BuilderState;
use serde::Deserialize;
use serde::Serialize;

use super::AppConfigDefaults;

/// One cached path prefix and its time to live.
#[derive(Debug, Deserialize, Serialize)]
pub struct CachePolicyConfig {
    /// Path prefix matched case-insensitively against the request path.
    prefix: String,
    /// Time to live in seconds. Non-positive falls back to the default
    /// duration.
    ttlsecs: i64,
}

impl CachePolicyConfig {
    /// Path prefix matched case-insensitively against the request path.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Time to live in seconds.
    pub fn ttl_secs(&self) -> i64 {
        self.ttlsecs
    }
}

/// Configuration for the distributed response cache.
#[derive(Deserialize, Serialize)]
pub struct CacheConfig {
    /// Global switch. Disabled means every request passes through.
    enabled: bool,
    /// Redis connection string.
    connectionstring: String,
    /// Key namespace prepended to every cache key.
    instancename: String,
    /// Fallback time to live in seconds for policies without a positive one.
    defaultdurationsecs: String,
    /// Cached path prefixes. Paths without a matching prefix pass through.
    policies: Vec<CachePolicyConfig>,
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("enabled", &self.enabled)
            .field("connectionstring", &"*redacted*")
            .field("instancename", &self.instancename)
            .field("defaultdurationsecs", &self.defaultdurationsecs)
            .field("policies", &self.policies)
            .finish()
    }
}

impl AppConfigDefaults for CacheConfig {
    /// Provide defaults for this part of the configuration
    fn set_defaults<T: BuilderState>(
        config_builder: ConfigBuilder<T>,
        prefix: &str,
    ) -> ConfigBuilder<T> {
        config_builder
            .set_default(prefix.to_string() + "." + "enabled", false)
            .unwrap()
            .set_default(
                prefix.to_string() + "." + "connectionstring",
                "redis://127.0.0.1:6379",
            )
            .unwrap()
            .set_default(prefix.to_string() + "." + "instancename", "ordercast")
            .unwrap()
            .set_default(prefix.to_string() + "." + "defaultdurationsecs", "60")
            .unwrap()
            .set_default(
                prefix.to_string() + "." + "policies",
                Vec::<String>::new(),
            )
            .unwrap()
    }
}

impl CacheConfig {
    /// Global switch. Disabled means every request passes through.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Redis connection string.
    pub fn connection_string(&self) -> &str {
        &self.connectionstring
    }

    /// Key namespace prepended to every cache key.
    pub fn instance_name(&self) -> &str {
        &self.instancename
    }

    /// Fallback time to live in seconds.
    pub fn default_duration_secs(&self) -> u64 {
        self.defaultdurationsecs.parse::<u64>().unwrap_or(60)
    }

    /// Cached path prefixes with their time to live.
    pub fn policies(&self) -> &[CachePolicyConfig] {
        &self.policies
    }
}
