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

//! Parsing of configuration for the Consul service registry.

use config::ConfigBuilder;
use config::builder::BuilderState;
use serde::Deserialize;
use serde::Serialize;

use super::AppConfigDefaults;

/// Configuration for the Consul service registry.
#[derive(Debug, Deserialize, Serialize)]
pub struct ConsulConfig {
    /// Base address of the Consul HTTP API.
    address: String,
    /// Unique identifier of this process in the registry. Empty means derive
    /// one from the service name at registration time.
    serviceid: String,
    /// Logical service name shared by all instances.
    servicename: String,
    /// Address other services should use to reach this instance.
    serviceaddress: String,
    /// Port other services should use to reach this instance. `0` means use
    /// the API bind port.
    serviceport: u16,
    /// Path of the HTTP health check served by this instance.
    healthcheckendpoint: String,
    /// Comma separated instance tags. The tag `https` switches resolved URIs
    /// to the `https` scheme.
    tags: String,
    /// Health check interval in seconds.
    checkintervalsecs: String,
    /// Health check timeout in seconds.
    checktimeoutsecs: String,
    /// Window after which a critical instance is evicted, in seconds.
    deregisteraftersecs: String,
}

impl AppConfigDefaults for ConsulConfig {
    /// Provide defaults for this part of the configuration
    fn set_defaults<T: BuilderState>(
        config_builder: ConfigBuilder<T>,
        prefix: &str,
    ) -> ConfigBuilder<T> {
        config_builder
            .set_default(prefix.to_string() + "." + "address", "http://localhost:8500")
            .unwrap()
            .set_default(prefix.to_string() + "." + "serviceid", "")
            .unwrap()
            .set_default(prefix.to_string() + "." + "servicename", "ApiGateway")
            .unwrap()
            .set_default(prefix.to_string() + "." + "serviceaddress", "127.0.0.1")
            .unwrap()
            .set_default(prefix.to_string() + "." + "serviceport", "0")
            .unwrap()
            .set_default(prefix.to_string() + "." + "healthcheckendpoint", "/health")
            .unwrap()
            .set_default(prefix.to_string() + "." + "tags", "")
            .unwrap()
            .set_default(prefix.to_string() + "." + "checkintervalsecs", "10")
            .unwrap()
            .set_default(prefix.to_string() + "." + "checktimeoutsecs", "5")
            .unwrap()
            .set_default(prefix.to_string() + "." + "deregisteraftersecs", "60")
            .unwrap()
    }
}

impl ConsulConfig {
    /// Base address of the Consul HTTP API without trailing slash.
    pub fn address(&self) -> &str {
        self.address.trim_end_matches('/')
    }

    /// Unique identifier of this process in the registry, if configured.
    pub fn service_id(&self) -> Option<&str> {
        (!self.serviceid.is_empty()).then_some(self.serviceid.as_str())
    }

    /// Logical service name shared by all instances.
    pub fn service_name(&self) -> &str {
        &self.servicename
    }

    /// Address other services should use to reach this instance.
    pub fn service_address(&self) -> &str {
        &self.serviceaddress
    }

    /// Port other services should use to reach this instance.
    pub fn service_port(&self) -> Option<u16> {
        (self.serviceport > 0).then_some(self.serviceport)
    }

    /// Path of the HTTP health check served by this instance.
    pub fn health_check_endpoint(&self) -> &str {
        &self.healthcheckendpoint
    }

    /// Instance tags.
    pub fn tags(&self) -> Vec<String> {
        let mut ret = Vec::new();
        if !self.tags.is_empty() {
            ret = self
                .tags
                .split(',')
                .map(|tag| tag.trim().to_string())
                .collect();
        }
        ret
    }

    /// Health check interval in seconds.
    pub fn check_interval_secs(&self) -> u64 {
        self.checkintervalsecs.parse::<u64>().unwrap_or(10)
    }

    /// Health check timeout in seconds.
    pub fn check_timeout_secs(&self) -> u64 {
        self.checktimeoutsecs.parse::<u64>().unwrap_or(5)
    }

    /// Window after which a critical instance is evicted, in seconds.
    pub fn deregister_after_secs(&self) -> u64 {
        self.deregisteraftersecs.parse::<u64>().unwrap_or(60)
    }
}
