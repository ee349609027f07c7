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

//! Parsing of configuration for dynamic upstream routing.

use config::ConfigBuilder;
use config::builder::BuilderState;
use serde::Deserialize;
use serde::Serialize;

use super::AppConfigDefaults;

/// One statically declared route: a path prefix forwarded to a cluster whose
/// destinations are resolved from the service registry.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Path prefix this cluster serves, e.g. `/orders`.
    prefix: String,
    /// Cluster identifier used in logs and destination keys.
    cluster: String,
    /// Logical registry service name the destinations are resolved from.
    /// Empty leaves the cluster untouched by the resolver.
    servicename: String,
}

impl ClusterConfig {
    /// Return a new instance.
    pub fn new(prefix: &str, cluster: &str, servicename: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            cluster: cluster.to_string(),
            servicename: servicename.to_string(),
        }
    }

    /// Path prefix this cluster serves.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Cluster identifier.
    pub fn cluster_id(&self) -> &str {
        &self.cluster
    }

    /// Logical registry service name, if the cluster is registry-driven.
    pub fn registry_service_name(&self) -> Option<&str> {
        (!self.servicename.is_empty()).then_some(self.servicename.as_str())
    }
}

/// Configuration for dynamic upstream routing.
#[derive(Debug, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Destination refresh cadence in seconds.
    refreshintervalsecs: String,
    /// Refresh cadence in seconds after a registry error.
    errorbackoffsecs: String,
    /// Statically declared clusters. Empty uses the built-in route table.
    clusters: Vec<ClusterConfig>,
}

impl AppConfigDefaults for RoutingConfig {
    /// Provide defaults for this part of the configuration
    fn set_defaults<T: BuilderState>(
        config_builder: ConfigBuilder<T>,
        prefix: &str,
    ) -> ConfigBuilder<T> {
        config_builder
            .set_default(prefix.to_string() + "." + "refreshintervalsecs", "5")
            .unwrap()
            .set_default(prefix.to_string() + "." + "errorbackoffsecs", "15")
            .unwrap()
            .set_default(prefix.to_string() + "." + "clusters", Vec::<String>::new())
            .unwrap()
    }
}

impl RoutingConfig {
    /// Destination refresh cadence in seconds. Defaults to 5.
    pub fn refresh_interval_secs(&self) -> u64 {
        self.refreshintervalsecs.parse::<u64>().unwrap_or(5)
    }

    /// Refresh cadence in seconds after a registry error. Defaults to 15.
    pub fn error_backoff_secs(&self) -> u64 {
        self.errorbackoffsecs.parse::<u64>().unwrap_or(15)
    }

    /// Statically declared clusters, falling back to the built-in route table
    /// covering the four aggregated services.
    pub fn clusters(&self) -> Vec<ClusterConfig> {
        if !self.clusters.is_empty() {
            return self.clusters.clone();
        }
        vec![
            ClusterConfig::new("/orders", "order-cluster", "OrderService"),
            ClusterConfig::new("/products", "product-cluster", "ProductService"),
            ClusterConfig::new("/payments", "payment-cluster", "PaymentService"),
            ClusterConfig::new("/users", "user-cluster", "UserService"),
        ]
    }
}
