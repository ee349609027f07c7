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

//! Registry-driven dynamic routing of proxied requests.

use crossbeam_skiplist::SkipMap;
use ordercast_core::conf::ClusterConfig;
use ordercast_core::conf::RoutingConfig;
use ordercast_core::registry::ConsulClient;
use ordercast_core::registry::ServiceInstance;
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

/// One concrete upstream instance address within a cluster.
#[derive(Clone)]
pub struct Destination {
    key: String,
    base_uri: String,
    in_flight: Arc<AtomicUsize>,
}

impl Destination {
    fn new(service_name: &str, ordinal: usize, instance: &ServiceInstance) -> Self {
        Self {
            key: format!("{service_name}-{ordinal}"),
            base_uri: instance.base_uri(),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Unique destination key in `{serviceName}-{1..N}` form.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Base URI of the instance, with trailing slash.
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Mark a request in flight on this destination for the duration of the
    /// returned guard.
    pub fn begin_request(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard(Arc::clone(&self.in_flight))
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }
}

/// Decrements the destination's in-flight counter when the proxied response
/// completed.
pub struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/** Statically declared routes with registry-resolved destinations.

Each cluster that names a registry service gets its destination list
re-resolved on a fixed cadence by a background refresher; a registry error
empties the affected clusters and stretches the cadence until the registry
answers again. Clusters with zero destinations stay empty and proxying to
them answers HTTP 503, which is the correct observable failure.

Destination selection uses power-of-two-choices over the in-flight counter.
*/
pub struct DynamicRouter {
    clusters: Vec<ClusterConfig>,
    destinations_by_cluster: SkipMap<String, Arc<Vec<Destination>>>,
    consul: Arc<ConsulClient>,
    refresh_interval_secs: u64,
    error_backoff_secs: u64,
}

impl DynamicRouter {
    /// Return a new instance with the background refresher running.
    pub fn new(routing_config: &RoutingConfig, consul: &Arc<ConsulClient>) -> Arc<Self> {
        Arc::new(Self {
            clusters: routing_config.clusters(),
            destinations_by_cluster: SkipMap::default(),
            consul: Arc::clone(consul),
            refresh_interval_secs: routing_config.refresh_interval_secs(),
            error_backoff_secs: routing_config.error_backoff_secs(),
        })
        .init()
    }

    fn init(self: Arc<Self>) -> Arc<Self> {
        let self_clone = Arc::clone(&self);
        tokio::spawn(async move { self_clone.refresh_loop().await });
        self
    }

    async fn refresh_loop(&self) {
        loop {
            let healthy_registry = self.refresh_once().await;
            let sleep_secs = if healthy_registry {
                self.refresh_interval_secs
            } else {
                self.error_backoff_secs
            };
            tokio::time::sleep(tokio::time::Duration::from_secs(sleep_secs)).await;
        }
    }

    /// Re-resolve every registry-driven cluster once. Returns `false` when
    /// the registry failed for any cluster.
    async fn refresh_once(&self) -> bool {
        let mut healthy_registry = true;
        for cluster in &self.clusters {
            let Some(service_name) = cluster.registry_service_name() else {
                // Cluster without registry metadata is left untouched.
                continue;
            };
            match self.consul.resolve_all(service_name).await {
                Ok(instances) => {
                    let destinations = instances
                        .iter()
                        .enumerate()
                        .map(|(index, instance)| {
                            Destination::new(service_name, index + 1, instance)
                        })
                        .collect::<Vec<_>>();
                    if log::log_enabled!(log::Level::Trace) {
                        log::trace!(
                            "Cluster '{}' now has {} destination(s).",
                            cluster.cluster_id(),
                            destinations.len()
                        );
                    }
                    self.destinations_by_cluster
                        .insert(cluster.cluster_id().to_string(), Arc::new(destinations));
                }
                Err(e) => {
                    // Transient registry errors mean "none available this
                    // call": the cluster degrades to empty and the proxy
                    // answers 503 until the registry answers again.
                    log::debug!(
                        "Clearing destinations of cluster '{}': {e}",
                        cluster.cluster_id()
                    );
                    self.destinations_by_cluster
                        .insert(cluster.cluster_id().to_string(), Arc::new(Vec::new()));
                    healthy_registry = false;
                }
            }
        }
        healthy_registry
    }

    /// The cluster serving a request path, longest prefix first.
    pub fn cluster_for_path(&self, path: &str) -> Option<&ClusterConfig> {
        self.clusters
            .iter()
            .filter(|cluster| path.starts_with(cluster.prefix()))
            .max_by_key(|cluster| cluster.prefix().len())
    }

    /// Pick a destination with power-of-two-choices over in-flight counts.
    pub fn pick_destination(&self, cluster_id: &str) -> Option<Destination> {
        let destinations = self
            .destinations_by_cluster
            .get(cluster_id)
            .map(|entry| Arc::clone(entry.value()))?;
        match destinations.len() {
            0 => None,
            1 => Some(destinations[0].clone()),
            len => {
                let mut rng = rand::thread_rng();
                let first = rng.gen_range(0..len);
                let second = (first + rng.gen_range(1..len)) % len;
                if destinations[first].in_flight() <= destinations[second].in_flight() {
                    Some(destinations[first].clone())
                } else {
                    Some(destinations[second].clone())
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ordercast_core::conf::AppConfig;

    fn router() -> DynamicRouter {
        let app_config = AppConfig::default();
        // Built without init() so no background refresher runs in tests.
        DynamicRouter {
            clusters: app_config.routing.clusters(),
            destinations_by_cluster: SkipMap::default(),
            consul: ConsulClient::new(&Arc::new(app_config)),
            refresh_interval_secs: 5,
            error_backoff_secs: 15,
        }
    }

    fn destination(service_name: &str, ordinal: usize, port: u16) -> Destination {
        Destination {
            key: format!("{service_name}-{ordinal}"),
            base_uri: format!("http://10.0.0.{ordinal}:{port}/"),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[test]
    fn cluster_selection_uses_longest_prefix() {
        let router = router();
        assert_eq!(
            router.cluster_for_path("/orders/42").unwrap().cluster_id(),
            "order-cluster"
        );
        assert_eq!(
            router
                .cluster_for_path("/products/list")
                .unwrap()
                .cluster_id(),
            "product-cluster"
        );
        assert!(router.cluster_for_path("/unknown").is_none());
    }

    #[test]
    fn destination_keys_are_ordinal_per_service() {
        let destinations = vec![
            destination("OrderService", 1, 5001),
            destination("OrderService", 2, 5001),
            destination("OrderService", 3, 5001),
        ];
        let keys = destinations
            .iter()
            .map(Destination::key)
            .collect::<Vec<_>>();
        assert_eq!(keys, ["OrderService-1", "OrderService-2", "OrderService-3"]);
    }

    #[test]
    fn empty_cluster_yields_no_destination() {
        let router = router();
        router
            .destinations_by_cluster
            .insert("order-cluster".to_string(), Arc::new(Vec::new()));
        assert!(router.pick_destination("order-cluster").is_none());
        assert!(router.pick_destination("never-resolved").is_none());
    }

    #[test]
    fn power_of_two_choices_prefers_less_loaded() {
        let router = router();
        let busy = destination("OrderService", 1, 5001);
        let _load = (0..10).map(|_| busy.begin_request()).collect::<Vec<_>>();
        router.destinations_by_cluster.insert(
            "order-cluster".to_string(),
            Arc::new(vec![busy, destination("OrderService", 2, 5001)]),
        );
        for _ in 0..20 {
            let picked = router.pick_destination("order-cluster").unwrap();
            assert_eq!(picked.key(), "OrderService-2");
        }
    }
}
