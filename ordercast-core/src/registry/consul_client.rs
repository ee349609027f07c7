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

//! Interactions with Consul using its HTTP agent and health APIs.

use super::service_instance::HealthServiceEntry;
use super::service_instance::ServiceInstance;
use crate::CoreError;
use crate::CoreErrorKind;
use crate::conf::AppConfig;
use crate::conf::ConsulConfig;
use rand::Rng;
use reqwest::Client;
use reqwest::ClientBuilder;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Wire shape of a service registration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceRegistration {
    #[serde(rename = "ID")]
    id: String,
    name: String,
    address: String,
    port: u16,
    tags: Vec<String>,
    check: RegistrationCheck,
}

/// Wire shape of the HTTP health check of a registration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RegistrationCheck {
    #[serde(rename = "HTTP")]
    http: String,
    interval: String,
    timeout: String,
    deregister_critical_service_after: String,
}

/** Client for the Consul service registry.

The registry is treated as a best-effort cache of the world: resolution
failures and transient network errors mean "no instance available this
call", never a hard error for the calling request.
*/
pub struct ConsulClient {
    address: String,
    client: Client,
    /// Instance identifier registered by this process, until deregistered.
    registered_service_id: Mutex<Option<String>>,
}

impl ConsulClient {
    /// Package name reported by Cargo at build time.
    const CARGO_PKG_NAME: &str = env!("CARGO_PKG_NAME");
    /// Package version reported by Cargo at build time.
    const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Return a new instance talking to the configured Consul agent.
    pub fn new(app_config: &Arc<AppConfig>) -> Arc<Self> {
        let user_agent = format!("{}/{}", Self::CARGO_PKG_NAME, Self::CARGO_PKG_VERSION);
        let client = ClientBuilder::new()
            .user_agent(user_agent)
            .referer(false)
            .timeout(core::time::Duration::from_secs(5))
            .build()
            .unwrap();
        Arc::new(Self {
            address: app_config.consul.address().to_string(),
            client,
            registered_service_id: Mutex::new(None),
        })
    }

    /** Register this process in the registry.

    Any prior entry with the same service identifier is deregistered first to
    eliminate ghosts from unclean restarts. The health check points at the
    HTTP endpoint this process serves; instances failing it beyond the
    configured window are evicted by the registry itself.
    */
    pub async fn register_self(
        &self,
        consul_config: &ConsulConfig,
        api_bind_port: u16,
    ) -> Result<(), CoreError> {
        let service_id = consul_config
            .service_id()
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!(
                    "{}-{}",
                    consul_config.service_name(),
                    uuid::Uuid::new_v4().simple()
                )
            });
        self.deregister(&service_id).await;
        let service_port = consul_config.service_port().unwrap_or(api_bind_port);
        let scheme = if consul_config
            .tags()
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case("https"))
        {
            "https"
        } else {
            "http"
        };
        let registration = ServiceRegistration {
            id: service_id.to_owned(),
            name: consul_config.service_name().to_string(),
            address: consul_config.service_address().to_string(),
            port: service_port,
            tags: consul_config.tags(),
            check: RegistrationCheck {
                http: format!(
                    "{scheme}://{}:{service_port}{}",
                    consul_config.service_address(),
                    consul_config.health_check_endpoint()
                ),
                interval: format!("{}s", consul_config.check_interval_secs()),
                timeout: format!("{}s", consul_config.check_timeout_secs()),
                deregister_critical_service_after: format!(
                    "{}s",
                    consul_config.deregister_after_secs()
                ),
            },
        };
        let url = format!("{}/v1/agent/service/register", self.address);
        let response = self
            .client
            .put(&url)
            .json(&registration)
            .send()
            .await
            .map_err(|e| {
                CoreErrorKind::RegistryUnavailable
                    .error_with_msg(format!("Failed to reach registry at '{url}': {e}"))
            })?;
        if !response.status().is_success() {
            Err(CoreErrorKind::RegistryUnavailable.error_with_msg(format!(
                "Registration of '{service_id}' was rejected: HTTP {}",
                response.status()
            )))?;
        }
        log::info!(
            "Registered '{service_id}' as '{}' at {}:{service_port}.",
            consul_config.service_name(),
            consul_config.service_address()
        );
        *self.registered_service_id.lock().await = Some(service_id);
        Ok(())
    }

    /// Deregister this process. Invoked from the exit hook, so a failure is
    /// only logged: the critical-eviction window cleans up eventually.
    pub async fn deregister_self(&self) {
        if let Some(service_id) = self.registered_service_id.lock().await.take() {
            self.deregister(&service_id).await;
        }
    }

    async fn deregister(&self, service_id: &str) {
        let url = format!("{}/v1/agent/service/deregister/{service_id}", self.address);
        match self.client.put(&url).send().await {
            Ok(response) if response.status().is_success() => {
                log::debug!("Deregistered '{service_id}'.");
            }
            Ok(response) => {
                log::debug!(
                    "Deregistration of '{service_id}' answered HTTP {}.",
                    response.status()
                );
            }
            Err(e) => {
                log::debug!("Deregistration of '{service_id}' failed: {e}");
            }
        }
    }

    /// Return one passing instance of the service, picked uniformly at
    /// random, or fail with [CoreErrorKind::NoHealthyInstances]. A transient
    /// registry error counts as "none available this call".
    pub async fn resolve_one(&self, service_name: &str) -> Result<ServiceInstance, CoreError> {
        let mut instances = self
            .resolve_all(service_name)
            .await
            .map_err(|e| {
                log::debug!("Registry lookup of '{service_name}' failed: {e}");
            })
            .unwrap_or_default();
        if instances.is_empty() {
            Err(CoreErrorKind::NoHealthyInstances
                .error_with_msg(format!("No passing instance of '{service_name}'.")))?;
        }
        let index = rand::thread_rng().gen_range(0..instances.len());
        Ok(instances.swap_remove(index))
    }

    /// Return all passing instances of the service. An empty list is a valid
    /// answer; a transient registry error is an `Err` so periodic callers
    /// can back off.
    pub async fn resolve_all(
        &self,
        service_name: &str,
    ) -> Result<Vec<ServiceInstance>, CoreError> {
        let url = format!(
            "{}/v1/health/service/{service_name}?passing=true",
            self.address
        );
        let response = self.client.get(&url).send().await.map_err(|e| {
            CoreErrorKind::RegistryUnavailable
                .error_with_msg(format!("Registry lookup of '{service_name}' failed: {e}"))
        })?;
        if !response.status().is_success() {
            Err(CoreErrorKind::RegistryUnavailable.error_with_msg(format!(
                "Registry lookup of '{service_name}' answered HTTP {}.",
                response.status()
            )))?;
        }
        response
            .json::<Vec<HealthServiceEntry>>()
            .await
            .map(|entries| {
                entries
                    .into_iter()
                    .map(ServiceInstance::from_entry)
                    .collect()
            })
            .map_err(|e| {
                CoreErrorKind::RegistryUnavailable.error_with_msg(format!(
                    "Registry answer for '{service_name}' was malformed: {e}"
                ))
            })
    }
}
