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

//! Order summary aggregation across the backing services.

mod order_summary;

pub use self::order_summary::CustomerProfile;
pub use self::order_summary::OrderSummary;
pub use self::order_summary::PaymentInfo;
pub use self::order_summary::SummaryLineItem;

use self::order_summary::OrderDto;
use self::order_summary::PaymentDto;
use self::order_summary::ProductDto;
use self::order_summary::UserProfileDto;
use ordercast_core::conf::UpstreamConfig;
use ordercast_core::registry::ConsulClient;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use uuid::Uuid;

/** Aggregates one order with its customer, product and payment context.

The order service is authoritative: no order, no summary. Every other
branch is best effort and runs concurrently; a failing branch contributes a
human-readable warning instead of failing the aggregate. Line items keep
the unit price recorded on the order since historical prices must not be
overwritten by the current catalog.
*/
pub struct OrderSummaryAggregator {
    consul: Arc<ConsulClient>,
    client: Client,
    order_service: String,
    user_service: String,
    product_service: String,
    payment_service: String,
}

impl OrderSummaryAggregator {
    /// Return a new instance.
    pub fn new(
        upstream_config: &UpstreamConfig,
        consul: &Arc<ConsulClient>,
        client: &Client,
    ) -> Arc<Self> {
        Arc::new(Self {
            consul: Arc::clone(consul),
            client: client.clone(),
            order_service: upstream_config.order_service().to_string(),
            user_service: upstream_config.user_service().to_string(),
            product_service: upstream_config.product_service().to_string(),
            payment_service: upstream_config.payment_service().to_string(),
        })
    }

    /** Assemble the summary for an order.

    `Ok(None)` means the order does not exist (or the order service could
    not answer), which the resource maps to HTTP 404. The caller's
    `Authorization` header is forwarded to the product service only, which
    is the one bulk endpoint requiring the caller's own entitlements.
    */
    pub async fn summarize(
        &self,
        order_id: Uuid,
        authorization: Option<&str>,
        correlation_id: &str,
    ) -> Option<OrderSummary> {
        let order: OrderDto = self
            .fetch_one(
                &self.order_service,
                &format!("orders/{order_id}"),
                None,
                correlation_id,
            )
            .await?;
        let mut warnings = Vec::new();
        let product_ids = order.distinct_product_ids();
        let user_path = format!("users/{}", order.user_id);
        let products_path = format!("products/by-ids?ids={}", join_ids(&product_ids));
        let payment_path = format!("payments/by-order/{order_id}");
        let (user, products, payment) = tokio::join!(
            self.fetch_one::<UserProfileDto>(&self.user_service, &user_path, None, correlation_id),
            self.fetch_one::<Vec<ProductDto>>(
                &self.product_service,
                &products_path,
                authorization,
                correlation_id,
            ),
            self.fetch_one::<PaymentDto>(&self.payment_service, &payment_path, None, correlation_id),
        );
        if user.is_none() {
            warnings.push("Customer profile is unavailable.".to_string());
        }
        if products.is_none() {
            warnings.push("Product details are unavailable.".to_string());
        }
        if payment.is_none() {
            warnings.push("Payment details are unavailable.".to_string());
        }
        Some(OrderSummary::assemble(
            order,
            user,
            products.unwrap_or_default(),
            payment,
            warnings,
        ))
    }

    /// Resolve one healthy instance and GET a JSON document from it. Any
    /// failure along the way is logged and softened to `None`.
    async fn fetch_one<T: DeserializeOwned>(
        &self,
        service_name: &str,
        relative_path: &str,
        authorization: Option<&str>,
        correlation_id: &str,
    ) -> Option<T> {
        let instance = match self.consul.resolve_one(service_name).await {
            Ok(instance) => instance,
            Err(e) => {
                log::debug!("[{correlation_id}] {e}");
                return None;
            }
        };
        let url = format!("{}{relative_path}", instance.base_uri());
        let mut request = self
            .client
            .get(&url)
            .header("X-Correlation-ID", correlation_id);
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                log::debug!("[{correlation_id}] Call to '{url}' failed: {e}");
                return None;
            }
        };
        if response.status() == StatusCode::NOT_FOUND {
            log::debug!("[{correlation_id}] '{url}' answered 404.");
            return None;
        }
        if !response.status().is_success() {
            log::debug!(
                "[{correlation_id}] '{url}' answered HTTP {}.",
                response.status()
            );
            return None;
        }
        match response.json::<T>().await {
            Ok(document) => Some(document),
            Err(e) => {
                log::debug!("[{correlation_id}] Malformed answer from '{url}': {e}");
                None
            }
        }
    }
}

fn join_ids(product_ids: &[Uuid]) -> String {
    product_ids
        .iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
