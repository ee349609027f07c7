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

//! Parsing of configuration for the aggregated upstream service names.

use config::ConfigBuilder;
use config::builder::BuilderState;
use serde::Deserialize;
use serde::Serialize;

use super::AppConfigDefaults;

/// Logical registry names of the services the aggregation endpoint calls.
#[derive(Debug, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Order service registry name.
    orderservice: String,
    /// User service registry name.
    userservice: String,
    /// Product service registry name.
    productservice: String,
    /// Payment service registry name.
    paymentservice: String,
}

impl AppConfigDefaults for UpstreamConfig {
    /// Provide defaults for this part of the configuration
    fn set_defaults<T: BuilderState>(
        config_builder: ConfigBuilder<T>,
        prefix: &str,
    ) -> ConfigBuilder<T> {
        config_builder
            .set_default(prefix.to_string() + "." + "orderservice", "OrderService")
            .unwrap()
            .set_default(prefix.to_string() + "." + "userservice", "UserService")
            .unwrap()
            .set_default(prefix.to_string() + "." + "productservice", "ProductService")
            .unwrap()
            .set_default(prefix.to_string() + "." + "paymentservice", "PaymentService")
            .unwrap()
    }
}

impl UpstreamConfig {
    /// Order service registry name.
    pub fn order_service(&self) -> &str {
        &self.orderservice
    }

    /// User service registry name.
    pub fn user_service(&self) -> &str {
        &self.userservice
    }

    /// Product service registry name.
    pub fn product_service(&self) -> &str {
        &self.productservice
    }

    /// Payment service registry name.
    pub fn payment_service(&self) -> &str {
        &self.paymentservice
    }
}
