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

//! Parsing of configuration for the edge rate limiter policies.

use config::ConfigBuilder;
use config::builder::BuilderState;
use serde::Deserialize;
use serde::Serialize;

use super::AppConfigDefaults;

/// Order in which queued admission requests are served.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueProcessingOrder {
    /// Serve the longest waiting request first.
    OldestFirst,
    /// Serve the most recent request first.
    NewestFirst,
}

/// Parameters of one named limiter policy.
#[derive(Debug, Deserialize, Serialize)]
pub struct RateLimitPolicyConfig {
    /// Admissions per window (fixed window) or in flight (concurrency).
    permitlimit: String,
    /// Window length in seconds. Ignored by the concurrency variant.
    windowsecs: String,
    /// Requests allowed to wait for a permit before rejection.
    queuelimit: String,
    /// `OldestFirst` or `NewestFirst`.
    queueprocessingorder: String,
}

impl RateLimitPolicyConfig {
    /// Admissions per window or concurrently in flight.
    pub fn permit_limit(&self) -> u32 {
        self.permitlimit.parse::<u32>().unwrap_or(100)
    }

    /// Window length in seconds.
    pub fn window_secs(&self) -> u64 {
        self.windowsecs.parse::<u64>().unwrap_or(60)
    }

    /// Requests allowed to wait for a permit before rejection.
    pub fn queue_limit(&self) -> u32 {
        self.queuelimit.parse::<u32>().unwrap_or(0)
    }

    /// Order in which queued requests are served.
    pub fn queue_processing_order(&self) -> QueueProcessingOrder {
        if self.queueprocessingorder.eq_ignore_ascii_case("newestfirst") {
            QueueProcessingOrder::NewestFirst
        } else {
            QueueProcessingOrder::OldestFirst
        }
    }
}

/// Configuration of the edge rate limiter policies.
#[derive(Debug, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Global switch. Disabled means every request is admitted.
    isenabled: bool,
    /// Fallback policy for paths without a dedicated one.
    default: RateLimitPolicyConfig,
    /// Fixed window policy for `/products*`.
    productapi: RateLimitPolicyConfig,
    /// Fixed window policy for `/orders*`.
    orderapi: RateLimitPolicyConfig,
    /// Concurrency policy for `/payments*`.
    paymentapi: RateLimitPolicyConfig,
}

impl AppConfigDefaults for RateLimitConfig {
    /// Provide defaults for this part of the configuration
    fn set_defaults<T: BuilderState>(
        config_builder: ConfigBuilder<T>,
        prefix: &str,
    ) -> ConfigBuilder<T> {
        let mut config_builder = config_builder
            .set_default(prefix.to_string() + "." + "isenabled", true)
            .unwrap();
        for (policy, permitlimit, windowsecs, queuelimit) in [
            ("default", "100", "60", "0"),
            ("productapi", "60", "60", "10"),
            ("orderapi", "30", "60", "5"),
            ("paymentapi", "10", "60", "5"),
        ] {
            config_builder = config_builder
                .set_default(
                    prefix.to_string() + "." + policy + "." + "permitlimit",
                    permitlimit,
                )
                .unwrap()
                .set_default(
                    prefix.to_string() + "." + policy + "." + "windowsecs",
                    windowsecs,
                )
                .unwrap()
                .set_default(
                    prefix.to_string() + "." + policy + "." + "queuelimit",
                    queuelimit,
                )
                .unwrap()
                .set_default(
                    prefix.to_string() + "." + policy + "." + "queueprocessingorder",
                    "OldestFirst",
                )
                .unwrap();
        }
        config_builder
    }
}

impl RateLimitConfig {
    /// Global switch. Disabled means every request is admitted.
    pub fn is_enabled(&self) -> bool {
        self.isenabled
    }

    /// Fallback policy for paths without a dedicated one.
    pub fn default_policy(&self) -> &RateLimitPolicyConfig {
        &self.default
    }

    /// Fixed window policy for `/products*`.
    pub fn product_api_policy(&self) -> &RateLimitPolicyConfig {
        &self.productapi
    }

    /// Fixed window policy for `/orders*`.
    pub fn order_api_policy(&self) -> &RateLimitPolicyConfig {
        &self.orderapi
    }

    /// Concurrency policy for `/payments*`.
    pub fn payment_api_policy(&self) -> &RateLimitPolicyConfig {
        &self.paymentapi
    }
}
