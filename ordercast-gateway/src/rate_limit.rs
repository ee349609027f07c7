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

//! Policy-aware request rate limiting per caller identity.

mod request_limiter;

pub use self::request_limiter::Lease;
pub use self::request_limiter::LimiterParams;
pub use self::request_limiter::RequestLimiter;

use crate::auth::VerifiedIdentity;
use crossbeam_skiplist::SkipMap;
use ordercast_core::conf::RateLimitConfig;
use std::fmt;
use std::sync::Arc;

/// Named limiter policy, selected by request path prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyTag {
    /// Fixed window policy for the product API.
    ProductApi,
    /// Fixed window policy for the order API.
    OrderApi,
    /// Concurrency policy for the payment API.
    PaymentApi,
    /// Fixed window fallback policy.
    Default,
}

impl fmt::Display for PolicyTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Select the limiter policy for a request path.
pub fn policy_for_path(path: &str) -> PolicyTag {
    if path.starts_with("/products") {
        PolicyTag::ProductApi
    } else if path.starts_with("/orders") {
        PolicyTag::OrderApi
    } else if path.starts_with("/payments") {
        PolicyTag::PaymentApi
    } else {
        PolicyTag::Default
    }
}

/** Derive the identity key a request is limited under.

A verified token subject wins over any network derived identity. The
`user:`/`ip:` prefixes keep the two namespaces disjoint so an attacker can
not choose a forwarded address that collides with a user key.
*/
pub fn identity_key(
    identity: Option<&VerifiedIdentity>,
    forwarded_for: Option<&str>,
    peer_address: Option<&str>,
) -> String {
    if let Some(subject) = identity.and_then(VerifiedIdentity::subject) {
        return format!("user:{subject}");
    }
    let address = forwarded_for
        .and_then(|header_value| header_value.split(',').next())
        .map(str::trim)
        .filter(|first_entry| !first_entry.is_empty())
        .or(peer_address)
        .unwrap_or("unknown");
    format!("ip:{address}")
}

/** Process-wide registry of one limiter per `policy '_' identity` key.

Limiters are created lazily and atomically on first use, in the same way as
any other shared concurrent map of this codebase. A globally disabled
configuration short-circuits into a no-op limiter that admits everything.
*/
pub struct RateLimiterRegistry {
    enabled: bool,
    default_params: LimiterParams,
    product_api_params: LimiterParams,
    order_api_params: LimiterParams,
    payment_api_params: LimiterParams,
    limiters: SkipMap<String, Arc<RequestLimiter>>,
}

impl RateLimiterRegistry {
    /// Return a new instance from the limiter configuration.
    pub fn new(rate_limit_config: &RateLimitConfig) -> Arc<Self> {
        Arc::new(Self {
            enabled: rate_limit_config.is_enabled(),
            default_params: LimiterParams::fixed_window(rate_limit_config.default_policy()),
            product_api_params: LimiterParams::fixed_window(
                rate_limit_config.product_api_policy(),
            ),
            order_api_params: LimiterParams::fixed_window(rate_limit_config.order_api_policy()),
            payment_api_params: LimiterParams::concurrency(
                rate_limit_config.payment_api_policy(),
            ),
            limiters: SkipMap::default(),
        })
    }

    fn params_for(&self, policy: PolicyTag) -> &LimiterParams {
        match policy {
            PolicyTag::ProductApi => &self.product_api_params,
            PolicyTag::OrderApi => &self.order_api_params,
            PolicyTag::PaymentApi => &self.payment_api_params,
            PolicyTag::Default => &self.default_params,
        }
    }

    /** Attempt one permit for the identity under the policy.

    `None` means the request is rejected and should be answered with HTTP
    429. The returned [Lease] must be held for the duration of request
    processing; dropping it releases concurrency permits.

    The wait for a queued permit is cancelled by dropping the future, which
    is exactly what happens when the client goes away.
    */
    pub async fn try_acquire(&self, policy: PolicyTag, identity: &str) -> Option<Lease> {
        if !self.enabled {
            return RequestLimiter::NoOp.try_acquire().await;
        }
        let limiter_key = format!("{policy}_{identity}");
        let limiter = Arc::clone(
            self.limiters
                .get_or_insert_with(limiter_key, || {
                    Arc::new(RequestLimiter::from_params(self.params_for(policy)))
                })
                .value(),
        );
        limiter.try_acquire().await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ordercast_core::conf::AppConfig;

    fn registry() -> Arc<RateLimiterRegistry> {
        RateLimiterRegistry::new(&AppConfig::default().ratelimit)
    }

    #[test]
    fn policy_selection_by_path_prefix() {
        assert_eq!(policy_for_path("/products/list"), PolicyTag::ProductApi);
        assert_eq!(policy_for_path("/products"), PolicyTag::ProductApi);
        assert_eq!(policy_for_path("/orders/42"), PolicyTag::OrderApi);
        assert_eq!(policy_for_path("/payments/checkout"), PolicyTag::PaymentApi);
        assert_eq!(policy_for_path("/aggregate/orders"), PolicyTag::Default);
        assert_eq!(policy_for_path("/"), PolicyTag::Default);
    }

    #[test]
    fn identity_key_precedence() {
        assert_eq!(
            identity_key(None, Some("203.0.113.7, 10.0.0.1"), Some("10.1.1.1")),
            "ip:203.0.113.7"
        );
        assert_eq!(identity_key(None, None, Some("10.1.1.1")), "ip:10.1.1.1");
        assert_eq!(identity_key(None, None, None), "ip:unknown");
        assert_eq!(identity_key(None, Some("  "), None), "ip:unknown");
    }

    #[tokio::test]
    async fn identities_are_limited_independently() {
        let registry = registry();
        // Drain the default policy budget for one identity.
        let mut leases = Vec::new();
        for _ in 0..100 {
            leases.push(
                registry
                    .try_acquire(PolicyTag::Default, "user:alice")
                    .await
                    .expect("within budget"),
            );
        }
        assert!(
            registry
                .try_acquire(PolicyTag::Default, "user:alice")
                .await
                .is_none()
        );
        // A different identity still has a full budget.
        assert!(
            registry
                .try_acquire(PolicyTag::Default, "user:bob")
                .await
                .is_some()
        );
    }
}
