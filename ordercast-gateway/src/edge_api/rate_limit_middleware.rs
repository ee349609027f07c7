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

//! Per-identity rate limiting at the edge.

use super::api_error;
use crate::auth::VerifiedIdentity;
use crate::rate_limit::RateLimiterRegistry;
use crate::rate_limit::identity_key;
use crate::rate_limit::policy_for_path;
use actix_web::Error;
use actix_web::HttpMessage;
use actix_web::body::BoxBody;
use actix_web::body::MessageBody;
use actix_web::dev::Service;
use actix_web::dev::ServiceRequest;
use actix_web::dev::ServiceResponse;
use actix_web::dev::Transform;
use actix_web::dev::forward_ready;
use futures::future::LocalBoxFuture;
use futures::future::Ready;
use futures::future::ready;
use ordercast_events::CorrelationId;
use std::rc::Rc;
use std::sync::Arc;

/** Acquires one rate limit permit per request.

The policy follows the path prefix, the identity the verified token subject
(or the caller's address as fallback). A denied permit is answered with the
contract's `429` body and `Retry-After: 60`. The acquired lease is held
until the downstream response completed, which is what makes the
concurrency policy actually cap in-flight work. A client that disconnects
while queued cancels its wait by dropping the request future.
*/
pub struct RateLimit {
    registry: Arc<RateLimiterRegistry>,
}

impl RateLimit {
    /// Return a new instance.
    pub fn new(registry: &Arc<RateLimiterRegistry>) -> Self {
        Self {
            registry: Arc::clone(registry),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = RateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service: Rc::new(service),
            registry: Arc::clone(&self.registry),
        }))
    }
}

/// See [RateLimit].
pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    registry: Arc<RateLimiterRegistry>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let registry = Arc::clone(&self.registry);
        Box::pin(async move {
            let policy = policy_for_path(req.path());
            let identity = {
                let extensions = req.extensions();
                let verified_identity = extensions.get::<Arc<VerifiedIdentity>>();
                identity_key(
                    verified_identity.map(Arc::as_ref),
                    req.headers()
                        .get("X-Forwarded-For")
                        .and_then(|header_value| header_value.to_str().ok()),
                    req.peer_addr()
                        .map(|peer| peer.ip().to_string())
                        .as_deref(),
                )
            };
            let Some(lease) = registry.try_acquire(policy, &identity).await else {
                let correlation_id = req
                    .extensions()
                    .get::<CorrelationId>()
                    .map(CorrelationId::to_string)
                    .unwrap_or_else(|| "-".to_string());
                log::debug!("[{correlation_id}] Rate limit {policy} denied '{identity}'.");
                return Ok(req
                    .into_response(api_error::too_many_requests())
                    .map_into_boxed_body());
            };
            let res = service.call(req).await;
            drop(lease);
            Ok(res?.map_into_boxed_body())
        })
    }
}
