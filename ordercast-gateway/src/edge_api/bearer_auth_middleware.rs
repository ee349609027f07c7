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

//! Bearer token validation ahead of the proxy.

use super::api_error;
use crate::auth::BearerTokenChecker;
use crate::auth::strip_bearer_scheme;
use actix_web::Error;
use actix_web::HttpMessage;
use actix_web::body::BoxBody;
use actix_web::body::MessageBody;
use actix_web::dev::Service;
use actix_web::dev::ServiceRequest;
use actix_web::dev::ServiceResponse;
use actix_web::dev::Transform;
use actix_web::dev::forward_ready;
use actix_web::http::header::AUTHORIZATION;
use futures::future::LocalBoxFuture;
use futures::future::Ready;
use futures::future::ready;
use ordercast_events::CorrelationId;
use std::rc::Rc;
use std::sync::Arc;

/** Validates the `Authorization: Bearer` token when one is present.

An invalid or expired token is answered with `401` here at the edge and
never reaches a downstream service. Requests without a bearer token pass
through anonymously; per-route authorization stays the business of the
services behind the proxy. The verified identity is exposed to downstream
middleware (the rate limiter keys on it) through the request extensions.
*/
pub struct BearerAuth {
    checker: Arc<BearerTokenChecker>,
}

impl BearerAuth {
    /// Return a new instance.
    pub fn new(checker: &Arc<BearerTokenChecker>) -> Self {
        Self {
            checker: Arc::clone(checker),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BearerAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = BearerAuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BearerAuthMiddleware {
            service: Rc::new(service),
            checker: Arc::clone(&self.checker),
        }))
    }
}

/// See [BearerAuth].
pub struct BearerAuthMiddleware<S> {
    service: Rc<S>,
    checker: Arc<BearerTokenChecker>,
}

impl<S, B> Service<ServiceRequest> for BearerAuthMiddleware<S>
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
        let checker = Arc::clone(&self.checker);
        Box::pin(async move {
            let bearer_token = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|header_value| header_value.to_str().ok())
                .and_then(strip_bearer_scheme)
                .map(str::to_string);
            if let Some(bearer_token) = bearer_token {
                match checker.verify(&bearer_token) {
                    Ok(identity) => {
                        req.extensions_mut().insert(identity);
                    }
                    Err(e) => {
                        let correlation_id = req
                            .extensions()
                            .get::<CorrelationId>()
                            .map(CorrelationId::to_string)
                            .unwrap_or_else(|| "-".to_string());
                        log::debug!("[{correlation_id}] {e}");
                        return Ok(req
                            .into_response(api_error::unauthorized())
                            .map_into_boxed_body());
                    }
                }
            }
            Ok(service.call(req).await?.map_into_boxed_body())
        })
    }
}
