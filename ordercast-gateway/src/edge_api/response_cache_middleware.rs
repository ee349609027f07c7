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

//! Read-through / write-back response caching for GET requests.

use crate::response_cache::ResponseCache;
use crate::response_cache::build_cache_key;
use actix_web::Error;
use actix_web::HttpMessage;
use actix_web::HttpResponse;
use actix_web::body::BoxBody;
use actix_web::body::MessageBody;
use actix_web::body::to_bytes;
use actix_web::dev::Service;
use actix_web::dev::ServiceRequest;
use actix_web::dev::ServiceResponse;
use actix_web::dev::Transform;
use actix_web::dev::forward_ready;
use actix_web::error;
use actix_web::http::Method;
use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use futures::future::LocalBoxFuture;
use futures::future::Ready;
use futures::future::ready;
use ordercast_events::CorrelationId;
use std::rc::Rc;
use std::sync::Arc;

/** Serves matching GET requests from the distributed cache.

Only paths with a configured cache policy participate; everything else
passes through untouched, and so does every non-GET request. A hit is
served as `application/json` without calling downstream. After a miss,
a downstream `200` is written back with the policy's time to live. Cache
errors in either direction are logged and never fail the request.
*/
pub struct ResponseCaching {
    cache: Arc<ResponseCache>,
}

impl ResponseCaching {
    /// Return a new instance.
    pub fn new(cache: &Arc<ResponseCache>) -> Self {
        Self {
            cache: Arc::clone(cache),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ResponseCaching
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = ResponseCachingMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ResponseCachingMiddleware {
            service: Rc::new(service),
            cache: Arc::clone(&self.cache),
        }))
    }
}

/// See [ResponseCaching].
pub struct ResponseCachingMiddleware<S> {
    service: Rc<S>,
    cache: Arc<ResponseCache>,
}

impl<S, B> Service<ServiceRequest> for ResponseCachingMiddleware<S>
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
        let cache = Arc::clone(&self.cache);
        Box::pin(async move {
            if !cache.enabled() || req.method() != Method::GET {
                return Ok(service.call(req).await?.map_into_boxed_body());
            }
            let Some(ttl) = cache.ttl_for_path(req.path()) else {
                return Ok(service.call(req).await?.map_into_boxed_body());
            };
            let cache_key =
                build_cache_key(req.method().as_str(), req.path(), req.query_string());
            let correlation_id = req
                .extensions()
                .get::<CorrelationId>()
                .map(CorrelationId::to_string)
                .unwrap_or_else(|| "-".to_string());
            if let Some(cached_body) = cache.get(&cache_key).await {
                if log::log_enabled!(log::Level::Debug) {
                    log::debug!("[{correlation_id}] Cache hit for '{cache_key}'.");
                }
                let response = HttpResponse::Ok()
                    .content_type(ContentType::json())
                    .body(cached_body);
                return Ok(req.into_response(response).map_into_boxed_body());
            }
            let res = service.call(req).await?;
            if res.status() != StatusCode::OK {
                return Ok(res.map_into_boxed_body());
            }
            let (request, response) = res.into_parts();
            let (response_head, body) = response.into_parts();
            let body_bytes = to_bytes(body).await.map_err(|e| {
                let e: Box<dyn std::error::Error> = e.into();
                error::ErrorInternalServerError(format!("Failed to buffer response body: {e}"))
            })?;
            cache.put(&cache_key, &body_bytes, ttl).await;
            if log::log_enabled!(log::Level::Debug) {
                log::debug!(
                    "[{correlation_id}] Cached '{cache_key}' for {} s.",
                    ttl.as_secs()
                );
            }
            let response = response_head.set_body(body_bytes);
            Ok(ServiceResponse::new(request, response).map_into_boxed_body())
        })
    }
}
