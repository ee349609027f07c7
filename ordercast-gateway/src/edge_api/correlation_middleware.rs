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

//! Outermost middleware: establish the request correlation identifier.

use actix_web::Error;
use actix_web::HttpMessage;
use actix_web::body::BoxBody;
use actix_web::body::MessageBody;
use actix_web::dev::Service;
use actix_web::dev::ServiceRequest;
use actix_web::dev::ServiceResponse;
use actix_web::dev::Transform;
use actix_web::dev::forward_ready;
use actix_web::http::header::HeaderName;
use actix_web::http::header::HeaderValue;
use futures::future::LocalBoxFuture;
use futures::future::Ready;
use futures::future::ready;
use ordercast_events::CorrelationId;
use std::rc::Rc;

/// Name of the correlation header on requests and responses.
pub const CORRELATION_HEADER: &str = "X-Correlation-ID";

/** Establishes the `X-Correlation-ID` of every request.

A present, well-formed inbound value is taken as-is and echoed byte for
byte; anything else is replaced by a freshly minted identifier. The value
is written back onto the request (so proxied calls inherit it), exposed to
downstream middleware and handlers through the request extensions, and set
on the response.
*/
pub struct Correlation;

impl<S, B> Transform<S, ServiceRequest> for Correlation
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = CorrelationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CorrelationMiddleware {
            service: Rc::new(service),
        }))
    }
}

/// See [Correlation].
pub struct CorrelationMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for CorrelationMiddleware<S>
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
        Box::pin(async move {
            let correlation_id = CorrelationId::parse_or_mint(
                req.headers()
                    .get(CORRELATION_HEADER)
                    .and_then(|header_value| header_value.to_str().ok()),
            );
            let mut req = req;
            req.headers_mut().insert(
                HeaderName::from_static("x-correlation-id"),
                HeaderValue::from_str(correlation_id.as_str()).unwrap(),
            );
            req.extensions_mut().insert(correlation_id.clone());
            let mut res = service.call(req).await?;
            res.headers_mut().insert(
                HeaderName::from_static("x-correlation-id"),
                HeaderValue::from_str(correlation_id.as_str()).unwrap(),
            );
            Ok(res.map_into_boxed_body())
        })
    }
}
