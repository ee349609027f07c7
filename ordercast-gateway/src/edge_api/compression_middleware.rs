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

//! Conditional compression of buffered textual responses.

use crate::compression::compress;
use crate::compression::is_compressible_content_type;
use crate::compression::select_encoding;
use actix_web::Error;
use actix_web::body::BoxBody;
use actix_web::body::MessageBody;
use actix_web::body::to_bytes;
use actix_web::dev::Service;
use actix_web::dev::ServiceRequest;
use actix_web::dev::ServiceResponse;
use actix_web::dev::Transform;
use actix_web::dev::forward_ready;
use actix_web::error;
use actix_web::http::header;
use actix_web::http::header::HeaderValue;
use futures::future::LocalBoxFuture;
use futures::future::Ready;
use futures::future::ready;
use ordercast_core::conf::CompressionConfig;
use std::rc::Rc;
use std::sync::Arc;

/// Value copy of the compression configuration shared by all workers.
pub struct CompressionSettings {
    enabled: bool,
    threshold_bytes: usize,
    supported_encodings: Vec<String>,
    default_encoding: String,
}

impl CompressionSettings {
    /// Return a new instance from the compression configuration.
    pub fn new(compression_config: &CompressionConfig) -> Arc<Self> {
        Arc::new(Self {
            enabled: compression_config.enabled(),
            threshold_bytes: compression_config.threshold_bytes(),
            supported_encodings: compression_config.supported_encodings(),
            default_encoding: compression_config.default_encoding().to_string(),
        })
    }
}

/** Compresses textual response bodies above the configured threshold.

Skipped entirely when disabled, when the client sent no `Accept-Encoding`,
when the content type is outside the compressible set or when the buffered
body is at or below the threshold. The applied encoding is negotiated
brotli first, then gzip, then the configured default. `Content-Encoding`
is set and `Content-Length` follows the compressed body exactly.
*/
pub struct ResponseCompression {
    settings: Arc<CompressionSettings>,
}

impl ResponseCompression {
    /// Return a new instance.
    pub fn new(settings: &Arc<CompressionSettings>) -> Self {
        Self {
            settings: Arc::clone(settings),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ResponseCompression
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = ResponseCompressionMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ResponseCompressionMiddleware {
            service: Rc::new(service),
            settings: Arc::clone(&self.settings),
        }))
    }
}

/// See [ResponseCompression].
pub struct ResponseCompressionMiddleware<S> {
    service: Rc<S>,
    settings: Arc<CompressionSettings>,
}

impl<S, B> Service<ServiceRequest> for ResponseCompressionMiddleware<S>
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
        let settings = Arc::clone(&self.settings);
        Box::pin(async move {
            let accept_encoding = req
                .headers()
                .get(header::ACCEPT_ENCODING)
                .and_then(|header_value| header_value.to_str().ok())
                .map(str::to_string);
            let res = service.call(req).await?;
            if !settings.enabled {
                return Ok(res.map_into_boxed_body());
            }
            let Some(accept_encoding) = accept_encoding else {
                return Ok(res.map_into_boxed_body());
            };
            let compressible = res
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|header_value| header_value.to_str().ok())
                .is_some_and(is_compressible_content_type);
            if !compressible {
                return Ok(res.map_into_boxed_body());
            }
            let (request, response) = res.into_parts();
            let (mut response_head, body) = response.into_parts();
            let body_bytes = to_bytes(body).await.map_err(|e| {
                let e: Box<dyn std::error::Error> = e.into();
                error::ErrorInternalServerError(format!("Failed to buffer response body: {e}"))
            })?;
            if body_bytes.len() <= settings.threshold_bytes {
                let response = response_head.set_body(body_bytes);
                return Ok(ServiceResponse::new(request, response).map_into_boxed_body());
            }
            let Some(encoding) = select_encoding(
                &accept_encoding,
                &settings.supported_encodings,
                &settings.default_encoding,
            ) else {
                let response = response_head.set_body(body_bytes);
                return Ok(ServiceResponse::new(request, response).map_into_boxed_body());
            };
            let compressed = compress(encoding, &body_bytes);
            response_head.headers_mut().insert(
                header::CONTENT_ENCODING,
                HeaderValue::from_static(encoding.token()),
            );
            let response = response_head.set_body(compressed);
            Ok(ServiceResponse::new(request, response).map_into_boxed_body())
        })
    }
}
