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

//! Gateway edge HTTP server and its middleware pipeline.
//!
//! Middleware executes in a fixed order on the way in: correlation,
//! request logging, bearer token validation, rate limiting, compression
//! wrapping the response cache, and finally either a gateway-owned
//! resource or the dynamic proxy as the default resource.

mod api_error;
mod bearer_auth_middleware;
mod compression_middleware;
mod correlation_middleware;
mod order_summary_resource;
mod proxy_resource;
mod rate_limit_middleware;
mod request_log_middleware;
mod response_cache_middleware;

pub use self::correlation_middleware::CORRELATION_HEADER;

use self::bearer_auth_middleware::BearerAuth;
use self::compression_middleware::CompressionSettings;
use self::compression_middleware::ResponseCompression;
use self::correlation_middleware::Correlation;
use self::rate_limit_middleware::RateLimit;
use self::request_log_middleware::RequestLog;
use self::response_cache_middleware::ResponseCaching;
use crate::aggregate::OrderSummaryAggregator;
use crate::auth::BearerTokenChecker;
use crate::rate_limit::RateLimiterRegistry;
use crate::response_cache::ResponseCache;
use crate::routing::DynamicRouter;
use actix_web::App;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use actix_web::Responder;
use actix_web::get;
use actix_web::http::header::ContentType;
use actix_web::web;
use ordercast_core::CoreError;
use ordercast_core::conf::AppConfig;
use ordercast_core::registry::ConsulClient;
use ordercast_health::AppHealth;
use ordercast_health::health_resources;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use utoipa::OpenApi;

/// Number of parallel requests the can be served for each assigned worker.
const CONNECTIONS_PER_WORKER: usize = 1024;

/// Composition root of the gateway process.
pub struct GatewayEdge {
    health_ready: AtomicBool,
    consul: Arc<ConsulClient>,
    router: Arc<DynamicRouter>,
    limiters: Arc<RateLimiterRegistry>,
    response_cache: Arc<ResponseCache>,
    bearer_checker: Arc<BearerTokenChecker>,
    compression_settings: Arc<CompressionSettings>,
    aggregator: Arc<OrderSummaryAggregator>,
    http_client: reqwest::Client,
}

impl GatewayEdge {
    /// Package name reported by Cargo at build time.
    const CARGO_PKG_NAME: &str = env!("CARGO_PKG_NAME");
    /// Package version reported by Cargo at build time.
    const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Return a new instance with the destination refresher running and the
    /// gateway registered in the service registry.
    pub async fn new(app_config: &Arc<AppConfig>) -> Result<Arc<Self>, CoreError> {
        let consul = ConsulClient::new(app_config);
        if let Err(e) = consul
            .register_self(&app_config.consul, app_config.api.bind_port())
            .await
        {
            log::warn!("Proceeding without registry registration: {e}");
        }
        let router = DynamicRouter::new(&app_config.routing, &consul);
        let limiters = RateLimiterRegistry::new(&app_config.ratelimit);
        let response_cache = ResponseCache::new(&app_config.cache).await;
        let bearer_checker = BearerTokenChecker::new(&app_config.jwt);
        let compression_settings = CompressionSettings::new(&app_config.compression);
        let http_client = reqwest::ClientBuilder::new()
            .user_agent(format!(
                "{}/{}",
                Self::CARGO_PKG_NAME,
                Self::CARGO_PKG_VERSION
            ))
            .referer(false)
            .timeout(core::time::Duration::from_secs(30))
            .build()
            .unwrap();
        let aggregator =
            OrderSummaryAggregator::new(&app_config.upstream, &consul, &http_client);
        let ret = Arc::new(Self {
            health_ready: AtomicBool::new(false),
            consul,
            router,
            limiters,
            response_cache,
            bearer_checker,
            compression_settings,
            aggregator,
            http_client,
        });
        ret.health_ready.store(true, Ordering::Relaxed);
        Ok(ret)
    }

    /// Registry-driven router.
    pub fn router(&self) -> &Arc<DynamicRouter> {
        &self.router
    }

    /// Order summary aggregator.
    pub fn aggregator(&self) -> &Arc<OrderSummaryAggregator> {
        &self.aggregator
    }

    /// Shared HTTP client for proxying and fan-out calls.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Return `true` if the app has started.
    pub fn is_health_started(&self) -> bool {
        self.health_ready.load(Ordering::Relaxed)
    }

    /// Return `true` if the app is ready to accept requests.
    pub fn is_health_ready(&self) -> bool {
        self.health_ready.load(Ordering::Relaxed)
    }

    /// Return `true` if the app is functioning as expected.
    pub fn is_health_live(&self) -> bool {
        true
    }

    /// Invoked on graceful shutdowns to allow for some pre-emptive clean-up.
    pub async fn exit_hook(&self) {
        self.consul.deregister_self().await;
    }
}

/// Shared state between requests.
#[derive(Clone)]
pub struct AppState {
    /// The gateway composition root.
    pub edge: Arc<GatewayEdge>,
}

/// Health adapter over the gateway edge.
struct GatewayHealth {
    edge: Arc<GatewayEdge>,
}

impl GatewayHealth {
    fn with_edge(edge: &Arc<GatewayEdge>) -> Arc<dyn AppHealth> {
        Arc::new(Self {
            edge: Arc::clone(edge),
        })
    }
}

impl AppHealth for GatewayHealth {
    fn is_health_started(&self) -> bool {
        self.edge.is_health_started()
    }
    fn is_health_ready(&self) -> bool {
        self.edge.is_health_ready()
    }
    fn is_health_live(&self) -> bool {
        self.edge.is_health_live()
    }
}

/// Run HTTP server.
pub async fn run_http_server(
    app_config: &Arc<AppConfig>,
    edge: &Arc<GatewayEdge>,
) -> Result<(), Box<dyn core::error::Error>> {
    let workers = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(2);
    let max_connections = CONNECTIONS_PER_WORKER * workers;
    log::info!(
        "Gateway edge described by http://{}:{}/openapi.json allows {max_connections} concurrent connections.",
        &app_config.api.bind_address(),
        &app_config.api.bind_port(),
    );
    let app_data = web::Data::<AppState>::new(AppState {
        edge: Arc::clone(edge),
    });
    let app_health = web::Data::<Arc<dyn AppHealth>>::new(GatewayHealth::with_edge(edge));
    let edge = Arc::clone(edge);

    HttpServer::new(move || {
        App::new()
            .app_data(app_data.clone())
            .app_data(app_health.clone())
            .service(get_openapi)
            .service(web::redirect("/openapi", "/openapi.json"))
            .service(order_summary_resource::order_summary)
            .service(health_resources::health)
            .service(health_resources::health_live)
            .service(health_resources::health_ready)
            .service(health_resources::health_started)
            .default_service(web::route().to(proxy_resource::forward))
            // Middleware registered last runs first: the chain below
            // executes bottom to top on the way in. The cache sits inside
            // compression so it stores and serves uncompressed bodies while
            // cache hits still leave the edge compressed.
            .wrap(ResponseCaching::new(&edge.response_cache))
            .wrap(ResponseCompression::new(&edge.compression_settings))
            .wrap(RateLimit::new(&edge.limiters))
            .wrap(BearerAuth::new(&edge.bearer_checker))
            .wrap(RequestLog)
            .wrap(Correlation)
    })
    .workers(workers)
    .backlog(u32::try_from(max_connections / 2).unwrap()) // Default is 2048
    .max_connections(max_connections)
    .bind_auto_h2c((app_config.api.bind_address(), app_config.api.bind_port()))?
    .disable_signals()
    .shutdown_timeout(5) // Default 30
    .run()
    .await?;
    Ok(())
}

/// Serve Open API documentation.
#[get("/openapi.json")]
async fn get_openapi() -> impl Responder {
    HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(openapi_as_string())
}

/// Get the OpenAPI definition as a pretty JSON String.
pub fn openapi_as_string() -> String {
    #[derive(OpenApi)]
    #[openapi(
        // Use Cargo.toml as source for the "info" section
        paths(
            order_summary_resource::order_summary,
            health_resources::health,
            health_resources::health_live,
            health_resources::health_ready,
            health_resources::health_started,
        )
    )]
    struct ApiDoc;
    ApiDoc::openapi().to_pretty_json().unwrap()
}
