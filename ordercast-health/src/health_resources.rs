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

//! Health probe API resources.

use crate::AppHealth;
use actix_web::HttpResponse;
use actix_web::Responder;
use actix_web::get;
use actix_web::web::Data;
use std::sync::Arc;

/// Body served while the probe passes.
const BODY_HEALTHY: &str = "Healthy";
/// Body served while the probe fails.
const BODY_UNHEALTHY: &str = "Unhealthy";

fn probe_response(healthy: bool) -> HttpResponse {
    if healthy {
        HttpResponse::Ok().body(BODY_HEALTHY)
    } else {
        HttpResponse::ServiceUnavailable().body(BODY_UNHEALTHY)
    }
}

/// Aggregate health: started, ready and live.
#[utoipa::path(
    tag = "health",
    responses(
        (status = 200, description = "Application is healthy.", content_type = "text/plain"),
        (status = 503, description = "Application is unhealthy.", content_type = "text/plain"),
    ),
)]
#[get("/health")]
pub async fn health(app_health: Data<Arc<dyn AppHealth>>) -> impl Responder {
    probe_response(
        app_health.is_health_started()
            && app_health.is_health_ready()
            && app_health.is_health_live(),
    )
}

/// Startup probe.
#[utoipa::path(
    tag = "health",
    responses(
        (status = 200, description = "Application has started.", content_type = "text/plain"),
        (status = 503, description = "Application is still starting.", content_type = "text/plain"),
    ),
)]
#[get("/health/started")]
pub async fn health_started(app_health: Data<Arc<dyn AppHealth>>) -> impl Responder {
    probe_response(app_health.is_health_started())
}

/// Readiness probe.
#[utoipa::path(
    tag = "health",
    responses(
        (status = 200, description = "Application accepts traffic.", content_type = "text/plain"),
        (status = 503, description = "Application does not accept traffic.", content_type = "text/plain"),
    ),
)]
#[get("/health/ready")]
pub async fn health_ready(app_health: Data<Arc<dyn AppHealth>>) -> impl Responder {
    probe_response(app_health.is_health_ready())
}

/// Liveness probe.
#[utoipa::path(
    tag = "health",
    responses(
        (status = 200, description = "Application is live.", content_type = "text/plain"),
        (status = 503, description = "Application should be restarted.", content_type = "text/plain"),
    ),
)]
#[get("/health/live")]
pub async fn health_live(app_health: Data<Arc<dyn AppHealth>>) -> impl Responder {
    probe_response(app_health.is_health_live())
}
