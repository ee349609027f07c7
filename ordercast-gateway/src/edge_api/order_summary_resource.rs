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

//! API resource for the aggregated order summary.

use super::AppState;
use super::api_error;
use actix_web::HttpMessage;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::get;
use actix_web::http::header::AUTHORIZATION;
use actix_web::http::header::ContentType;
use actix_web::web::Data;
use actix_web::web::Path;
use ordercast_events::CorrelationId;
use uuid::Uuid;

/// Aggregated summary of one order.
///
/// Fans out to the user, product and payment services after the
/// authoritative order fetch. Branch failures degrade the answer to a
/// partial summary with warnings instead of failing the request.
#[utoipa::path(
    tag = "aggregate",
    params(
        ("order_id", description = "Order identifier."),
    ),
    responses(
        (
            status = 200,
            description = "Ok. Possibly partial summary of the order.",
            content_type = "application/json",
        ),
        (status = 404, description = "Unknown order."),
        (status = 429, description = "Rate limit exceeded."),
    ),
    security(("bearer_auth" = [])),
)]
#[get("/aggregate/orders/{order_id}/summary")]
pub async fn order_summary(
    app_state: Data<AppState>,
    path: Path<Uuid>,
    http_request: HttpRequest,
) -> HttpResponse {
    let order_id = path.into_inner();
    let correlation_id = http_request
        .extensions()
        .get::<CorrelationId>()
        .map(CorrelationId::to_string)
        .unwrap_or_else(|| "-".to_string());
    let authorization = http_request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header_value| header_value.to_str().ok())
        .map(str::to_string);
    match app_state
        .edge
        .aggregator()
        .summarize(order_id, authorization.as_deref(), &correlation_id)
        .await
    {
        Some(summary) => HttpResponse::Ok()
            .content_type(ContentType::json())
            .json(summary),
        None => api_error::not_found("Unknown order."),
    }
}
