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

//! The gateway's own JSON error bodies.
//!
//! No upstream or internal error ever crosses the edge unmasked: the
//! gateway always answers with one of these shapes.

use actix_web::HttpResponse;
use actix_web::http::header::ContentType;

fn error_body(error: &str, message: &str) -> String {
    serde_json::json!({
        "error": error,
        "message": message,
    })
    .to_string()
}

/// `429` with retry advice, the contract of a denied rate limit permit.
pub fn too_many_requests() -> HttpResponse {
    HttpResponse::TooManyRequests()
        .insert_header(("Retry-After", "60"))
        .content_type(ContentType::json())
        .body(error_body(
            "rate_limit_exceeded",
            "Too many requests. Please try again later.",
        ))
}

/// `401` for tokens that fail validation, before anything reaches an
/// upstream service.
pub fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized()
        .content_type(ContentType::json())
        .body(error_body("unauthorized", "Bearer token validation failed."))
}

/// `404` for paths no route covers and entities that do not exist.
pub fn not_found(message: &str) -> HttpResponse {
    HttpResponse::NotFound()
        .content_type(ContentType::json())
        .body(error_body("not_found", message))
}

/// `503` for clusters that currently resolve to zero destinations.
pub fn no_destinations(cluster_id: &str) -> HttpResponse {
    HttpResponse::ServiceUnavailable()
        .content_type(ContentType::json())
        .body(error_body(
            "no_healthy_upstream",
            &format!("No healthy destination in cluster '{cluster_id}'."),
        ))
}

/// `502` when the selected destination could not be reached or answered
/// garbage.
pub fn bad_gateway(message: &str) -> HttpResponse {
    HttpResponse::BadGateway()
        .content_type(ContentType::json())
        .body(error_body("bad_gateway", message))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rate_limit_rejection_matches_the_contract() {
        let response = too_many_requests();
        assert_eq!(response.status().as_u16(), 429);
        assert_eq!(
            response
                .headers()
                .get("Retry-After")
                .unwrap()
                .to_str()
                .unwrap(),
            "60"
        );
    }
}
