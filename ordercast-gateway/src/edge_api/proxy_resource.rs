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

//! Default resource: forward the request to a resolved upstream instance.

use super::AppState;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::HttpResponseBuilder;
use actix_web::http::StatusCode;
use actix_web::web::Bytes;
use actix_web::web::Data;

use super::api_error;

/// Hop-by-hop headers that must not be forwarded in either direction.
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

fn is_forwardable_header(header_name: &str) -> bool {
    let header_name = header_name.to_lowercase();
    !HOP_BY_HOP_HEADERS.contains(&header_name.as_str())
        && header_name != "host"
        && header_name != "content-length"
}

/** Forward a request to the cluster serving its path.

The cluster is selected from the static route table; the destination is one
of the cluster's registry-resolved instances, picked by
power-of-two-choices. End-to-end headers travel in both directions, which
includes `X-Correlation-ID` (already stamped onto the request by the
correlation middleware) and `Authorization`. A cluster with zero
destinations answers `503`; an unreachable destination answers `502`.
*/
pub async fn forward(
    http_request: HttpRequest,
    body: Bytes,
    app_state: Data<AppState>,
) -> HttpResponse {
    let path = http_request.path();
    let Some(cluster) = app_state.edge.router().cluster_for_path(path) else {
        return api_error::not_found("No route serves this path.");
    };
    let Some(destination) = app_state
        .edge
        .router()
        .pick_destination(cluster.cluster_id())
    else {
        return api_error::no_destinations(cluster.cluster_id());
    };
    let _in_flight = destination.begin_request();
    let mut url = format!(
        "{}{}",
        destination.base_uri(),
        path.trim_start_matches('/')
    );
    if !http_request.query_string().is_empty() {
        url.push('?');
        url.push_str(http_request.query_string());
    }
    let method = reqwest::Method::from_bytes(http_request.method().as_str().as_bytes())
        .expect("actix methods are valid HTTP methods");
    let mut upstream_request = app_state.edge.http_client().request(method, &url);
    for (header_name, header_value) in http_request.headers() {
        if is_forwardable_header(header_name.as_str()) {
            if let Ok(header_value) = header_value.to_str() {
                upstream_request = upstream_request.header(header_name.as_str(), header_value);
            }
        }
    }
    let upstream_response = match upstream_request.body(body.to_vec()).send().await {
        Ok(upstream_response) => upstream_response,
        Err(e) => {
            log::debug!("Proxying to '{url}' failed: {e}");
            return api_error::bad_gateway("Upstream call failed.");
        }
    };
    let status = StatusCode::from_u16(upstream_response.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response_builder = HttpResponseBuilder::new(status);
    for (header_name, header_value) in upstream_response.headers() {
        if is_forwardable_header(header_name.as_str()) {
            if let Ok(header_value) = header_value.to_str() {
                response_builder.insert_header((header_name.as_str(), header_value));
            }
        }
    }
    match upstream_response.bytes().await {
        Ok(upstream_body) => response_builder.body(upstream_body),
        Err(e) => {
            log::debug!("Reading upstream body from '{url}' failed: {e}");
            api_error::bad_gateway("Upstream body could not be read.")
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hop_by_hop_and_length_headers_are_dropped() {
        assert!(!is_forwardable_header("Connection"));
        assert!(!is_forwardable_header("transfer-encoding"));
        assert!(!is_forwardable_header("Host"));
        assert!(!is_forwardable_header("Content-Length"));
        assert!(is_forwardable_header("X-Correlation-ID"));
        assert!(is_forwardable_header("Authorization"));
        assert!(is_forwardable_header("Accept"));
    }
}
