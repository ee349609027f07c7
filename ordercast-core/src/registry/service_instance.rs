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

//! One healthy instance of a registered service.

use serde::Deserialize;

/// Tag that switches a resolved instance to the `https` scheme.
const TAG_HTTPS: &str = "https";

/// Wire shape of one entry in Consul's `/v1/health/service/{name}` answer.
#[derive(Debug, Deserialize)]
pub(super) struct HealthServiceEntry {
    /// The registered service part of the entry.
    #[serde(rename = "Service")]
    pub service: AgentService,
}

/// Wire shape of the registered service.
#[derive(Debug, Deserialize)]
pub(super) struct AgentService {
    /// Unique instance identifier.
    #[serde(rename = "ID")]
    pub id: String,
    /// Logical service name.
    #[serde(rename = "Service")]
    pub service: String,
    /// Instance address.
    #[serde(rename = "Address")]
    pub address: String,
    /// Instance port.
    #[serde(rename = "Port")]
    pub port: u16,
    /// Instance tags.
    #[serde(rename = "Tags", default)]
    pub tags: Vec<String>,
}

/// One healthy instance of a registered service as seen by callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceInstance {
    service_name: String,
    instance_id: String,
    host: String,
    port: u16,
    tags: Vec<String>,
}

impl ServiceInstance {
    pub(super) fn from_entry(entry: HealthServiceEntry) -> Self {
        Self {
            service_name: entry.service.service,
            instance_id: entry.service.id,
            host: entry.service.address,
            port: entry.service.port,
            tags: entry.service.tags,
        }
    }

    /// Logical service name.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Unique instance identifier.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// `scheme://host:port/` where the scheme is `https` iff the instance
    /// carries the `https` tag.
    pub fn base_uri(&self) -> String {
        let scheme = if self.tags.iter().any(|tag| tag.eq_ignore_ascii_case(TAG_HTTPS)) {
            "https"
        } else {
            "http"
        };
        format!("{scheme}://{}:{}/", self.host, self.port)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn instance_with_tags(tags: Vec<String>) -> ServiceInstance {
        ServiceInstance {
            service_name: "OrderService".to_string(),
            instance_id: "OrderService-1".to_string(),
            host: "10.0.0.7".to_string(),
            port: 5001,
            tags,
        }
    }

    #[test]
    fn base_uri_scheme_follows_https_tag() {
        assert_eq!(
            instance_with_tags(Vec::new()).base_uri(),
            "http://10.0.0.7:5001/"
        );
        assert_eq!(
            instance_with_tags(vec!["v1".to_string(), "https".to_string()]).base_uri(),
            "https://10.0.0.7:5001/"
        );
    }
}
