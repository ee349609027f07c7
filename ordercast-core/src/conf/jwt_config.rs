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

//! Parsing of configuration for bearer token validation at the edge.

use config::ConfigBuilder;
use config::builder::BuilderState;
use serde::Deserialize;
use serde::Serialize;

use super::AppConfigDefaults;

/// Configuration for bearer token validation at the edge.
///
/// Tokens are validated on issuer, lifetime and HMAC signature with zero
/// clock skew. The audience claim is deliberately not validated.
#[derive(Deserialize, Serialize)]
pub struct JwtConfig {
    /// Expected `iss` claim.
    issuer: String,
    /// Shared HMAC-SHA256 signing secret.
    secretkey: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("secretkey", &"*redacted*")
            .finish()
    }
}

impl AppConfigDefaults for JwtConfig {
    /// Provide defaults for this part of the configuration
    fn set_defaults<T: BuilderState>(
        config_builder: ConfigBuilder<T>,
        prefix: &str,
    ) -> ConfigBuilder<T> {
        config_builder
            .set_default(prefix.to_string() + "." + "issuer", "ecommerce-auth")
            .unwrap()
            .set_default(prefix.to_string() + "." + "secretkey", "")
            .unwrap()
    }
}

impl JwtConfig {
    /// Expected `iss` claim.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Shared HMAC-SHA256 signing secret. Empty disables token validation
    /// (every bearer token is rejected).
    pub fn secret_key(&self) -> &str {
        &self.secretkey
    }
}
