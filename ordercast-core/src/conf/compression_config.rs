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

//! Parsing of configuration for conditional response compression.

use config::ConfigBuilder;
use config::builder::BuilderState;
use serde::Deserialize;
use serde::Serialize;

use super::AppConfigDefaults;

/// Configuration for conditional response compression.
#[derive(Debug, Deserialize, Serialize)]
pub struct CompressionConfig {
    /// Global switch. Disabled means responses are sent uncompressed.
    enabled: bool,
    /// Bodies at or below this size in bytes are sent uncompressed.
    thresholdbytes: String,
    /// Comma separated encodings the server is willing to apply.
    supportedencodings: String,
    /// Encoding applied when the client accepts encodings but none of the
    /// preferred ones. Anything outside `br`/`gzip` sends uncompressed.
    defaultencoding: String,
}

impl AppConfigDefaults for CompressionConfig {
    /// Provide defaults for this part of the configuration
    fn set_defaults<T: BuilderState>(
        config_builder: ConfigBuilder<T>,
        prefix: &str,
    ) -> ConfigBuilder<T> {
        config_builder
            .set_default(prefix.to_string() + "." + "enabled", true)
            .unwrap()
            .set_default(prefix.to_string() + "." + "thresholdbytes", "1024")
            .unwrap()
            .set_default(prefix.to_string() + "." + "supportedencodings", "br,gzip")
            .unwrap()
            .set_default(prefix.to_string() + "." + "defaultencoding", "gzip")
            .unwrap()
    }
}

impl CompressionConfig {
    /// Global switch. Disabled means responses are sent uncompressed.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Bodies at or below this size in bytes are sent uncompressed.
    pub fn threshold_bytes(&self) -> usize {
        self.thresholdbytes.parse::<usize>().unwrap_or(1024)
    }

    /// Encodings the server is willing to apply.
    pub fn supported_encodings(&self) -> Vec<String> {
        let mut ret = Vec::new();
        if !self.supportedencodings.is_empty() {
            ret = self
                .supportedencodings
                .split(',')
                .map(|encoding| encoding.trim().to_lowercase())
                .collect();
        }
        ret
    }

    /// Encoding applied when none of the preferred ones is usable.
    pub fn default_encoding(&self) -> &str {
        &self.defaultencoding
    }
}
