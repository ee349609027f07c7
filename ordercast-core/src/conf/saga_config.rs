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

//! Parsing of configuration for the saga orchestrator.

use config::ConfigBuilder;
use config::builder::BuilderState;
use serde::Deserialize;
use serde::Serialize;

use super::AppConfigDefaults;

/// Configuration for the saga orchestrator.
#[derive(Debug, Deserialize, Serialize)]
pub struct SagaConfig {
    /// Snapshot time to live in seconds. Must cover broker plus consumer
    /// latency for the slowest reservation round trip.
    snapshotttlsecs: String,
}

impl AppConfigDefaults for SagaConfig {
    /// Provide defaults for this part of the configuration
    fn set_defaults<T: BuilderState>(
        config_builder: ConfigBuilder<T>,
        prefix: &str,
    ) -> ConfigBuilder<T> {
        config_builder
            .set_default(prefix.to_string() + "." + "snapshotttlsecs", "1800")
            .unwrap()
    }
}

impl SagaConfig {
    /// Snapshot time to live in seconds. Defaults to 30 minutes.
    pub fn snapshot_ttl_secs(&self) -> u64 {
        self.snapshotttlsecs.parse::<u64>().unwrap_or(1800)
    }
}
