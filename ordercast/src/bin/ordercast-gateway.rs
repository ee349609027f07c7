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

//! API gateway entrypoint.

use ordercast::block_until_signaled;
use ordercast::init_logger;
use ordercast::startup_ts_micros;
use ordercast_core::conf::AppConfig;
use ordercast_gateway::GatewayEdge;
use std::process::ExitCode;
use std::sync::Arc;

/// Application main entrypoint.
fn main() -> ExitCode {
    let startup_ts_micros = startup_ts_micros();
    if let Err(e) = init_logger() {
        println!("Failed to initialize logging: {e:?}");
        return ExitCode::FAILURE;
    }
    let app_config = Arc::new(AppConfig::new("ordercast_gateway", startup_ts_micros));
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(run_async(app_config))
}

/// Async code entry point.
async fn run_async(app_config: Arc<AppConfig>) -> ExitCode {
    let edge = match GatewayEdge::new(&app_config).await {
        Ok(edge) => edge,
        Err(e) => {
            log::error!("Gateway startup failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    let app_future = ordercast_gateway::edge_api::run_http_server(&app_config, &edge);
    let signals_future = block_until_signaled();
    let res = tokio::select! {
        res = app_future => {
            log::trace!("app_future finished");
            res
        },
        _ = signals_future => {
            log::trace!("signals_future finished");
            Ok(())
        },
    }
    .map_err(|e| log::error!("{e}"));
    edge.exit_hook().await;
    if res.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
