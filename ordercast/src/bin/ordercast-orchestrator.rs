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

//! Saga orchestrator entrypoint.

use actix_web::App;
use actix_web::HttpServer;
use actix_web::web;
use ordercast::block_until_signaled;
use ordercast::init_logger;
use ordercast::startup_ts_micros;
use ordercast_core::conf::AppConfig;
use ordercast_core::saga::SagaService;
use ordercast_health::AppHealth;
use ordercast_health::health_resources;
use std::process::ExitCode;
use std::sync::Arc;

/// Application main entrypoint.
fn main() -> ExitCode {
    let startup_ts_micros = startup_ts_micros();
    if let Err(e) = init_logger() {
        println!("Failed to initialize logging: {e:?}");
        return ExitCode::FAILURE;
    }
    let app_config = Arc::new(AppConfig::new("ordercast_orchestrator", startup_ts_micros));
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(run_async(app_config))
}

/// Health adapter over the saga service.
struct SagaServiceHealth {
    saga_service: Arc<SagaService>,
}

impl SagaServiceHealth {
    fn with_service(saga_service: &Arc<SagaService>) -> Arc<dyn AppHealth> {
        Arc::new(Self {
            saga_service: Arc::clone(saga_service),
        })
    }
}

impl AppHealth for SagaServiceHealth {
    fn is_health_started(&self) -> bool {
        self.saga_service.is_health_started()
    }
    fn is_health_ready(&self) -> bool {
        self.saga_service.is_health_ready()
    }
    fn is_health_live(&self) -> bool {
        self.saga_service.is_health_live()
    }
}

/// Async code entry point.
async fn run_async(app_config: Arc<AppConfig>) -> ExitCode {
    let saga_service = match SagaService::new(&app_config).await {
        Ok(saga_service) => saga_service,
        Err(e) => {
            log::error!("Orchestrator startup failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    let app_future = run_health_server(&app_config, &saga_service);
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
    saga_service.exit_hook().await;
    if res.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Serve the health probes. The orchestrator has no other HTTP surface.
async fn run_health_server(
    app_config: &Arc<AppConfig>,
    saga_service: &Arc<SagaService>,
) -> Result<(), Box<dyn core::error::Error>> {
    let app_health =
        web::Data::<Arc<dyn AppHealth>>::new(SagaServiceHealth::with_service(saga_service));
    HttpServer::new(move || {
        App::new()
            .app_data(app_health.clone())
            .service(health_resources::health)
            .service(health_resources::health_live)
            .service(health_resources::health_ready)
            .service(health_resources::health_started)
    })
    .workers(1)
    .bind((app_config.api.bind_address(), app_config.api.bind_port()))?
    .disable_signals()
    .shutdown_timeout(5)
    .run()
    .await?;
    Ok(())
}
