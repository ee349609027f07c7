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

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

use tokio::signal::unix::SignalKind;
use tokio::signal::unix::signal;

/// Microseconds since UNIX epoch at process startup, for readiness timing.
pub fn startup_ts_micros() -> u64 {
    u64::try_from(
        std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .expect("System time is apparently before unix epoch time which is highly unexpected.")
            .as_micros(),
    )
    .expect("Current epoch time in microseconds did not fit inside a 64-bit unsigned.")
}

/// Initialize the logging system and apply filters.
pub fn init_logger() -> Result<(), log::SetLoggerError> {
    env_logger::builder()
        // Set default log level
        .filter_level(log::LevelFilter::Debug)
        // Customize logging for dependencies
        .filter(Some("actix_server::builder"), log::LevelFilter::Warn)
        .filter(Some("actix_http::h1"), log::LevelFilter::Info)
        .filter(Some("mio::poll"), log::LevelFilter::Info)
        .filter(Some("lapin"), log::LevelFilter::Info)
        .filter(Some("pinky_swear"), log::LevelFilter::Info)
        .filter(Some("rustls::client"), log::LevelFilter::Info)
        .filter(Some("hyper_util"), log::LevelFilter::Info)
        .filter(Some("reqwest::connect"), log::LevelFilter::Info)
        .filter(
            Some("ordercast_gateway::routing"),
            log::LevelFilter::Debug,
        )
        .filter(Some("ordercast_core::mb"), log::LevelFilter::Debug)
        .write_style(env_logger::fmt::WriteStyle::Auto)
        .target(env_logger::fmt::Target::Stdout)
        .is_test(false)
        .parse_env(
            env_logger::Env::new()
                .filter("LOG_LEVEL")
                .write_style("LOG_STYLE"),
        )
        .try_init()
}

/// Block until the process is asked to stop with SIGTERM or SIGINT.
pub async fn block_until_signaled() {
    let mut sigint = signal(SignalKind::interrupt()).unwrap();
    let mut sigterm = signal(SignalKind::terminate()).unwrap();
    tokio::select! {
        _ = sigterm.recv() => {
            log::debug!("Caught SIGTERM. Shutting down.")
        },
        _ = sigint.recv() => {
            log::debug!("Caught SIGINT. Shutting down.")
        },
    };
}
