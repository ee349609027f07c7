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

pub mod health_resources;

/// Health state of the application as seen by platform probes.
pub trait AppHealth: Send + Sync {
    /// Return `true` once the application finished starting up.
    fn is_health_started(&self) -> bool;

    /// Return `true` while the application is ready to accept traffic.
    fn is_health_ready(&self) -> bool;

    /// Return `false` when the application needs to be restarted.
    fn is_health_live(&self) -> bool;
}
