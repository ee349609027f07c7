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

//! Events exchanged with the product service for stock reservation.

use crate::EventMeta;
use crate::FailedLineItem;
use crate::OrderLineItem;
use crate::SagaEvent;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Published by the orchestrator to ask the product service for a stock
/// reservation covering the placed order.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StockReservationRequestedEvent {
    /// Envelope fields.
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Order identifier.
    pub order_id: Uuid,
    /// Identity of the ordering customer.
    pub user_id: Uuid,
    /// Positions to reserve.
    pub items: Vec<OrderLineItem>,
}

impl SagaEvent for StockReservationRequestedEvent {
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}

/// Published by the product service when every position was reserved.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StockReservedCompletedEvent {
    /// Envelope fields.
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Order identifier.
    pub order_id: Uuid,
    /// Identity of the ordering customer.
    pub user_id: Uuid,
    /// Reserved positions.
    pub items: Vec<OrderLineItem>,
}

impl SagaEvent for StockReservedCompletedEvent {
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}

/// Published by the product service when the reservation could not be
/// fulfilled. Drives the compensation branch of the saga.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StockReservationFailedEvent {
    /// Envelope fields.
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Order identifier.
    pub order_id: Uuid,
    /// Identity of the ordering customer.
    pub user_id: Uuid,
    /// Summary reason, e.g. `Insufficient stock`.
    pub reason: String,
    /// Per-line failure detail, `requested >= available >= 0`.
    pub failed_items: Vec<FailedLineItem>,
}

impl SagaEvent for StockReservationFailedEvent {
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}
