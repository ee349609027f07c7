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

//! Order line item shapes shared by several event payloads.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// One ordered product position. Quantity is at least 1 and the unit price is
/// the price recorded on the order, not the current catalog price.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderLineItem {
    /// Product identifier.
    pub product_id: Uuid,
    /// Ordered quantity, `>= 1`.
    pub quantity: u32,
    /// Non-negative unit price recorded at order time.
    pub unit_price: Decimal,
}

/// Per-line detail of a failed stock reservation. `requested >= available`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FailedLineItem {
    /// Product identifier.
    pub product_id: Uuid,
    /// Quantity the order asked for.
    pub requested: u32,
    /// Quantity the product service could offer.
    pub available: u32,
    /// Free-form reason, e.g. `Insufficient stock`.
    pub reason: String,
}
