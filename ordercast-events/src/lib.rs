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

mod correlation_id;
mod envelope;
mod line_item;
mod order_events;
mod stock_events;

pub use self::correlation_id::CorrelationId;
pub use self::envelope::EventMeta;
pub use self::envelope::SagaEvent;
pub use self::line_item::FailedLineItem;
pub use self::line_item::OrderLineItem;
pub use self::order_events::OrderCancelledEvent;
pub use self::order_events::OrderConfirmedEvent;
pub use self::order_events::OrderPlacedEvent;
pub use self::stock_events::StockReservationFailedEvent;
pub use self::stock_events::StockReservationRequestedEvent;
pub use self::stock_events::StockReservedCompletedEvent;
