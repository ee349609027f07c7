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

//! Events published by or on behalf of the order service.

use crate::EventMeta;
use crate::FailedLineItem;
use crate::OrderLineItem;
use crate::SagaEvent;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/** Emitted by the order service when a customer placed an order.

This is the saga trigger. The orchestrator freezes the full payload as the
saga snapshot, so the terminal events can be produced without calling back
into the order service.
*/
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderPlacedEvent {
    /// Envelope fields.
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Order identifier the saga is keyed by.
    pub order_id: Uuid,
    /// Identity of the ordering customer.
    pub user_id: Uuid,
    /// Human-facing order number.
    pub order_number: String,
    /// Customer display name.
    pub customer_name: String,
    /// Customer e-mail address.
    pub customer_email: String,
    /// Customer phone number.
    pub phone_number: String,
    /// Order total.
    pub total_amount: Decimal,
    /// Ordered positions.
    pub items: Vec<OrderLineItem>,
}

impl SagaEvent for OrderPlacedEvent {
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}

/// Terminal happy-path event: stock was reserved, the order is confirmed.
/// Consumed by the notification service and the order service.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderConfirmedEvent {
    /// Envelope fields.
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Order identifier.
    pub order_id: Uuid,
    /// Identity of the ordering customer.
    pub user_id: Uuid,
    /// Human-facing order number.
    pub order_number: String,
    /// Customer display name.
    pub customer_name: String,
    /// Customer e-mail address.
    pub customer_email: String,
    /// Customer phone number.
    pub phone_number: String,
    /// Order total.
    pub total_amount: Decimal,
    /// Confirmed positions.
    pub items: Vec<OrderLineItem>,
}

impl SagaEvent for OrderConfirmedEvent {
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}

/// Terminal compensation event: reservation failed, the order is cancelled.
/// Fans out to the notification consumer group and the order compensation
/// consumer group through a single publish.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderCancelledEvent {
    /// Envelope fields.
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Order identifier.
    pub order_id: Uuid,
    /// Identity of the ordering customer.
    pub user_id: Uuid,
    /// Human-facing order number.
    pub order_number: String,
    /// Customer display name.
    pub customer_name: String,
    /// Customer e-mail address.
    pub customer_email: String,
    /// Customer phone number.
    pub phone_number: String,
    /// Order total.
    pub total_amount: Decimal,
    /// Why the order was cancelled.
    pub reason: String,
    /// Per-line failure detail as reported by the product service.
    pub items: Vec<FailedLineItem>,
}

impl SagaEvent for OrderCancelledEvent {
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::CorrelationId;
    use rust_decimal::Decimal;

    #[test]
    fn wire_format_uses_pascal_case_and_flattened_envelope() {
        let event = OrderPlacedEvent {
            meta: EventMeta::new(Some(CorrelationId::mint())),
            order_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            order_number: "ORD-1001".to_string(),
            customer_name: "Jane Doe".to_string(),
            customer_email: "jane@example.com".to_string(),
            phone_number: "+46701234567".to_string(),
            total_amount: Decimal::new(20000, 2),
            items: vec![OrderLineItem {
                product_id: Uuid::new_v4(),
                quantity: 2,
                unit_price: Decimal::new(10000, 2),
            }],
        };
        let json: serde_json::Value = serde_json::from_str(
            &serde_json::to_string(&event).unwrap(),
        )
        .unwrap();
        for field in [
            "EventId",
            "Timestamp",
            "CorrelationId",
            "OrderId",
            "UserId",
            "OrderNumber",
            "CustomerName",
            "CustomerEmail",
            "PhoneNumber",
            "TotalAmount",
            "Items",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert!(json.get("Items").unwrap()[0].get("UnitPrice").is_some());
    }

    #[test]
    fn publish_consume_round_trip_is_lossless() {
        let event = OrderCancelledEvent {
            meta: EventMeta::new(Some(CorrelationId::mint())),
            order_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            order_number: "ORD-1002".to_string(),
            customer_name: "John Doe".to_string(),
            customer_email: "john@example.com".to_string(),
            phone_number: "+46739876543".to_string(),
            total_amount: Decimal::new(5000, 2),
            reason: "Insufficient stock".to_string(),
            items: vec![FailedLineItem {
                product_id: Uuid::new_v4(),
                requested: 2,
                available: 0,
                reason: "Insufficient stock".to_string(),
            }],
        };
        let decoded: OrderCancelledEvent =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(decoded.meta.event_id, event.meta.event_id);
        assert_eq!(decoded.meta.correlation_id, event.meta.correlation_id);
        assert_eq!(decoded.order_id, event.order_id);
        assert_eq!(decoded.reason, event.reason);
        assert_eq!(decoded.items, event.items);
    }
}
