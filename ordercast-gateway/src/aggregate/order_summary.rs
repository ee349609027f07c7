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

//! Wire shapes of the aggregated summary and its upstream answers.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Answer of the order service, the authoritative branch.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct OrderDto {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub total_amount: Decimal,
    #[serde(default)]
    pub status: Option<String>,
    pub items: Vec<OrderItemDto>,
}

impl OrderDto {
    pub fn distinct_product_ids(&self) -> Vec<Uuid> {
        let mut product_ids = self
            .items
            .iter()
            .map(|item| item.product_id)
            .collect::<Vec<_>>();
        product_ids.sort();
        product_ids.dedup();
        product_ids
    }
}

/// One ordered position as recorded by the order service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct OrderItemDto {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Answer of the user service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct UserProfileDto {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// One catalog entry from the product service bulk lookup.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ProductDto {
    pub product_id: Uuid,
    pub name: String,
}

/// Answer of the payment service:
/// `{paymentId, status, method, paidOn, transactionReference}` or none.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct PaymentDto {
    pub payment_id: Uuid,
    pub status: String,
    pub method: String,
    #[serde(default)]
    pub paid_on: Option<String>,
    #[serde(default)]
    pub transaction_reference: Option<String>,
}

/// Customer part of the summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerProfile {
    /// Customer identifier.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
    /// E-mail address.
    pub email: String,
    /// Phone number, if known.
    pub phone_number: Option<String>,
}

/// Payment part of the summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentInfo {
    /// Payment identifier.
    pub payment_id: Uuid,
    /// Payment status.
    pub status: String,
    /// Payment method.
    pub method: String,
    /// Instant the payment settled, if it did.
    pub paid_on: Option<String>,
    /// External transaction reference, if any.
    pub transaction_reference: Option<String>,
}

/// One summarized position. The unit price is the one recorded on the
/// order; the product name is best-effort catalog garnish.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SummaryLineItem {
    /// Product identifier.
    pub product_id: Uuid,
    /// Catalog name, when the product branch answered.
    pub product_name: Option<String>,
    /// Ordered quantity.
    pub quantity: u32,
    /// Unit price recorded on the order.
    pub unit_price: Decimal,
    /// `quantity * unit_price`.
    pub line_total: Decimal,
}

/// The aggregated order summary served by the gateway.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderSummary {
    /// Order identifier.
    pub order_id: Uuid,
    /// Human-facing order number.
    pub order_number: String,
    /// Order status as reported by the order service.
    pub status: Option<String>,
    /// Order total as recorded by the order service.
    pub total_amount: Decimal,
    /// Summarized positions.
    pub items: Vec<SummaryLineItem>,
    /// Customer branch, when available.
    pub customer: Option<CustomerProfile>,
    /// Payment branch, when available.
    pub payment: Option<PaymentInfo>,
    /// `true` when at least one branch is missing.
    pub is_partial: bool,
    /// One human-readable warning per missing branch.
    pub warnings: Vec<String>,
}

impl OrderSummary {
    pub(super) fn assemble(
        order: OrderDto,
        user: Option<UserProfileDto>,
        products: Vec<ProductDto>,
        payment: Option<PaymentDto>,
        warnings: Vec<String>,
    ) -> Self {
        let items = order
            .items
            .iter()
            .map(|item| SummaryLineItem {
                product_id: item.product_id,
                product_name: products
                    .iter()
                    .find(|product| product.product_id == item.product_id)
                    .map(|product| product.name.to_owned()),
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.unit_price * Decimal::from(item.quantity),
            })
            .collect();
        Self {
            order_id: order.order_id,
            order_number: order.order_number,
            status: order.status,
            total_amount: order.total_amount,
            items,
            customer: user.map(|user| CustomerProfile {
                user_id: user.user_id,
                name: user.name,
                email: user.email,
                phone_number: user.phone_number,
            }),
            payment: payment.map(|payment| PaymentInfo {
                payment_id: payment.payment_id,
                status: payment.status,
                method: payment.method,
                paid_on: payment.paid_on,
                transaction_reference: payment.transaction_reference,
            }),
            is_partial: !warnings.is_empty(),
            warnings,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn order_with_one_item(unit_price: Decimal) -> OrderDto {
        OrderDto {
            order_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            order_number: "ORD-1001".to_string(),
            total_amount: unit_price * Decimal::from(2u32),
            status: Some("Placed".to_string()),
            items: vec![OrderItemDto {
                product_id: Uuid::new_v4(),
                quantity: 2,
                unit_price,
            }],
        }
    }

    #[test]
    fn order_price_is_authoritative_over_catalog() {
        let order = order_with_one_item(Decimal::new(10000, 2));
        let product_id = order.items[0].product_id;
        // The catalog knows a different current price; only the name is used.
        let products = vec![ProductDto {
            product_id,
            name: "Premium Widget".to_string(),
        }];
        let summary = OrderSummary::assemble(order, None, products, None, Vec::new());
        assert_eq!(summary.items[0].unit_price, Decimal::new(10000, 2));
        assert_eq!(summary.items[0].line_total, Decimal::new(20000, 2));
        assert_eq!(
            summary.items[0].product_name.as_deref(),
            Some("Premium Widget")
        );
    }

    #[test]
    fn missing_branches_mark_the_summary_partial() {
        let order = order_with_one_item(Decimal::new(5000, 2));
        let warnings = vec![
            "Product details are unavailable.".to_string(),
            "Payment details are unavailable.".to_string(),
        ];
        let summary = OrderSummary::assemble(
            order,
            Some(UserProfileDto {
                user_id: Uuid::new_v4(),
                name: "Jane Doe".to_string(),
                email: "jane@example.com".to_string(),
                phone_number: None,
            }),
            Vec::new(),
            None,
            warnings,
        );
        assert!(summary.is_partial);
        assert_eq!(summary.warnings.len(), 2);
        assert!(summary.customer.is_some());
        assert!(summary.payment.is_none());
        assert!(summary.items[0].product_name.is_none());
    }

    #[test]
    fn complete_summary_is_not_partial() {
        let order = order_with_one_item(Decimal::new(5000, 2));
        let product_id = order.items[0].product_id;
        let summary = OrderSummary::assemble(
            order,
            Some(UserProfileDto {
                user_id: Uuid::new_v4(),
                name: "Jane Doe".to_string(),
                email: "jane@example.com".to_string(),
                phone_number: Some("+46701234567".to_string()),
            }),
            vec![ProductDto {
                product_id,
                name: "Widget".to_string(),
            }],
            Some(PaymentDto {
                payment_id: Uuid::new_v4(),
                status: "Captured".to_string(),
                method: "card".to_string(),
                paid_on: Some("2025-03-01T10:00:00Z".to_string()),
                transaction_reference: Some("tx-123".to_string()),
            }),
            Vec::new(),
        );
        assert!(!summary.is_partial);
        assert!(summary.warnings.is_empty());
    }
}
