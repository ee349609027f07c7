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

//! Order saga orchestration.

mod saga_service;
mod snapshot_store;

pub use self::saga_service::SagaService;
pub use self::snapshot_store::SnapshotStore;

use crate::CoreError;
use crate::mb::EventPublisher;
use crate::mb::RK_ORDER_CANCELLED;
use crate::mb::RK_ORDER_CONFIRMED;
use crate::mb::RK_STOCK_RESERVATION_REQUESTED;
use crate::mb::publish_event;
use ordercast_events::EventMeta;
use ordercast_events::OrderCancelledEvent;
use ordercast_events::OrderConfirmedEvent;
use ordercast_events::OrderPlacedEvent;
use ordercast_events::StockReservationFailedEvent;
use ordercast_events::StockReservationRequestedEvent;
use ordercast_events::StockReservedCompletedEvent;
use std::sync::Arc;

/// Observable result of handling one inbound saga event.
#[derive(Debug, PartialEq, Eq)]
pub enum SagaOutcome {
    /// A new saga was started and a stock reservation was requested.
    ReservationRequested,
    /// The saga reached its happy terminal state.
    Confirmed,
    /// The saga was compensated into its cancelled terminal state.
    Cancelled,
    /// The inbound event referenced no live saga and was dropped.
    Dropped,
}

/** Coordinator of the distributed order transaction.

One logical saga instance exists per `order_id` from `OrderPlaced` until a
terminal event is published. The instance is nothing but the frozen
`OrderPlaced` snapshot in the [SnapshotStore]: removing the snapshot is the
single-consume token that guarantees exactly one terminal event per saga,
regardless of duplicate or out-of-order terminal triggers.

The correlation identifier of every outbound event is copied verbatim from
the inbound event that caused it.
*/
pub struct SagaOrchestrator {
    snapshots: Arc<SnapshotStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl SagaOrchestrator {
    /// Return a new instance.
    pub fn new(publisher: &Arc<dyn EventPublisher>, snapshot_ttl_secs: u64) -> Arc<Self> {
        Arc::new(Self {
            snapshots: SnapshotStore::new(snapshot_ttl_secs),
            publisher: Arc::clone(publisher),
        })
    }

    /// Snapshot store, exposed for service wiring and tests.
    pub fn snapshots(&self) -> &Arc<SnapshotStore> {
        &self.snapshots
    }

    /** Start a saga: freeze the order snapshot and request reservation.

    Redelivery of the same `OrderPlaced` overwrites the snapshot with the
    identical payload, so this handler is idempotent per `order_id`.
    */
    pub async fn on_order_placed(
        &self,
        event: OrderPlacedEvent,
    ) -> Result<SagaOutcome, CoreError> {
        let correlation_id = event.meta.correlation_id.clone();
        log::info!(
            "[{}] Saga started for order '{}'.",
            correlation_id_for_log(&event),
            event.order_id
        );
        let request = StockReservationRequestedEvent {
            meta: EventMeta::new(correlation_id),
            order_id: event.order_id,
            user_id: event.user_id,
            items: event.items.clone(),
        };
        self.snapshots.insert(event.order_id, event);
        publish_event(
            self.publisher.as_ref(),
            RK_STOCK_RESERVATION_REQUESTED,
            &request,
        )
        .await?;
        Ok(SagaOutcome::ReservationRequested)
    }

    /** Happy-path terminal transition: publish `OrderConfirmed`.

    A missing snapshot means the saga already reached a terminal state (or
    expired) and the event is a late duplicate to drop. Consuming the
    snapshot and publishing are tied together: when the publish fails the
    snapshot is put back and the error propagates, so the broker redelivers
    and the transition is retried.
    */
    pub async fn on_stock_reserved(
        &self,
        event: StockReservedCompletedEvent,
    ) -> Result<SagaOutcome, CoreError> {
        let Some(snapshot) = self.snapshots.remove(&event.order_id) else {
            log::debug!(
                "[{}] No live saga for order '{}'. Dropping StockReserved.",
                correlation_id_for_log(&event),
                event.order_id
            );
            return Ok(SagaOutcome::Dropped);
        };
        let confirmed = OrderConfirmedEvent {
            meta: EventMeta::new(event.meta.correlation_id.clone()),
            order_id: snapshot.order_id,
            user_id: snapshot.user_id,
            order_number: snapshot.order_number.clone(),
            customer_name: snapshot.customer_name.clone(),
            customer_email: snapshot.customer_email.clone(),
            phone_number: snapshot.phone_number.clone(),
            total_amount: snapshot.total_amount,
            items: snapshot.items.clone(),
        };
        if let Err(e) = publish_event(self.publisher.as_ref(), RK_ORDER_CONFIRMED, &confirmed).await
        {
            self.snapshots.insert(snapshot.order_id, snapshot);
            Err(e)?;
        }
        log::info!(
            "[{}] Saga confirmed order '{}'.",
            correlation_id_for_log(&event),
            event.order_id
        );
        Ok(SagaOutcome::Confirmed)
    }

    /** Compensation transition: publish `OrderCancelled`.

    Same single-consume discipline as the happy path. The cancellation
    carries the failure reason and the per-line detail reported by the
    product service.
    */
    pub async fn on_stock_failed(
        &self,
        event: StockReservationFailedEvent,
    ) -> Result<SagaOutcome, CoreError> {
        let Some(snapshot) = self.snapshots.remove(&event.order_id) else {
            log::debug!(
                "[{}] No live saga for order '{}'. Dropping StockReservationFailed.",
                correlation_id_for_log(&event),
                event.order_id
            );
            return Ok(SagaOutcome::Dropped);
        };
        let cancelled = OrderCancelledEvent {
            meta: EventMeta::new(event.meta.correlation_id.clone()),
            order_id: snapshot.order_id,
            user_id: snapshot.user_id,
            order_number: snapshot.order_number.clone(),
            customer_name: snapshot.customer_name.clone(),
            customer_email: snapshot.customer_email.clone(),
            phone_number: snapshot.phone_number.clone(),
            total_amount: snapshot.total_amount,
            reason: event.reason.clone(),
            items: event.failed_items.clone(),
        };
        if let Err(e) = publish_event(self.publisher.as_ref(), RK_ORDER_CANCELLED, &cancelled).await
        {
            self.snapshots.insert(snapshot.order_id, snapshot);
            Err(e)?;
        }
        log::info!(
            "[{}] Saga cancelled order '{}': {}",
            correlation_id_for_log(&event),
            event.order_id,
            event.reason
        );
        Ok(SagaOutcome::Cancelled)
    }
}

fn correlation_id_for_log<E: ordercast_events::SagaEvent>(event: &E) -> &str {
    event
        .correlation_id()
        .map(ordercast_events::CorrelationId::as_str)
        .unwrap_or("-")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::CoreErrorKind;
    use crate::mb::EventPublisher;
    use ordercast_events::CorrelationId;
    use ordercast_events::FailedLineItem;
    use ordercast_events::OrderLineItem;
    use rust_decimal::Decimal;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    /// Publisher that records documents instead of talking to a broker.
    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(String, serde_json::Value)>>,
        fail_next: AtomicBool,
    }

    #[async_trait::async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish_document(
            &self,
            routing_key: &str,
            event_document: String,
            _correlation_id: Option<&CorrelationId>,
        ) -> Result<(), crate::CoreError> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                Err(CoreErrorKind::Messaging.error_with_msg("Broker is gone."))?;
            }
            self.published.lock().await.push((
                routing_key.to_string(),
                serde_json::from_str(&event_document).unwrap(),
            ));
            Ok(())
        }
    }

    fn order_placed(order_id: Uuid) -> OrderPlacedEvent {
        OrderPlacedEvent {
            meta: EventMeta::new(Some(CorrelationId::mint())),
            order_id,
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
        }
    }

    fn stock_reserved(placed: &OrderPlacedEvent) -> StockReservedCompletedEvent {
        StockReservedCompletedEvent {
            meta: EventMeta::new(placed.meta.correlation_id.clone()),
            order_id: placed.order_id,
            user_id: placed.user_id,
            items: placed.items.clone(),
        }
    }

    fn stock_failed(placed: &OrderPlacedEvent) -> StockReservationFailedEvent {
        StockReservationFailedEvent {
            meta: EventMeta::new(placed.meta.correlation_id.clone()),
            order_id: placed.order_id,
            user_id: placed.user_id,
            reason: "Insufficient stock".to_string(),
            failed_items: vec![FailedLineItem {
                product_id: placed.items[0].product_id,
                requested: 2,
                available: 0,
                reason: "Insufficient stock".to_string(),
            }],
        }
    }

    fn orchestrator_with_recorder() -> (Arc<SagaOrchestrator>, Arc<RecordingPublisher>) {
        let recorder = Arc::new(RecordingPublisher::default());
        let publisher = Arc::clone(&recorder) as Arc<dyn EventPublisher>;
        (SagaOrchestrator::new(&publisher, 1800), recorder)
    }

    #[tokio::test]
    async fn happy_path_confirms_once_and_clears_snapshot() {
        let (orchestrator, recorder) = orchestrator_with_recorder();
        let placed = order_placed(Uuid::new_v4());
        let correlation_id = placed.meta.correlation_id.clone().unwrap();
        let outcome = orchestrator.on_order_placed(placed.clone()).await.unwrap();
        assert_eq!(outcome, SagaOutcome::ReservationRequested);
        let outcome = orchestrator
            .on_stock_reserved(stock_reserved(&placed))
            .await
            .unwrap();
        assert_eq!(outcome, SagaOutcome::Confirmed);
        assert!(orchestrator.snapshots().remove(&placed.order_id).is_none());
        let published = recorder.published.lock().await;
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].0, RK_STOCK_RESERVATION_REQUESTED);
        assert_eq!(published[1].0, RK_ORDER_CONFIRMED);
        // Every event of the chain carries the trigger's correlation id.
        for (_, document) in published.iter() {
            assert_eq!(
                document.get("CorrelationId").unwrap().as_str().unwrap(),
                correlation_id.as_str()
            );
        }
        assert_eq!(
            published[1].1.get("TotalAmount").unwrap().as_f64().unwrap(),
            200.0
        );
    }

    #[tokio::test]
    async fn compensation_cancels_with_failure_detail() {
        let (orchestrator, recorder) = orchestrator_with_recorder();
        let placed = order_placed(Uuid::new_v4());
        orchestrator.on_order_placed(placed.clone()).await.unwrap();
        let outcome = orchestrator
            .on_stock_failed(stock_failed(&placed))
            .await
            .unwrap();
        assert_eq!(outcome, SagaOutcome::Cancelled);
        let published = recorder.published.lock().await;
        let (routing_key, cancelled) = published.last().unwrap();
        assert_eq!(routing_key, RK_ORDER_CANCELLED);
        assert_eq!(
            cancelled.get("Reason").unwrap().as_str().unwrap(),
            "Insufficient stock"
        );
        let failed_items = cancelled.get("Items").unwrap().as_array().unwrap();
        assert_eq!(failed_items[0].get("Requested").unwrap().as_u64(), Some(2));
        assert_eq!(failed_items[0].get("Available").unwrap().as_u64(), Some(0));
    }

    #[tokio::test]
    async fn duplicate_terminal_event_is_dropped() {
        let (orchestrator, recorder) = orchestrator_with_recorder();
        let placed = order_placed(Uuid::new_v4());
        orchestrator.on_order_placed(placed.clone()).await.unwrap();
        let first = orchestrator
            .on_stock_reserved(stock_reserved(&placed))
            .await
            .unwrap();
        let second = orchestrator
            .on_stock_reserved(stock_reserved(&placed))
            .await
            .unwrap();
        assert_eq!(first, SagaOutcome::Confirmed);
        assert_eq!(second, SagaOutcome::Dropped);
        // Exactly one terminal event was published.
        let published = recorder.published.lock().await;
        let terminal_count = published
            .iter()
            .filter(|(routing_key, _)| {
                routing_key == RK_ORDER_CONFIRMED || routing_key == RK_ORDER_CANCELLED
            })
            .count();
        assert_eq!(terminal_count, 1);
    }

    #[tokio::test]
    async fn terminal_event_for_unknown_order_is_dropped() {
        let (orchestrator, recorder) = orchestrator_with_recorder();
        let placed = order_placed(Uuid::new_v4());
        let outcome = orchestrator
            .on_stock_failed(stock_failed(&placed))
            .await
            .unwrap();
        assert_eq!(outcome, SagaOutcome::Dropped);
        assert!(recorder.published.lock().await.is_empty());
    }

    #[tokio::test]
    async fn failed_terminal_publish_keeps_the_saga_retryable() {
        let (orchestrator, recorder) = orchestrator_with_recorder();
        let placed = order_placed(Uuid::new_v4());
        orchestrator.on_order_placed(placed.clone()).await.unwrap();
        recorder.fail_next.store(true, Ordering::SeqCst);
        let result = orchestrator.on_stock_reserved(stock_reserved(&placed)).await;
        assert!(result.is_err());
        // Broker redelivery retries the transition against the restored
        // snapshot and now succeeds.
        let outcome = orchestrator
            .on_stock_reserved(stock_reserved(&placed))
            .await
            .unwrap();
        assert_eq!(outcome, SagaOutcome::Confirmed);
    }
}
