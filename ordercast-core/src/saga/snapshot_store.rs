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

//! Bounded-TTL store of frozen `OrderPlaced` snapshots.

use crate::util::time::get_timestamp_micros;
use crossbeam_skiplist::SkipMap;
use crossbeam_skiplist::map::Entry;
use ordercast_events::OrderPlacedEvent;
use std::sync::Arc;
use uuid::Uuid;

/** Process-local saga state, one snapshot per live `order_id`.

[Self::remove] is atomic and therefore doubles as the saga's single-consume
token: of any number of racing terminal events for the same order, exactly
one obtains the snapshot.

Entries expire after the configured time to live, which bounds memory for
sagas whose counterpart service never answers. Expiry makes a late terminal
event a drop, which is the documented idempotence behavior, not an error.

For orchestration across multiple instances this store is the piece to swap
for a distributed key-value store keyed `saga:{order_id}`, keeping the
remove-as-consume-token rule atomic there as well.
*/
pub struct SnapshotStore {
    snapshots: SkipMap<Uuid, (u64, OrderPlacedEvent)>,
    ttl_micros: u64,
}

impl SnapshotStore {
    /// Interval between purge sweeps of expired snapshots.
    const PURGE_INTERVAL_MICROS: u64 = 60_000_000;

    /// Return a new instance with a background expiry sweep.
    pub fn new(ttl_secs: u64) -> Arc<Self> {
        Arc::new(Self {
            snapshots: SkipMap::new(),
            ttl_micros: ttl_secs * 1_000_000,
        })
        .init()
    }

    fn init(self: Arc<Self>) -> Arc<Self> {
        let self_clone = Arc::clone(&self);
        tokio::spawn(async move { self_clone.purge_expired_snapshots().await });
        self
    }

    /// Purge expired snapshots that no terminal event ever consumed.
    async fn purge_expired_snapshots(&self) {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_micros(
                Self::PURGE_INTERVAL_MICROS,
            ))
            .await;
            let now = get_timestamp_micros();
            for entry in self.snapshots.iter() {
                if entry.value().0 < now {
                    log::info!(
                        "Saga snapshot for order '{}' expired without a terminal event.",
                        entry.key()
                    );
                    entry.remove();
                }
            }
        }
    }

    /// Freeze a snapshot. A snapshot already present for the same order is
    /// overwritten, which keeps redelivered saga triggers idempotent.
    pub fn insert(&self, order_id: Uuid, event: OrderPlacedEvent) {
        self.snapshots
            .insert(order_id, (get_timestamp_micros() + self.ttl_micros, event));
    }

    /// Consume the snapshot for an order. Expired entries count as absent.
    pub fn remove(&self, order_id: &Uuid) -> Option<OrderPlacedEvent> {
        self.snapshots
            .remove(order_id)
            .as_ref()
            .map(Entry::value)
            .filter(|(expires_micros, _)| *expires_micros >= get_timestamp_micros())
            .map(|(_, event)| event.to_owned())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ordercast_events::CorrelationId;
    use ordercast_events::EventMeta;
    use rust_decimal::Decimal;

    fn order_placed(order_id: Uuid) -> OrderPlacedEvent {
        OrderPlacedEvent {
            meta: EventMeta::new(Some(CorrelationId::mint())),
            order_id,
            user_id: Uuid::new_v4(),
            order_number: "ORD-1".to_string(),
            customer_name: "Jane Doe".to_string(),
            customer_email: "jane@example.com".to_string(),
            phone_number: "+4670".to_string(),
            total_amount: Decimal::ZERO,
            items: Vec::new(),
        }
    }

    #[tokio::test]
    async fn remove_is_a_single_consume_token() {
        let store = SnapshotStore::new(1800);
        let order_id = Uuid::new_v4();
        store.insert(order_id, order_placed(order_id));
        assert!(store.remove(&order_id).is_some());
        assert!(store.remove(&order_id).is_none());
    }

    #[tokio::test]
    async fn expired_snapshot_counts_as_absent() {
        let store = SnapshotStore::new(0);
        let order_id = Uuid::new_v4();
        store.insert(order_id, order_placed(order_id));
        tokio::time::sleep(tokio::time::Duration::from_millis(2)).await;
        assert!(store.remove(&order_id).is_none());
    }
}
