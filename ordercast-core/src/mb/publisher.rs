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

//! Publication of saga events.

use super::MessageBus;
use crate::CoreError;
use crate::CoreErrorKind;
use ordercast_events::CorrelationId;
use ordercast_events::SagaEvent;
use serde::Serialize;
use std::sync::Arc;

/// Seam between event producing code and the broker. Production code uses
/// [AmqpEventPublisher]; tests substitute a recording implementation.
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a serialized event document under a routing key.
    async fn publish_document(
        &self,
        routing_key: &str,
        event_document: String,
        correlation_id: Option<&CorrelationId>,
    ) -> Result<(), CoreError>;
}

/// Serialize a typed event and publish it with its own correlation
/// identifier from the envelope.
pub async fn publish_event<E, P>(
    publisher: &P,
    routing_key: &str,
    event: &E,
) -> Result<(), CoreError>
where
    E: SagaEvent + Serialize,
    P: EventPublisher + ?Sized,
{
    let event_document = serde_json::to_string(event).map_err(|e| {
        CoreErrorKind::Serialization
            .error_with_msg(format!("Failed to serialize event for '{routing_key}': {e}"))
    })?;
    publisher
        .publish_document(routing_key, event_document, event.correlation_id())
        .await
}

/// [EventPublisher] backed by the shared [MessageBus].
pub struct AmqpEventPublisher {
    bus: Arc<MessageBus>,
}

impl AmqpEventPublisher {
    /// Return a new instance.
    pub fn new(bus: &Arc<MessageBus>) -> Arc<Self> {
        Arc::new(Self {
            bus: Arc::clone(bus),
        })
    }
}

#[async_trait::async_trait]
impl EventPublisher for AmqpEventPublisher {
    async fn publish_document(
        &self,
        routing_key: &str,
        event_document: String,
        correlation_id: Option<&CorrelationId>,
    ) -> Result<(), CoreError> {
        self.bus
            .publish_document(routing_key, event_document, correlation_id)
            .await
    }
}
