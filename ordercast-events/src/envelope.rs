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

//! Common envelope fields carried by every published event.

use crate::CorrelationId;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/** Envelope fields shared by all saga events.

Flattened into each event's JSON document, so the wire shape is the flat
object the consuming services expect (PascalCase field names).

Events are immutable once published: the envelope is created exactly once
and copied by value into any follow-up event of the same saga.
*/
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventMeta {
    /// Unique identifier of this single event.
    pub event_id: Uuid,
    /// UTC instant the event was created at the publisher.
    pub timestamp: DateTime<Utc>,
    /// Saga-wide correlation identifier. Absent only for events that enter
    /// the system without an HTTP edge (e.g. manually injected test traffic).
    pub correlation_id: Option<CorrelationId>,
}

impl EventMeta {
    /// Fresh envelope for a new event within the correlated request.
    pub fn new(correlation_id: Option<CorrelationId>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            correlation_id,
        }
    }
}

/// Accessors every saga event provides to generic messaging code.
pub trait SagaEvent {
    /// Envelope fields of the event.
    fn meta(&self) -> &EventMeta;

    /// Saga-wide correlation identifier, if any.
    fn correlation_id(&self) -> Option<&CorrelationId> {
        self.meta().correlation_id.as_ref()
    }
}
