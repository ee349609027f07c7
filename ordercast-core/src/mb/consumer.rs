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

//! Generic consumer skeleton over a decoder and a handler.

use super::MessageBus;
use crate::CoreError;
use crate::CoreErrorKind;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::BasicAckOptions;
use lapin::options::BasicConsumeOptions;
use lapin::options::BasicNackOptions;
use lapin::options::BasicQosOptions;
use lapin::types::FieldTable;
use ordercast_events::CorrelationId;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::watch;

/** Consume a queue until the shutdown signal flips.

One delivery at a time per instance (`prefetch = 1`): the handler for
delivery `n` completes before delivery `n + 1` is handed over, giving strict
per-queue FIFO within this instance. Horizontal parallelism comes from
running additional instances of the same consumer group.

Delivery discipline:
- handler `Ok` acknowledges the single delivery tag,
- handler `Err` on a first delivery requeues the message,
- handler `Err` on a redelivered message routes it to the dead letter
  exchange (bounded redelivery),
- an undecodable body is poison and goes straight to the dead letter
  exchange.

The correlation identifier is restored from the message properties and
passed to the handler so every log line and follow-up event of the handler
can carry it.
*/
pub async fn consume_queue<T, H, Fut>(
    bus: &Arc<MessageBus>,
    queue_name: &str,
    mut shutdown: watch::Receiver<bool>,
    handler: H,
) -> Result<(), CoreError>
where
    T: DeserializeOwned,
    H: Fn(T, Option<CorrelationId>) -> Fut,
    Fut: Future<Output = Result<(), CoreError>>,
{
    let channel = bus.create_channel().await?;
    channel
        .basic_qos(1, BasicQosOptions::default())
        .await
        .map_err(|e| {
            CoreErrorKind::Messaging
                .error_with_msg(format!("Failed to set prefetch on '{queue_name}': {e}"))
        })?;
    let consumer_tag = format!("{queue_name}.{}", uuid::Uuid::new_v4().simple());
    let mut consumer = channel
        .basic_consume(
            queue_name,
            &consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| {
            CoreErrorKind::Messaging
                .error_with_msg(format!("Failed to consume '{queue_name}': {e}"))
        })?;
    log::info!("Consuming '{queue_name}' as '{consumer_tag}'.");
    loop {
        tokio::select! {
            delivery_opt = consumer.next() => {
                match delivery_opt {
                    Some(Ok(delivery)) => {
                        handle_delivery(queue_name, delivery, &handler).await;
                    }
                    Some(Err(e)) => {
                        log::warn!("Consumer on '{queue_name}' failed: {e}");
                        Err(CoreErrorKind::Messaging
                            .error_with_msg(format!("Consumer on '{queue_name}' failed: {e}")))?;
                    }
                    None => {
                        log::info!("Consumer stream on '{queue_name}' ended.");
                        break;
                    }
                }
            }
            _ = shutdown.changed() => {
                log::debug!("Consumer on '{queue_name}' received the shutdown signal.");
                break;
            }
        }
    }
    if let Err(e) = channel.close(200, "Consumer stopped").await {
        log::debug!("Closing consumer channel on '{queue_name}' failed: {e}");
    }
    Ok(())
}

/// Decode and dispatch one delivery, then ack or nack it.
async fn handle_delivery<T, H, Fut>(queue_name: &str, delivery: Delivery, handler: &H)
where
    T: DeserializeOwned,
    H: Fn(T, Option<CorrelationId>) -> Fut,
    Fut: Future<Output = Result<(), CoreError>>,
{
    let correlation_id = delivery
        .properties
        .correlation_id()
        .as_ref()
        .and_then(|value| CorrelationId::parse(value.as_str()));
    let event = match serde_json::from_slice::<T>(&delivery.data) {
        Ok(event) => event,
        Err(e) => {
            // Poison message. Redelivery would fail the same way.
            log::warn!(
                "[{}] Undecodable message on '{queue_name}' goes to the dead letter exchange: {e}",
                correlation_id_for_log(&correlation_id),
            );
            nack(queue_name, &delivery, false).await;
            return;
        }
    };
    match handler(event, correlation_id.clone()).await {
        Ok(()) => {
            if let Err(e) = delivery.acker.ack(BasicAckOptions::default()).await {
                log::warn!("Failed to ack delivery on '{queue_name}': {e}");
            }
        }
        Err(e) => {
            let requeue = !delivery.redelivered;
            log::warn!(
                "[{}] Handler on '{queue_name}' failed (requeue: {requeue}): {e}",
                correlation_id_for_log(&correlation_id),
            );
            nack(queue_name, &delivery, requeue).await;
        }
    }
}

async fn nack(queue_name: &str, delivery: &Delivery, requeue: bool) {
    let nack_options = BasicNackOptions {
        requeue,
        ..BasicNackOptions::default()
    };
    if let Err(e) = delivery.acker.nack(nack_options).await {
        log::warn!("Failed to nack delivery on '{queue_name}': {e}");
    }
}

fn correlation_id_for_log(correlation_id: &Option<CorrelationId>) -> &str {
    correlation_id
        .as_ref()
        .map(CorrelationId::as_str)
        .unwrap_or("-")
}
