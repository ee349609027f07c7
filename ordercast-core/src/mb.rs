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

//! Messaging substrate: broker topology, publisher and consumer skeleton.

mod consumer;
mod publisher;
mod topology;

pub use self::consumer::consume_queue;
pub use self::publisher::AmqpEventPublisher;
pub use self::publisher::EventPublisher;
pub use self::publisher::publish_event;
pub use self::topology::QUEUE_BINDINGS;

use crate::CoreError;
use crate::CoreErrorKind;
use crate::conf::RabbitMqConfig;
use lapin::BasicProperties;
use lapin::Channel;
use lapin::Connection;
use lapin::ConnectionProperties;
use lapin::options::BasicPublishOptions;
use ordercast_events::CorrelationId;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Routing key of [ordercast_events::OrderPlacedEvent].
pub const RK_ORDER_PLACED: &str = "order.placed";
/// Routing key of [ordercast_events::StockReservationRequestedEvent].
pub const RK_STOCK_RESERVATION_REQUESTED: &str = "stock.reservation.requested";
/// Routing key of [ordercast_events::StockReservedCompletedEvent].
pub const RK_STOCK_RESERVED: &str = "stock.reserved";
/// Routing key of [ordercast_events::StockReservationFailedEvent].
pub const RK_STOCK_RESERVATION_FAILED: &str = "stock.reservation_failed";
/// Routing key of [ordercast_events::OrderConfirmedEvent].
pub const RK_ORDER_CONFIRMED: &str = "order.confirmed";
/// Routing key of [ordercast_events::OrderCancelledEvent]. Bound by two
/// consumer-group queues, so one publish fans out to notification and order
/// compensation. No ordering between the two groups is promised and both
/// consumers must be idempotent on `orderId`.
pub const RK_ORDER_CANCELLED: &str = "order.cancelled";

/// Consumer-group queue of the orchestrator's saga trigger.
pub const QUEUE_ORCHESTRATOR_ORDER_PLACED: &str = "orchestrator.order_placed";
/// Consumer-group queue of the product service reservation requests.
pub const QUEUE_PRODUCT_STOCK_RESERVATION_REQUESTED: &str = "product.stock_reservation_requested";
/// Consumer-group queue of the orchestrator's happy-path terminal trigger.
pub const QUEUE_ORCHESTRATOR_STOCK_RESERVED: &str = "orchestrator.stock_reserved";
/// Consumer-group queue of the orchestrator's compensation trigger.
pub const QUEUE_ORCHESTRATOR_STOCK_FAILED: &str = "orchestrator.stock_failed";
/// Consumer-group queue of the notification service confirmations.
pub const QUEUE_NOTIFICATION_ORDER_CONFIRMED: &str = "notification.order_confirmed";
/// Consumer-group queue of the notification service cancellations.
pub const QUEUE_NOTIFICATION_ORDER_CANCELLED: &str = "notification.order_cancelled";
/// Consumer-group queue of the order service compensation handler.
pub const QUEUE_ORDER_COMPENSATION_CANCELLED: &str = "order.compensation_cancelled";

/** Shared AMQP connection with an idempotently declared topology.

One connection per process. The embedded publish channel is shared behind a
lock since `lapin` channels must not see interleaved publishes from
concurrent tasks; consumers get a dedicated channel each via
[Self::create_channel].
*/
pub struct MessageBus {
    connection: Connection,
    publish_channel: Mutex<Channel>,
    exchange_name: String,
}

impl MessageBus {
    /// Connect and declare the full topology.
    pub async fn connect(rabbitmq_config: &RabbitMqConfig) -> Result<Arc<Self>, CoreError> {
        let uri = rabbitmq_config.amqp_uri();
        let connection = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(|e| {
                CoreErrorKind::Messaging
                    .error_with_msg(format!("Failed to connect to message broker: {e}"))
            })?;
        let channel = connection.create_channel().await.map_err(|e| {
            CoreErrorKind::Messaging.error_with_msg(format!("Failed to open channel: {e}"))
        })?;
        topology::declare_topology(&channel, rabbitmq_config).await?;
        log::info!(
            "Message broker topology declared on exchange '{}'.",
            rabbitmq_config.exchange_name()
        );
        Ok(Arc::new(Self {
            connection,
            publish_channel: Mutex::new(channel),
            exchange_name: rabbitmq_config.exchange_name().to_string(),
        }))
    }

    /// Name of the topic exchange events are published to.
    pub fn exchange_name(&self) -> &str {
        &self.exchange_name
    }

    /// Open a dedicated channel, e.g. for a consumer.
    pub async fn create_channel(&self) -> Result<Channel, CoreError> {
        self.connection.create_channel().await.map_err(|e| {
            CoreErrorKind::Messaging.error_with_msg(format!("Failed to open channel: {e}"))
        })
    }

    /// Publish a JSON event document on the topic exchange.
    ///
    /// The document is sent with content type `application/json`, persistent
    /// delivery and the correlation identifier in the message properties.
    pub async fn publish_document(
        &self,
        routing_key: &str,
        event_document: String,
        correlation_id: Option<&CorrelationId>,
    ) -> Result<(), CoreError> {
        let mut channel = self.publish_channel.lock().await;
        if !channel.status().connected() {
            // Channel level errors kill the channel but not the connection.
            log::info!("Publish channel was closed. Opening a new one.");
            *channel = self.create_channel().await?;
        }
        let mut properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2);
        if let Some(correlation_id) = correlation_id {
            properties = properties.with_correlation_id(correlation_id.as_str().into());
        }
        channel
            .basic_publish(
                &self.exchange_name,
                routing_key,
                BasicPublishOptions::default(),
                event_document.as_bytes(),
                properties,
            )
            .await
            .map_err(|e| {
                CoreErrorKind::Messaging.error_with_msg(format!(
                    "Failed to publish to '{routing_key}': {e}"
                ))
            })?;
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("Published to '{routing_key}': {event_document}");
        }
        Ok(())
    }

    /// Close the connection. Invoked from the process exit hook.
    pub async fn close(&self) {
        if let Err(e) = self.connection.close(200, "Normal shutdown").await {
            log::debug!("Closing broker connection failed: {e}");
        }
    }
}
