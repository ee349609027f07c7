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

//! Idempotent declaration of the broker topology.

use super::*;
use crate::CoreError;
use crate::CoreErrorKind;
use crate::conf::RabbitMqConfig;
use lapin::Channel;
use lapin::ExchangeKind;
use lapin::options::ExchangeDeclareOptions;
use lapin::options::QueueBindOptions;
use lapin::options::QueueDeclareOptions;
use lapin::types::AMQPValue;
use lapin::types::FieldTable;

/// The seven consumer-group queues and the routing key each is bound with.
/// `order.cancelled` appears twice so a single publish fans out to both the
/// notification and the order compensation consumer groups.
pub const QUEUE_BINDINGS: [(&str, &str); 7] = [
    (QUEUE_ORCHESTRATOR_ORDER_PLACED, RK_ORDER_PLACED),
    (
        QUEUE_PRODUCT_STOCK_RESERVATION_REQUESTED,
        RK_STOCK_RESERVATION_REQUESTED,
    ),
    (QUEUE_ORCHESTRATOR_STOCK_RESERVED, RK_STOCK_RESERVED),
    (QUEUE_ORCHESTRATOR_STOCK_FAILED, RK_STOCK_RESERVATION_FAILED),
    (QUEUE_NOTIFICATION_ORDER_CONFIRMED, RK_ORDER_CONFIRMED),
    (QUEUE_NOTIFICATION_ORDER_CANCELLED, RK_ORDER_CANCELLED),
    (QUEUE_ORDER_COMPENSATION_CANCELLED, RK_ORDER_CANCELLED),
];

/// Declare exchanges, queues and bindings. Safe to run on every startup:
/// every declaration uses the exact same attributes.
pub async fn declare_topology(
    channel: &Channel,
    rabbitmq_config: &RabbitMqConfig,
) -> Result<(), CoreError> {
    let durable = ExchangeDeclareOptions {
        durable: true,
        ..ExchangeDeclareOptions::default()
    };
    channel
        .exchange_declare(
            rabbitmq_config.exchange_name(),
            ExchangeKind::Topic,
            durable,
            FieldTable::default(),
        )
        .await
        .map_err(to_topology_error)?;
    channel
        .exchange_declare(
            rabbitmq_config.dlx_exchange_name(),
            ExchangeKind::Fanout,
            durable,
            FieldTable::default(),
        )
        .await
        .map_err(to_topology_error)?;
    let durable_queue = QueueDeclareOptions {
        durable: true,
        ..QueueDeclareOptions::default()
    };
    channel
        .queue_declare(
            rabbitmq_config.dlx_queue_name(),
            durable_queue,
            FieldTable::default(),
        )
        .await
        .map_err(to_topology_error)?;
    channel
        .queue_bind(
            rabbitmq_config.dlx_queue_name(),
            rabbitmq_config.dlx_exchange_name(),
            "",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(to_topology_error)?;
    for (queue_name, routing_key) in QUEUE_BINDINGS {
        let mut arguments = FieldTable::default();
        arguments.insert(
            "x-dead-letter-exchange".into(),
            AMQPValue::LongString(rabbitmq_config.dlx_exchange_name().into()),
        );
        if let Some(queue_max_length) = rabbitmq_config.queue_max_length() {
            arguments.insert(
                "x-max-length".into(),
                AMQPValue::LongInt(i32::try_from(queue_max_length).unwrap_or(i32::MAX)),
            );
        }
        if let Some(message_ttl_millis) = rabbitmq_config.message_ttl_millis() {
            arguments.insert(
                "x-message-ttl".into(),
                AMQPValue::LongInt(i32::try_from(message_ttl_millis).unwrap_or(i32::MAX)),
            );
        }
        channel
            .queue_declare(queue_name, durable_queue, arguments)
            .await
            .map_err(to_topology_error)?;
        channel
            .queue_bind(
                queue_name,
                rabbitmq_config.exchange_name(),
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(to_topology_error)?;
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("Declared queue '{queue_name}' bound to '{routing_key}'.");
        }
    }
    Ok(())
}

fn to_topology_error(e: lapin::Error) -> CoreError {
    CoreErrorKind::Messaging.error_with_msg(format!("Failed to declare broker topology: {e}"))
}
