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

//! Composition root of the orchestrator process.

use super::SagaOrchestrator;
use crate::CoreError;
use crate::conf::AppConfig;
use crate::mb::AmqpEventPublisher;
use crate::mb::EventPublisher;
use crate::mb::MessageBus;
use crate::mb::QUEUE_ORCHESTRATOR_ORDER_PLACED;
use crate::mb::QUEUE_ORCHESTRATOR_STOCK_FAILED;
use crate::mb::QUEUE_ORCHESTRATOR_STOCK_RESERVED;
use crate::mb::consume_queue;
use crate::registry::ConsulClient;
use ordercast_events::OrderPlacedEvent;
use ordercast_events::StockReservationFailedEvent;
use ordercast_events::StockReservedCompletedEvent;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use tokio::sync::watch;

/** Saga orchestrator service.

Owns the broker connection, the registry registration and the three consumer
loops that drive the [SagaOrchestrator]. Consumers run with `prefetch = 1`,
so events for one `order_id` arriving on the same queue are handled strictly
in order within this instance; ordering across queues is covered by the
snapshot consume token instead.
*/
pub struct SagaService {
    health_ready: AtomicBool,
    consumer_failed: Arc<AtomicBool>,
    bus: Arc<MessageBus>,
    consul: Arc<ConsulClient>,
    orchestrator: Arc<SagaOrchestrator>,
    shutdown: watch::Sender<bool>,
}

impl SagaService {
    /// Return a new instance with consumers running.
    pub async fn new(app_config: &Arc<AppConfig>) -> Result<Arc<Self>, CoreError> {
        let bus = MessageBus::connect(&app_config.rabbitmq).await?;
        let publisher = AmqpEventPublisher::new(&bus) as Arc<dyn EventPublisher>;
        let orchestrator =
            SagaOrchestrator::new(&publisher, app_config.saga.snapshot_ttl_secs());
        let consul = ConsulClient::new(app_config);
        // The registry is best effort: resolution degrades gracefully, so a
        // missing registry must not take the orchestrator down with it.
        if let Err(e) = consul
            .register_self(&app_config.consul, app_config.api.bind_port())
            .await
        {
            log::warn!("Proceeding without registry registration: {e}");
        }
        let (shutdown, _) = watch::channel(false);
        let ret = Arc::new(Self {
            health_ready: AtomicBool::new(false),
            consumer_failed: Arc::new(AtomicBool::new(false)),
            bus,
            consul,
            orchestrator,
            shutdown,
        });
        ret.spawn_consumers();
        ret.health_ready.store(true, Ordering::Relaxed);
        log::info!("Saga orchestrator is ready.");
        Ok(ret)
    }

    /// Start one consumer task per orchestrator queue.
    fn spawn_consumers(self: &Arc<Self>) {
        {
            let orchestrator = Arc::clone(&self.orchestrator);
            self.spawn_consumer(QUEUE_ORCHESTRATOR_ORDER_PLACED, move |event, _| {
                let orchestrator = Arc::clone(&orchestrator);
                async move {
                    orchestrator
                        .on_order_placed(event)
                        .await
                        .map(|_outcome| ())
                }
            });
        }
        {
            let orchestrator = Arc::clone(&self.orchestrator);
            self.spawn_consumer(QUEUE_ORCHESTRATOR_STOCK_RESERVED, move |event, _| {
                let orchestrator = Arc::clone(&orchestrator);
                async move {
                    orchestrator
                        .on_stock_reserved(event)
                        .await
                        .map(|_outcome| ())
                }
            });
        }
        {
            let orchestrator = Arc::clone(&self.orchestrator);
            self.spawn_consumer(QUEUE_ORCHESTRATOR_STOCK_FAILED, move |event, _| {
                let orchestrator = Arc::clone(&orchestrator);
                async move {
                    orchestrator
                        .on_stock_failed(event)
                        .await
                        .map(|_outcome| ())
                }
            });
        }
    }

    fn spawn_consumer<T, H, Fut>(self: &Arc<Self>, queue_name: &'static str, handler: H)
    where
        T: serde::de::DeserializeOwned + Send + 'static,
        H: Fn(T, Option<ordercast_events::CorrelationId>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        let bus = Arc::clone(&self.bus);
        let shutdown = self.shutdown.subscribe();
        let consumer_failed = Arc::clone(&self.consumer_failed);
        tokio::spawn(async move {
            if let Err(e) = consume_queue::<T, _, _>(&bus, queue_name, shutdown, handler).await {
                log::error!("Consumer on '{queue_name}' terminated: {e}");
                // Raising the liveness probe gets the instance restarted.
                consumer_failed.store(true, Ordering::Relaxed);
            }
        });
    }

    /// Return `true` if the app has started.
    pub fn is_health_started(&self) -> bool {
        self.health_ready.load(Ordering::Relaxed)
    }

    /// Return `true` if the app is ready to process events.
    pub fn is_health_ready(&self) -> bool {
        self.health_ready.load(Ordering::Relaxed) && self.is_health_live()
    }

    /// Return `true` if the app is functioning as expected and `false` if it
    /// needs to be restarted.
    pub fn is_health_live(&self) -> bool {
        !self.consumer_failed.load(Ordering::Relaxed)
    }

    /// Saga orchestrator, exposed for tests and diagnostics.
    pub fn orchestrator(&self) -> &Arc<SagaOrchestrator> {
        &self.orchestrator
    }

    /// Invoked on graceful shutdowns to allow for some pre-emptive clean-up.
    ///
    /// Consumers stop pulling new deliveries, the registry entry is removed
    /// and the broker connection is closed.
    pub async fn exit_hook(&self) {
        let _ = self.shutdown.send(true);
        self.consul.deregister_self().await;
        self.bus.close().await;
    }
}
