use super::{ConnectionSettings, SendResult};
use crate::error::{Result, SimError};
use crate::producer::{
    BrokerType, DefaultProducerFactory, Producer, ProducerConfig, ProducerFactory, RestSender,
};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Routes a serialized payload to the configured destination and folds every
/// outcome into a [`SendResult`].
#[derive(Clone)]
pub struct Orchestrator {
    rest: RestSender,
    factory: Arc<dyn ProducerFactory>,
}

impl Orchestrator {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        Self::with_factory(request_timeout, Arc::new(DefaultProducerFactory))
    }

    pub fn with_factory(request_timeout: Duration, factory: Arc<dyn ProducerFactory>) -> Result<Self> {
        Ok(Self {
            rest: RestSender::new(request_timeout)?,
            factory,
        })
    }

    pub async fn send_device_data(&self, payload: &str, settings: &ConnectionSettings) -> SendResult {
        if let Err(e) = serde_json::from_str::<serde_json::Value>(payload) {
            let e = SimError::from(e);
            warn!("Refusing to send malformed payload: {}", e);
            return SendResult::from_error("Invalid payload", &e);
        }

        debug!("Sending {} bytes via {}", payload.len(), settings.describe());
        match settings {
            ConnectionSettings::Http { connection_string } => {
                self.rest.send(connection_string, payload).await
            }
            ConnectionSettings::Broker {
                broker_type,
                destination,
                ..
            } => match settings.producer_config() {
                Some(config) => {
                    self.send_via_producer(*broker_type, config, destination, payload)
                        .await
                }
                None => SendResult::failure(
                    "Delivery failed",
                    "broker settings without producer configuration",
                    Some(500),
                ),
            },
        }
    }

    async fn send_via_producer(
        &self,
        broker_type: BrokerType,
        config: ProducerConfig,
        destination: &str,
        payload: &str,
    ) -> SendResult {
        let producer: Arc<dyn Producer> = match self.factory.create(broker_type, config) {
            Ok(producer) => Arc::from(producer),
            Err(e) => {
                warn!("Cannot create {} producer: {}", broker_type, e);
                return SendResult::from_error("Invalid broker configuration", &e);
            }
        };

        let worker = producer.clone();
        let target = destination.to_string();
        let message = payload.to_string();
        // Spawned so a panicking producer still gets disconnected below.
        let delivery = tokio::spawn(async move {
            worker.connect().await?;
            worker.send(&target, &message).await
        })
        .await;

        producer.disconnect().await;

        match delivery {
            Ok(Ok(())) => {
                info!("Delivered to {} destination '{}'", broker_type, destination);
                SendResult::ok(
                    format!("Delivered to {} destination '{}'", broker_type, destination),
                    Some(200),
                )
            }
            Ok(Err(e)) => {
                warn!("{} delivery to '{}' failed: {}", broker_type, destination, e);
                SendResult::from_error(format!("Failed to deliver via {}", broker_type), &e)
            }
            Err(join_error) => {
                error!("{} delivery task aborted: {}", broker_type, join_error);
                SendResult::failure(
                    format!("Failed to deliver via {}", broker_type),
                    "delivery task panicked",
                    Some(500),
                )
            }
        }
    }
}
