pub mod amqp;
pub mod bridge;
mod gate;
pub mod interface;
pub mod mqtt;
pub mod rest;

pub use amqp::AmqpProducer;
pub use bridge::{derive_rest_proxy_url, HttpBridgeProducer};
pub use interface::{BrokerType, Producer, ProducerConfig};
pub use mqtt::MqttProducer;
pub use rest::{RestResponse, RestSender};

use crate::error::Result;
use async_trait::async_trait;

/// Every producer the simulator knows how to build.
pub enum BrokerProducer {
    Mqtt(MqttProducer),
    Amqp(AmqpProducer),
    Kafka(HttpBridgeProducer),
}

#[async_trait]
impl Producer for BrokerProducer {
    async fn connect(&self) -> Result<()> {
        match self {
            BrokerProducer::Mqtt(p) => p.connect().await,
            BrokerProducer::Amqp(p) => p.connect().await,
            BrokerProducer::Kafka(p) => p.connect().await,
        }
    }

    async fn disconnect(&self) {
        match self {
            BrokerProducer::Mqtt(p) => p.disconnect().await,
            BrokerProducer::Amqp(p) => p.disconnect().await,
            BrokerProducer::Kafka(p) => p.disconnect().await,
        }
    }

    async fn send(&self, destination: &str, message: &str) -> Result<()> {
        match self {
            BrokerProducer::Mqtt(p) => p.send(destination, message).await,
            BrokerProducer::Amqp(p) => p.send(destination, message).await,
            BrokerProducer::Kafka(p) => p.send(destination, message).await,
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            BrokerProducer::Mqtt(p) => p.is_connected(),
            BrokerProducer::Amqp(p) => p.is_connected(),
            BrokerProducer::Kafka(p) => p.is_connected(),
        }
    }

    fn broker_type(&self) -> BrokerType {
        match self {
            BrokerProducer::Mqtt(_) => BrokerType::Mqtt,
            BrokerProducer::Amqp(_) => BrokerType::Amqp,
            BrokerProducer::Kafka(_) => BrokerType::Kafka,
        }
    }
}

pub trait ProducerFactory: Send + Sync {
    /// Builds a fresh producer. Configuration problems are reported here,
    /// before any network I/O.
    fn create(&self, broker_type: BrokerType, config: ProducerConfig) -> Result<Box<dyn Producer>>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultProducerFactory;

impl DefaultProducerFactory {
    pub fn build(&self, broker_type: BrokerType, config: ProducerConfig) -> Result<BrokerProducer> {
        Ok(match broker_type {
            BrokerType::Mqtt => BrokerProducer::Mqtt(MqttProducer::new(config)?),
            BrokerType::Amqp => BrokerProducer::Amqp(AmqpProducer::new(config)?),
            BrokerType::Kafka => BrokerProducer::Kafka(HttpBridgeProducer::new(config)?),
        })
    }
}

impl ProducerFactory for DefaultProducerFactory {
    fn create(&self, broker_type: BrokerType, config: ProducerConfig) -> Result<Box<dyn Producer>> {
        Ok(Box::new(self.build(broker_type, config)?))
    }
}
