use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{info, error};
use emporia_shared::models::events::BasketFrozenEvent;

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
    basket_topic: String,
}

impl EventProducer {
    pub fn new(brokers: &str, basket_topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer, basket_topic: basket_topic.to_string() })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!("Sent message to {}/{}: partition {} offset {}", topic, key, delivery.partition, delivery.offset);
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }

    /// Keyed by basket id so events of one basket stay ordered.
    pub async fn publish_basket_frozen(&self, event: &BasketFrozenEvent) -> Result<(), EventError> {
        let payload = serde_json::to_string(event)?;
        self.publish(&self.basket_topic, &event.basket_id.to_string(), &payload).await?;
        Ok(())
    }
}
