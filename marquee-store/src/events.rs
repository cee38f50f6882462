use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use marquee_core::events::{DomainEvent, EventPublisher};
use marquee_shared::models::events::SeatStatusChangedEvent;

/// In-process fan-out of seat changes to live viewers (SSE).
///
/// Order events are not forwarded; only seat status is projected live.
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<SeatStatusChangedEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SeatStatusChangedEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: DomainEvent) {
        if let DomainEvent::SeatsChanged(change) = event {
            // Err only means nobody is listening
            if self.tx.send(change).is_err() {
                debug!("No seat stream subscribers");
            }
        }
    }
}

/// Forwards every event to each inner publisher in order
pub struct FanoutPublisher {
    publishers: Vec<Arc<dyn EventPublisher>>,
}

impl FanoutPublisher {
    pub fn new(publishers: Vec<Arc<dyn EventPublisher>>) -> Self {
        Self { publishers }
    }
}

#[async_trait]
impl EventPublisher for FanoutPublisher {
    async fn publish(&self, event: DomainEvent) {
        for publisher in &self.publishers {
            publisher.publish(event.clone()).await;
        }
    }
}

#[cfg(feature = "kafka")]
pub use kafka::KafkaPublisher;

#[cfg(feature = "kafka")]
mod kafka {
    use async_trait::async_trait;
    use rdkafka::config::ClientConfig;
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use rdkafka::util::Timeout;
    use std::time::Duration;
    use tracing::{error, info};

    use marquee_core::events::{DomainEvent, EventPublisher};

    #[derive(Clone)]
    pub struct KafkaPublisher {
        producer: FutureProducer,
    }

    impl KafkaPublisher {
        pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", brokers)
                .set("message.timeout.ms", "5000")
                .create()?;

            Ok(Self { producer })
        }
    }

    #[async_trait]
    impl EventPublisher for KafkaPublisher {
        async fn publish(&self, event: DomainEvent) {
            let payload = match serde_json::to_string(&event) {
                Ok(p) => p,
                Err(e) => {
                    error!("Failed to encode event for {}: {}", event.topic(), e);
                    return;
                }
            };
            let topic = event.topic();
            let key = event.key();
            let record = FutureRecord::to(topic).key(&key).payload(&payload);

            match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
                Ok(delivery) => {
                    info!(
                        "Sent event to {}/{}: partition {} offset {}",
                        topic, key, delivery.partition, delivery.offset
                    );
                }
                Err((e, _msg)) => {
                    error!("Failed to send event to {}: {}", topic, e);
                }
            }
        }
    }
}
