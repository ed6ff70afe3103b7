//! In-process message broker with AMQP exchange semantics.
//!
//! Exchanges route JSON payloads to queues through bindings: `direct` on an
//! exact key, `topic` on dotted patterns (`*` one word, `#` zero or more),
//! `fanout` to every bound queue. Each queue is an unbounded channel drained
//! by one consumer task.

use std::collections::HashMap;
use std::sync::Mutex;

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;

use crate::models::BrokerMessage;

pub const DIRECT_EXCHANGE: &str = "exchange.direct.default";
pub const TOPIC_EXCHANGE: &str = "exchange.topic.default";
pub const PUBSUB_EXCHANGE: &str = "exchange.pubsub.default";

pub const SIMPLE_QUEUE: &str = "queue.simple.default";
pub const WORK_QUEUE: &str = "queue.work.default";
pub const TOPIC_QUEUE_1: &str = "queue.topic.default.1";
pub const TOPIC_QUEUE_2: &str = "queue.topic.default.2";
pub const PUBSUB_QUEUE_1: &str = "queue.pubsub.default.1";
pub const PUBSUB_QUEUE_2: &str = "queue.pubsub.default.2";

#[derive(Debug, Error)]
pub enum MqError {
    #[error("no exchange named '{0}'")]
    UnknownExchange(String),
    #[error("binding references unknown queue '{0}'")]
    UnknownQueue(String),
    #[error("queue '{0}' has no consumer left")]
    Closed(String),
    #[error("message encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Direct,
    Topic,
    Fanout,
}

#[derive(Debug, Clone)]
pub struct Exchange {
    pub name: String,
    pub kind: ExchangeKind,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub exchange: String,
    pub queue: String,
    pub routing_key: String,
}

#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub exchanges: Vec<Exchange>,
    pub queues: Vec<String>,
    pub bindings: Vec<Binding>,
}

impl Topology {
    pub fn exchange(mut self, name: &str, kind: ExchangeKind) -> Self {
        self.exchanges.push(Exchange {
            name: name.to_string(),
            kind,
        });
        self
    }

    pub fn queue(mut self, name: &str) -> Self {
        self.queues.push(name.to_string());
        self
    }

    pub fn bind(mut self, queue: &str, exchange: &str, routing_key: &str) -> Self {
        self.bindings.push(Binding {
            exchange: exchange.to_string(),
            queue: queue.to_string(),
            routing_key: routing_key.to_string(),
        });
        self
    }

    /// The service's exchanges, queues and bindings.
    pub fn service_default() -> Self {
        Topology::default()
            .exchange(DIRECT_EXCHANGE, ExchangeKind::Direct)
            .exchange(TOPIC_EXCHANGE, ExchangeKind::Topic)
            .exchange(PUBSUB_EXCHANGE, ExchangeKind::Fanout)
            .queue(SIMPLE_QUEUE)
            .queue(WORK_QUEUE)
            .queue(TOPIC_QUEUE_1)
            .queue(TOPIC_QUEUE_2)
            .queue(PUBSUB_QUEUE_1)
            .queue(PUBSUB_QUEUE_2)
            .bind(SIMPLE_QUEUE, DIRECT_EXCHANGE, "baz.simple")
            .bind(WORK_QUEUE, DIRECT_EXCHANGE, "baz.work")
            .bind(TOPIC_QUEUE_1, TOPIC_EXCHANGE, "*.bar.*")
            .bind(TOPIC_QUEUE_2, TOPIC_EXCHANGE, "foo.#")
            .bind(PUBSUB_QUEUE_1, PUBSUB_EXCHANGE, "")
            .bind(PUBSUB_QUEUE_2, PUBSUB_EXCHANGE, "")
    }

    /// Queues a message published to `exchange` with `routing_key` reaches,
    /// each at most once, in binding order.
    pub fn route(&self, exchange: &str, routing_key: &str) -> Result<Vec<&str>, MqError> {
        let kind = self
            .exchanges
            .iter()
            .find(|e| e.name == exchange)
            .map(|e| e.kind)
            .ok_or_else(|| MqError::UnknownExchange(exchange.to_string()))?;
        let mut queues: Vec<&str> = Vec::new();
        for b in self.bindings.iter().filter(|b| b.exchange == exchange) {
            let hit = match kind {
                ExchangeKind::Direct => b.routing_key == routing_key,
                ExchangeKind::Topic => topic_matches(&b.routing_key, routing_key),
                ExchangeKind::Fanout => true,
            };
            if hit && !queues.contains(&b.queue.as_str()) {
                queues.push(&b.queue);
            }
        }
        Ok(queues)
    }
}

/// AMQP topic matching over dot-separated words.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = if routing_key.is_empty() {
        Vec::new()
    } else {
        routing_key.split('.').collect()
    };
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((&k, key_rest)) => (word == "*" || word == k) && match_words(rest, key_rest),
            None => false,
        },
    }
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub exchange: String,
    pub routing_key: String,
    pub payload: String,
}

pub struct Broker {
    topology: Topology,
    senders: HashMap<String, UnboundedSender<Delivery>>,
    receivers: Mutex<HashMap<String, UnboundedReceiver<Delivery>>>,
}

impl Broker {
    pub fn new(topology: Topology) -> Result<Self, MqError> {
        if let Some(b) = topology
            .bindings
            .iter()
            .find(|b| !topology.queues.contains(&b.queue))
        {
            return Err(MqError::UnknownQueue(b.queue.clone()));
        }
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for queue in &topology.queues {
            let (tx, rx) = unbounded_channel();
            senders.insert(queue.clone(), tx);
            receivers.insert(queue.clone(), rx);
        }
        Ok(Self {
            topology,
            senders,
            receivers: Mutex::new(receivers),
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// JSON-encodes `message` and delivers it; returns how many queues it reached.
    /// A message no binding matches is dropped.
    pub fn publish<T: Serialize>(
        &self,
        exchange: &str,
        routing_key: &str,
        message: &T,
    ) -> Result<usize, MqError> {
        let payload = serde_json::to_string(message)?;
        let queues = self.topology.route(exchange, routing_key)?;
        if queues.is_empty() {
            warn!("message to {exchange} with key '{routing_key}' matched no queue");
        }
        for queue in &queues {
            let tx = self
                .senders
                .get(*queue)
                .ok_or_else(|| MqError::UnknownQueue(queue.to_string()))?;
            tx.send(Delivery {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                payload: payload.clone(),
            })
            .map_err(|_| MqError::Closed(queue.to_string()))?;
        }
        Ok(queues.len())
    }

    /// Hands out the receiving end of `queue`; only the first caller gets it.
    pub fn take_receiver(&self, queue: &str) -> Option<UnboundedReceiver<Delivery>> {
        self.receivers.lock().ok()?.remove(queue)
    }

    /// Spawns one logging consumer per queue not yet claimed.
    pub fn spawn_consumers(&self) -> Vec<JoinHandle<()>> {
        let queues = self.topology.queues.clone();
        queues
            .into_iter()
            .filter_map(|queue| {
                let rx = self.take_receiver(&queue)?;
                Some(tokio::spawn(consume(queue, rx)))
            })
            .collect()
    }
}

async fn consume(queue: String, mut rx: UnboundedReceiver<Delivery>) {
    while let Some(delivery) = rx.recv().await {
        match serde_json::from_str::<BrokerMessage>(&delivery.payload) {
            Ok(message) => info!("Received amqp message {message:?} on {queue}"),
            Err(e) => warn!(
                "undecodable message on {queue} from {}: {e}",
                delivery.exchange
            ),
        }
    }
    info!("consumer of {queue} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> BrokerMessage {
        BrokerMessage {
            id: Some(1),
            name: Some("mq".into()),
        }
    }

    fn drained(broker: &Broker, queue: &str) -> Vec<Delivery> {
        let mut rx = broker.take_receiver(queue).unwrap();
        let mut out = Vec::new();
        while let Ok(d) = rx.try_recv() {
            out.push(d);
        }
        out
    }

    #[test]
    fn topic_wildcards() {
        assert!(topic_matches("*.bar.*", "qox.bar.xyz"));
        assert!(!topic_matches("*.bar.*", "bar.xyz"));
        assert!(!topic_matches("*.bar.*", "a.bar.b.c"));
        assert!(topic_matches("foo.#", "foo"));
        assert!(topic_matches("foo.#", "foo.baz"));
        assert!(topic_matches("foo.#", "foo.a.b.c"));
        assert!(!topic_matches("foo.#", "qux.foo"));
        assert!(topic_matches("#", ""));
        assert!(topic_matches("#.end", "a.b.end"));
    }

    #[test]
    fn topic_exchange_routes_by_pattern() {
        let topology = Topology::service_default();
        assert_eq!(
            topology.route(TOPIC_EXCHANGE, "qox.bar.xyz").unwrap(),
            vec![TOPIC_QUEUE_1]
        );
        assert_eq!(
            topology.route(TOPIC_EXCHANGE, "foo.baz").unwrap(),
            vec![TOPIC_QUEUE_2]
        );
        assert_eq!(
            topology.route(TOPIC_EXCHANGE, "foo.bar.baz").unwrap(),
            vec![TOPIC_QUEUE_1, TOPIC_QUEUE_2]
        );
    }

    #[test]
    fn direct_exchange_needs_exact_key() {
        let topology = Topology::service_default();
        assert_eq!(
            topology.route(DIRECT_EXCHANGE, "baz.simple").unwrap(),
            vec![SIMPLE_QUEUE]
        );
        assert!(topology.route(DIRECT_EXCHANGE, "baz.other").unwrap().is_empty());
        assert!(matches!(
            topology.route("exchange.none", "x"),
            Err(MqError::UnknownExchange(_))
        ));
    }

    #[test]
    fn fanout_reaches_every_bound_queue() {
        let broker = Broker::new(Topology::service_default()).unwrap();
        assert_eq!(broker.publish(PUBSUB_EXCHANGE, "", &message()).unwrap(), 2);
        assert_eq!(drained(&broker, PUBSUB_QUEUE_1).len(), 1);
        assert_eq!(drained(&broker, PUBSUB_QUEUE_2).len(), 1);
        assert!(drained(&broker, SIMPLE_QUEUE).is_empty());
    }

    #[test]
    fn delivers_json_payload() {
        let broker = Broker::new(Topology::service_default()).unwrap();
        assert_eq!(broker.publish(DIRECT_EXCHANGE, "baz.work", &message()).unwrap(), 1);
        assert_eq!(broker.publish(DIRECT_EXCHANGE, "nowhere", &message()).unwrap(), 0);
        let got = drained(&broker, WORK_QUEUE);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].routing_key, "baz.work");
        let decoded: BrokerMessage = serde_json::from_str(&got[0].payload).unwrap();
        assert_eq!(decoded, message());
    }

    #[test]
    fn receivers_are_handed_out_once() {
        let broker = Broker::new(Topology::service_default()).unwrap();
        assert!(broker.take_receiver(SIMPLE_QUEUE).is_some());
        assert!(broker.take_receiver(SIMPLE_QUEUE).is_none());
    }

    #[test]
    fn rejects_binding_to_undeclared_queue() {
        let topology = Topology::default()
            .exchange("x", ExchangeKind::Direct)
            .bind("missing", "x", "k");
        assert!(matches!(Broker::new(topology), Err(MqError::UnknownQueue(_))));
    }
}
