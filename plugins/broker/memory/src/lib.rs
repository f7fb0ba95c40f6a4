use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use cdc_api::{BoxFuture, Broker, BrokerError, BrokerTopic, Message, MessageId, PendingPublish};

// ═══════════════════════════════════════════════════════════════
//  Topic log
// ═══════════════════════════════════════════════════════════════

/// Ring buffer of the most recent messages of one topic.
struct TopicLog {
    records: Mutex<VecDeque<(MessageId, Message)>>,
}

impl TopicLog {
    fn new(max_records: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(max_records.min(65536))),
        }
    }
}

struct Inner {
    topics: RwLock<HashMap<String, Arc<TopicLog>>>,
    max_records: usize,
    dump: bool,
    ack_delay: Duration,
    next_id: AtomicU64,
}

impl Inner {
    fn log(&self, name: &str) -> Option<Arc<TopicLog>> {
        let guard = match self.topics.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("broker topic map read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.get(name).cloned()
    }

    fn append(&self, topic: &str, message: Message) -> Result<MessageId, BrokerError> {
        let log = self
            .log(topic)
            .ok_or_else(|| BrokerError::not_found(format!("topic '{topic}' does not exist")))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();

        if self.dump {
            tracing::info!(
                topic = %topic,
                %id,
                table = message.attribute("table").unwrap_or_default(),
                data = %String::from_utf8_lossy(&message.data),
                "message"
            );
        }

        let mut records = match log.records.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("topic log lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        if records.len() >= self.max_records {
            records.pop_front();
        }
        records.push_back((id.clone(), message));
        Ok(id)
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryBroker
// ═══════════════════════════════════════════════════════════════

/// In-process broker. Topics must be created before publishing, like on a
/// real broker, and keep their last `max_records` messages.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBroker")
            .field("topics", &self.topic_names())
            .field("dump", &self.inner.dump)
            .finish()
    }
}

impl MemoryBroker {
    pub fn new(max_records: usize) -> Self {
        Self::build(max_records, false, Duration::ZERO)
    }

    /// A memory broker that also logs every message it accepts.
    pub fn dump(max_records: usize) -> Self {
        Self::build(max_records, true, Duration::ZERO)
    }

    /// Acknowledge publishes only after `delay`, like a remote broker would.
    pub fn with_ack_delay(self, delay: Duration) -> Self {
        Self::build(self.inner.max_records, self.inner.dump, delay)
    }

    fn build(max_records: usize, dump: bool, ack_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                topics: RwLock::new(HashMap::new()),
                max_records: max_records.max(1),
                dump,
                ack_delay,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn topic_names(&self) -> Vec<String> {
        let guard = match self.inner.topics.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("broker topic map read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let mut names: Vec<String> = guard.keys().cloned().collect();
        names.sort();
        names
    }

    /// Messages currently retained for `topic`, oldest first.
    pub fn messages(&self, topic: &str) -> Vec<(MessageId, Message)> {
        match self.inner.log(topic) {
            Some(log) => {
                let records = match log.records.lock() {
                    Ok(g) => g,
                    Err(poisoned) => {
                        tracing::warn!("topic log lock was poisoned, recovering");
                        poisoned.into_inner()
                    }
                };
                records.iter().cloned().collect()
            }
            None => Vec::new(),
        }
    }
}

impl Broker for MemoryBroker {
    fn topic(&self, name: &str) -> Arc<dyn BrokerTopic> {
        Arc::new(MemoryTopic {
            name: name.to_string(),
            inner: self.inner.clone(),
        })
    }

    fn topic_exists(&self, name: &str) -> BoxFuture<'_, Result<bool, BrokerError>> {
        let exists = self.inner.log(name).is_some();
        Box::pin(async move { Ok(exists) })
    }

    fn create_topic(&self, name: &str) -> BoxFuture<'_, Result<Arc<dyn BrokerTopic>, BrokerError>> {
        let name = name.to_string();
        Box::pin(async move {
            validate_topic_name(&name)?;
            {
                let mut guard = match self.inner.topics.write() {
                    Ok(g) => g,
                    Err(poisoned) => {
                        tracing::warn!("broker topic map write lock was poisoned, recovering");
                        poisoned.into_inner()
                    }
                };
                if guard.contains_key(&name) {
                    return Err(BrokerError::already_exists(format!("topic '{name}' already exists")));
                }
                guard.insert(name.clone(), Arc::new(TopicLog::new(self.inner.max_records)));
            }
            Ok(self.topic(&name))
        })
    }
}

/// Topic naming rules of hosted pub/sub brokers: 3–255 characters, a leading
/// letter, `[A-Za-z0-9-_.~+%]` after that, and no reserved `goog` prefix.
fn validate_topic_name(name: &str) -> Result<(), BrokerError> {
    let valid_len = (3..=255).contains(&name.len());
    let leading_letter = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~' | '+' | '%'));
    if !valid_len || !leading_letter || !valid_chars || name.starts_with("goog") {
        return Err(BrokerError::invalid_argument(format!("invalid topic name '{name}'")));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
//  MemoryTopic
// ═══════════════════════════════════════════════════════════════

struct MemoryTopic {
    name: String,
    inner: Arc<Inner>,
}

impl BrokerTopic for MemoryTopic {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, message: Message) -> PendingPublish {
        let result = self.inner.append(&self.name, message);
        let delay = self.inner.ack_delay;
        if delay.is_zero() {
            return PendingPublish::ready(result);
        }

        let (completer, pending) = PendingPublish::channel();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            completer.complete(result);
        });
        pending
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use cdc_api::ErrorKind;

    use super::*;

    fn message(data: &'static str) -> Message {
        let attributes = BTreeMap::from([("table".to_string(), "items".to_string())]);
        Message::new(data, Arc::new(attributes))
    }

    #[tokio::test]
    async fn create_then_publish() {
        let broker = MemoryBroker::new(10);
        assert!(!broker.topic_exists("orders").await.unwrap());

        let topic = broker.create_topic("orders").await.unwrap();
        assert!(broker.topic_exists("orders").await.unwrap());

        let first = topic.publish(message("a")).get().await.unwrap();
        let second = topic.publish(message("b")).get().await.unwrap();
        assert_ne!(first, second);

        let stored = broker.messages("orders");
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].0, first);
        assert_eq!(stored[1].1.data, "b");
        assert_eq!(stored[1].1.attribute("table"), Some("items"));
    }

    #[tokio::test]
    async fn creating_twice_fails() {
        let broker = MemoryBroker::new(10);
        broker.create_topic("orders").await.unwrap();
        let err = broker.create_topic("orders").await.err().unwrap();
        assert_eq!(err.kind, ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn reference_to_missing_topic_fails_per_message() {
        let broker = MemoryBroker::new(10);
        let err = broker.topic("ghost").publish(message("x")).get().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        broker.create_topic("ghost").await.unwrap();
        broker.topic("ghost").publish(message("x")).get().await.unwrap();
    }

    #[tokio::test]
    async fn keeps_only_the_most_recent_messages() {
        let broker = MemoryBroker::new(2);
        let topic = broker.create_topic("orders").await.unwrap();
        for data in ["a", "b", "c"] {
            topic.publish(message(data)).get().await.unwrap();
        }
        let data: Vec<_> = broker.messages("orders").into_iter().map(|(_, m)| m.data).collect();
        assert_eq!(data, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn rejects_invalid_topic_names() {
        let broker = MemoryBroker::new(10);
        for name in ["ab", "1orders", "goog-orders", "orders/items", "orders items"] {
            let err = broker.create_topic(name).await.err().unwrap();
            assert_eq!(err.kind, ErrorKind::InvalidArgument, "{name}");
        }
        assert!(broker.topic_names().is_empty());
    }

    #[tokio::test]
    async fn delayed_acknowledgement() {
        let broker = MemoryBroker::new(10).with_ack_delay(Duration::from_millis(50));
        let topic = broker.create_topic("orders").await.unwrap();

        let started = tokio::time::Instant::now();
        topic.publish(message("a")).get().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn recovers_from_poisoned_locks() {
        let broker = MemoryBroker::new(10);
        broker.create_topic("orders").await.unwrap();

        let inner = broker.inner.clone();
        let _ = std::thread::spawn(move || {
            let log = inner.log("orders").unwrap();
            let _records = log.records.lock().unwrap();
            let _map = inner.topics.write().unwrap();
            panic!("poison both locks");
        })
        .join();
        assert!(broker.inner.topics.is_poisoned());

        assert!(broker.topic_exists("orders").await.unwrap());
        broker.topic("orders").publish(message("a")).get().await.unwrap();
        broker.create_topic("items").await.unwrap();
        assert_eq!(broker.topic_names(), vec!["items", "orders"]);
        assert_eq!(broker.messages("orders").len(), 1);
    }

    #[tokio::test]
    async fn dump_mode_still_stores() {
        let broker = MemoryBroker::dump(10);
        let topic = broker.create_topic("orders").await.unwrap();
        topic.publish(message("a")).get().await.unwrap();
        assert_eq!(broker.messages("orders").len(), 1);
    }
}
