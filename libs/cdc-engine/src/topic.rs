use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use cdc_api::{Broker, BrokerError, BrokerTopic, ErrorKind};

use crate::error::EngineError;

/// Slot for one topic name: empty until the broker topic is resolved.
///
/// The slot's own lock serialises resolution of this name only.
#[derive(Default)]
struct TopicEntry {
    topic: Mutex<Option<Arc<dyn BrokerTopic>>>,
}

/// Registry of resolved broker topics.
///
/// Entries are created on first reference and live as long as the process.
/// Each name is looked up or created on the broker at most once at a time;
/// failed resolutions leave the entry empty so the next caller retries.
pub struct TopicRegistry {
    broker: Arc<dyn Broker>,
    topics: RwLock<HashMap<String, Arc<TopicEntry>>>,
}

impl std::fmt::Debug for TopicRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRegistry")
            .field("topics", &self.topic_names())
            .finish()
    }
}

impl TopicRegistry {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a topic name to a live broker handle, looking it up or
    /// creating it on the broker on first use.
    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn BrokerTopic>, EngineError> {
        let entry = self.entry(name);

        let mut slot = entry.topic.lock().await;
        if let Some(topic) = slot.as_ref() {
            return Ok(topic.clone());
        }

        let topic = self
            .lookup_or_create(name)
            .await
            .map_err(|source| EngineError::TopicResolution {
                topic: name.to_string(),
                source,
            })?;
        *slot = Some(topic.clone());
        Ok(topic)
    }

    /// Names referenced so far, resolved or not.
    pub fn topic_names(&self) -> Vec<String> {
        let guard = match self.topics.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("topic registry read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.keys().cloned().collect()
    }

    /// Number of names referenced so far.
    pub fn len(&self) -> usize {
        match self.topics.read() {
            Ok(g) => g.len(),
            Err(poisoned) => {
                tracing::warn!("topic registry read lock was poisoned, recovering");
                poisoned.into_inner().len()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get or insert the entry for `name`. The registry-wide lock is released
    /// before returning.
    fn entry(&self, name: &str) -> Arc<TopicEntry> {
        {
            let guard = match self.topics.read() {
                Ok(g) => g,
                Err(poisoned) => {
                    tracing::warn!("topic registry read lock was poisoned, recovering");
                    poisoned.into_inner()
                }
            };
            if let Some(entry) = guard.get(name) {
                return entry.clone();
            }
        }

        let mut guard = match self.topics.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("topic registry write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.entry(name.to_string()).or_default().clone()
    }

    async fn lookup_or_create(&self, name: &str) -> Result<Arc<dyn BrokerTopic>, BrokerError> {
        let exists = self
            .broker
            .topic_exists(name)
            .await
            .map_err(|e| e.with_context("could not check existence"))?;
        if exists {
            tracing::info!(topic = %name, "using existing topic");
            return Ok(self.broker.topic(name));
        }

        match self.broker.create_topic(name).await {
            Ok(topic) => {
                tracing::info!(topic = %name, "created topic");
                Ok(topic)
            }
            // Another bridge instance won the race.
            Err(e) if e.kind == ErrorKind::AlreadyExists => {
                tracing::info!(topic = %name, "topic appeared concurrently, using it");
                Ok(self.broker.topic(name))
            }
            Err(e) => Err(e.with_context("could not create topic")),
        }
    }
}
