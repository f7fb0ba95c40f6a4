//! Counting, fault-injecting broker for unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use cdc_api::{BoxFuture, Broker, BrokerError, BrokerTopic, Message, PendingPublish};

/// Current and highest number of concurrent operations.
#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct MockState {
    existing: Mutex<HashSet<String>>,
    exists_calls: AtomicUsize,
    create_calls: AtomicUsize,
    failing_lookups: AtomicUsize,
    already_exists_on_create: AtomicBool,
    lookup_delay: Mutex<Duration>,
    publish_delay: Mutex<Duration>,
    failing_payloads: Mutex<HashSet<Bytes>>,
    published: Mutex<Vec<(String, Message)>>,
    lookups: Gauge,
    pending_acks: Gauge,
}

pub(crate) struct MockBroker {
    state: Arc<MockState>,
}

struct MockTopic {
    name: String,
    state: Arc<MockState>,
}

impl MockBroker {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(MockState::default()),
        })
    }

    pub(crate) fn add_existing(&self, name: &str) {
        self.state.existing.lock().unwrap().insert(name.to_string());
    }

    pub(crate) fn fail_next_lookups(&self, n: usize) {
        self.state.failing_lookups.store(n, Ordering::SeqCst);
    }

    pub(crate) fn report_already_exists_on_create(&self) {
        self.state.already_exists_on_create.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_lookup_delay(&self, delay: Duration) {
        *self.state.lookup_delay.lock().unwrap() = delay;
    }

    pub(crate) fn set_publish_delay(&self, delay: Duration) {
        *self.state.publish_delay.lock().unwrap() = delay;
    }

    pub(crate) fn fail_payload(&self, payload: &'static str) {
        self.state
            .failing_payloads
            .lock()
            .unwrap()
            .insert(Bytes::from_static(payload.as_bytes()));
    }

    pub(crate) fn exists_calls(&self) -> usize {
        self.state.exists_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.state.create_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn published(&self) -> Vec<(String, Message)> {
        self.state.published.lock().unwrap().clone()
    }

    /// Most existence checks ever running at the same time.
    pub(crate) fn peak_concurrent_lookups(&self) -> usize {
        self.state.lookups.peak()
    }

    /// Most delayed acknowledgements ever outstanding at the same time.
    pub(crate) fn peak_pending_acks(&self) -> usize {
        self.state.pending_acks.peak()
    }
}

impl Broker for MockBroker {
    fn topic(&self, name: &str) -> Arc<dyn BrokerTopic> {
        Arc::new(MockTopic {
            name: name.to_string(),
            state: self.state.clone(),
        })
    }

    fn topic_exists(&self, name: &str) -> BoxFuture<'_, Result<bool, BrokerError>> {
        let name = name.to_string();
        Box::pin(async move {
            self.state.exists_calls.fetch_add(1, Ordering::SeqCst);
            let delay = *self.state.lookup_delay.lock().unwrap();
            if !delay.is_zero() {
                self.state.lookups.enter();
                tokio::time::sleep(delay).await;
                self.state.lookups.exit();
            }
            let failing = self.state.failing_lookups.load(Ordering::SeqCst);
            if failing > 0 {
                self.state.failing_lookups.store(failing - 1, Ordering::SeqCst);
                return Err(BrokerError::unavailable("broker unreachable"));
            }
            Ok(self.state.existing.lock().unwrap().contains(&name))
        })
    }

    fn create_topic(&self, name: &str) -> BoxFuture<'_, Result<Arc<dyn BrokerTopic>, BrokerError>> {
        let name = name.to_string();
        Box::pin(async move {
            self.state.create_calls.fetch_add(1, Ordering::SeqCst);
            if self.state.already_exists_on_create.load(Ordering::SeqCst) {
                return Err(BrokerError::already_exists(format!("topic '{name}'")));
            }
            self.state.existing.lock().unwrap().insert(name.clone());
            Ok(self.topic(&name))
        })
    }
}

impl BrokerTopic for MockTopic {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, message: Message) -> PendingPublish {
        let fails = self.state.failing_payloads.lock().unwrap().contains(&message.data);
        let id = {
            let mut published = self.state.published.lock().unwrap();
            published.push((self.name.clone(), message));
            published.len().to_string()
        };
        let result = if fails {
            Err(BrokerError::invalid_argument(format!("message {id} rejected")))
        } else {
            Ok(id)
        };

        let delay = *self.state.publish_delay.lock().unwrap();
        if delay.is_zero() {
            return PendingPublish::ready(result);
        }
        let (completer, pending) = PendingPublish::channel();
        let state = self.state.clone();
        state.pending_acks.enter();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.pending_acks.exit();
            completer.complete(result);
        });
        pending
    }
}
