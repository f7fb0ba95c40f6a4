use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::BrokerError;
use crate::message::{Message, MessageId};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Message broker capability.
///
/// The bridge only orchestrates topic lifecycle and message flow; transport,
/// authentication, batching and retries are the implementation's business.
pub trait Broker: Send + Sync {
    /// Reference a topic by name without any I/O. Publishing through a
    /// reference to a topic that does not exist fails per message.
    fn topic(&self, name: &str) -> Arc<dyn BrokerTopic>;

    /// Check broker-side existence of a topic.
    fn topic_exists(&self, name: &str) -> BoxFuture<'_, Result<bool, BrokerError>>;

    /// Create a topic and return a handle to it.
    fn create_topic(&self, name: &str) -> BoxFuture<'_, Result<Arc<dyn BrokerTopic>, BrokerError>>;
}

/// Handle to one broker topic.
pub trait BrokerTopic: Send + Sync {
    fn name(&self) -> &str;

    /// Submit a message. Must not wait for the acknowledgement: the outcome
    /// is delivered through the returned [`PendingPublish`].
    fn publish(&self, message: Message) -> PendingPublish;
}

/// Outcome of a submitted publish that may not be known yet.
#[derive(Debug)]
pub struct PendingPublish {
    rx: oneshot::Receiver<Result<MessageId, BrokerError>>,
}

/// Producer side of a [`PendingPublish`], held by the broker until the
/// message is acknowledged or rejected.
#[derive(Debug)]
pub struct PublishCompleter {
    tx: oneshot::Sender<Result<MessageId, BrokerError>>,
}

impl PendingPublish {
    pub fn channel() -> (PublishCompleter, PendingPublish) {
        let (tx, rx) = oneshot::channel();
        (PublishCompleter { tx }, PendingPublish { rx })
    }

    /// An outcome that is already known at submission time.
    pub fn ready(result: Result<MessageId, BrokerError>) -> Self {
        let (completer, pending) = Self::channel();
        completer.complete(result);
        pending
    }

    /// Wait for the broker's verdict.
    ///
    /// A completer dropped without an answer counts as a cancelled publish.
    pub async fn get(self) -> Result<MessageId, BrokerError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(BrokerError::cancelled("publish dropped before acknowledgement")),
        }
    }
}

impl PublishCompleter {
    pub fn complete(self, result: Result<MessageId, BrokerError>) {
        // Receiver gone means the request was abandoned; nothing to report to.
        let _ = self.tx.send(result);
    }
}
