use std::sync::Arc;

use bytes::Bytes;
use futures_util::Stream;

use cdc_api::{Attributes, Message, PendingPublish};

use crate::error::EngineError;
use crate::framing::LineStream;
use crate::router::Route;
use crate::topic::TopicRegistry;

/// Counters for one successfully published request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishSummary {
    pub records: usize,
}

/// Turns request bodies into broker messages, one per line.
pub struct Publisher {
    registry: Arc<TopicRegistry>,
    topic_prefix: String,
    max_line_bytes: usize,
}

impl Publisher {
    pub fn new(registry: Arc<TopicRegistry>, topic_prefix: impl Into<String>, max_line_bytes: usize) -> Self {
        Self {
            registry,
            topic_prefix: topic_prefix.into(),
            max_line_bytes,
        }
    }

    /// Broker topic name for a topic taken from a request path.
    pub fn topic_name(&self, topic: &str) -> String {
        format!("{}{topic}", self.topic_prefix)
    }

    /// Publish every line of `body` to the route's topic, empty lines included.
    ///
    /// Lines are submitted without waiting for earlier acknowledgements; the
    /// call returns only after every submitted line has an outcome. A failed
    /// topic resolution stops the request at once. Failed lines do not stop
    /// later lines; the last failure observed is returned.
    pub async fn publish<S, E>(&self, route: &Route, path: &str, body: S) -> Result<PublishSummary, EngineError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: std::fmt::Display,
    {
        let topic_name = self.topic_name(&route.topic);
        let attributes = Arc::new(Attributes::from([
            ("path".to_string(), path.to_string()),
            ("table".to_string(), route.table.clone()),
        ]));

        let mut lines = LineStream::new(body, self.max_line_bytes);
        let mut pending: Vec<PendingPublish> = Vec::new();
        let mut failure = None;

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(topic = %topic_name, table = %route.table, error = %e, "stopped reading body");
                    failure = Some(e);
                    break;
                }
            };
            let topic = self.registry.resolve(&topic_name).await?;
            pending.push(topic.publish(Message::new(line, attributes.clone())));
        }

        let submitted = pending.len();
        let mut published = 0;
        for (record, outcome) in pending.into_iter().enumerate() {
            match outcome.get().await {
                Ok(id) => {
                    published += 1;
                    tracing::debug!(topic = %topic_name, table = %route.table, %id, "published");
                }
                Err(source) => {
                    tracing::warn!(
                        topic = %topic_name,
                        table = %route.table,
                        record,
                        error = %source,
                        "failed to publish"
                    );
                    failure = Some(EngineError::Publish {
                        topic: topic_name.clone(),
                        source,
                    });
                }
            }
        }

        match failure {
            Some(e) => {
                tracing::debug!(topic = %topic_name, submitted, published, "request failed");
                Err(e)
            }
            None => Ok(PublishSummary { records: published }),
        }
    }
}
