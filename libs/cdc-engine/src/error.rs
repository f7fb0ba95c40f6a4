use cdc_api::BrokerError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("could not resolve topic '{topic}': {source}")]
    TopicResolution { topic: String, source: BrokerError },

    #[error("failed to publish to topic '{topic}': {source}")]
    Publish { topic: String, source: BrokerError },

    #[error("request body: {0}")]
    Body(String),
}

impl EngineError {
    /// Add context to the error.
    ///
    /// For broker-backed variants, context is added to the inner `BrokerError`.
    /// For other variants, context is prepended to the message.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            EngineError::Config(msg) => EngineError::Config(format!("{ctx}: {msg}")),
            EngineError::Body(msg) => EngineError::Body(format!("{ctx}: {msg}")),
            EngineError::TopicResolution { topic, source } => EngineError::TopicResolution {
                topic,
                source: source.with_context(ctx),
            },
            EngineError::Publish { topic, source } => EngineError::Publish {
                topic,
                source: source.with_context(ctx),
            },
        }
    }
}
