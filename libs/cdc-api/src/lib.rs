pub mod broker;
pub mod error;
pub mod message;

pub use broker::{BoxFuture, Broker, BrokerTopic, PendingPublish, PublishCompleter};
pub use error::{BrokerError, ErrorKind};
pub use message::{Attributes, Message, MessageId};
