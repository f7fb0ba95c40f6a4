pub mod bootstrap;
pub mod config;
pub mod drain;
pub mod error;
pub mod framing;
pub mod publisher;
pub mod router;
pub mod topic;

#[cfg(test)]
mod mock_broker;

pub use bootstrap::Bridge;
pub use drain::{DrainCoordinator, InFlightGuard};
pub use error::EngineError;
pub use publisher::{PublishSummary, Publisher};
pub use router::{RESOLVED_TABLE, Route};
pub use topic::TopicRegistry;
