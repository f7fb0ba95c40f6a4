use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

/// String attributes carried next to the payload (`path`, `table`, ...).
pub type Attributes = BTreeMap<String, String>;

/// Opaque identifier the broker assigns to an accepted message.
pub type MessageId = String;

/// One record on its way to a broker topic.
///
/// `data` is opaque; the bridge never interprets it. Attributes are
/// shared by every message cut from the same request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub data: Bytes,
    pub attributes: Arc<Attributes>,
}

impl Message {
    pub fn new(data: impl Into<Bytes>, attributes: Arc<Attributes>) -> Self {
        Self {
            data: data.into(),
            attributes,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}
