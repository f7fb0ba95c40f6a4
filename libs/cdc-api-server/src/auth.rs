use std::collections::HashSet;

/// Pre-shared values accepted in the `sharedKey` query parameter.
///
/// An empty set disables the check.
#[derive(Debug, Default, Clone)]
pub struct SharedKeys {
    keys: HashSet<String>,
}

impl SharedKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).filter(|k: &String| !k.is_empty()).collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.keys.is_empty()
    }

    pub fn accepts(&self, candidate: Option<&str>) -> bool {
        match candidate {
            Some(key) if !key.is_empty() => self.keys.contains(key),
            _ => false,
        }
    }
}
