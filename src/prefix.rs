//! Pluggable prefix resolution.
//!
//! The dispatcher asks its [`PrefixResolver`] for the set of prefixes
//! valid for a given message. Returning `None` (or an empty set) is a
//! fatal configuration condition for that message only: it is logged and
//! the message is dropped.

use crate::transport::MessageEvent;
use async_trait::async_trait;

/// Strategy producing the valid command prefixes for a message.
#[async_trait]
pub trait PrefixResolver: Send + Sync {
    async fn resolve(&self, msg: &MessageEvent) -> Option<Vec<String>>;
}

/// Fixed prefix set, independent of the message.
pub struct StaticPrefixes(Vec<String>);

impl StaticPrefixes {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(prefixes.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl PrefixResolver for StaticPrefixes {
    async fn resolve(&self, _msg: &MessageEvent) -> Option<Vec<String>> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.clone())
        }
    }
}
