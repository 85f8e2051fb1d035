//! Priority-ordered extension-handler registries.
//!
//! Two hook families extend the dispatcher: after-event handlers, run
//! once the primary handling of a named transport event completes, and
//! extra message parsers, run only when no command matched a message.
//! Both are ordered by ascending priority with a stable positional
//! insert, so ties preserve registration order.

use crate::dispatch::Dispatcher;
use crate::transport::{Event, MessageEvent};
use async_trait::async_trait;
use std::sync::Arc;

/// Handler scheduled after the primary handling of a transport event.
#[async_trait]
pub trait AfterEventHook: Send + Sync {
    async fn call(&self, client: Arc<Dispatcher>, event: Arc<Event>) -> anyhow::Result<()>;
}

/// Parser consulted when a message matched no prefix or command.
#[async_trait]
pub trait MessageParser: Send + Sync {
    async fn parse(&self, client: Arc<Dispatcher>, msg: Arc<MessageEvent>) -> anyhow::Result<()>;
}

/// Registry keeping entries sorted by ascending priority, stable on ties.
pub(crate) struct PriorityRegistry<T: ?Sized> {
    entries: Vec<(i64, Arc<T>)>,
}

impl<T: ?Sized> PriorityRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, priority: i64, entry: Arc<T>) {
        let at = self.entries.partition_point(|(p, _)| *p <= priority);
        self.entries.insert(at, (priority, entry));
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &Arc<T>)> {
        self.entries.iter().map(|(p, e)| (*p, e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
