//! Integration test common infrastructure.
//!
//! Provides a recording mock transport and helpers for building
//! dispatchers and message events.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use cmdispatch::{
    ChannelId, ChatTransport, DispatchConfig, Dispatcher, MessageEvent, MessageId,
    OutgoingMessage, TransportError, UserId,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A message recorded by the mock transport.
#[derive(Debug, Clone)]
pub struct SentRecord {
    pub id: MessageId,
    pub channel: ChannelId,
    pub message: OutgoingMessage,
}

/// In-memory transport recording sends and deletions.
#[derive(Default)]
pub struct MockTransport {
    next_id: AtomicU64,
    sent: Mutex<Vec<SentRecord>>,
    deleted: Mutex<Vec<MessageId>>,
    /// When set, bulk deletion reports unsupported, forcing the
    /// per-message fallback.
    pub fail_bulk: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<SentRecord> {
        self.sent.lock().clone()
    }

    /// Rendered text of every sent message, in send order.
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|record| match &record.message {
                OutgoingMessage::Text(text) => text.clone(),
                OutgoingMessage::Embed { description, .. } => description.clone(),
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send_message(
        &self,
        channel: ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId, TransportError> {
        let id = MessageId(10_000 + self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sent.lock().push(SentRecord {
            id,
            channel,
            message,
        });
        Ok(id)
    }

    async fn delete_message(
        &self,
        _channel: ChannelId,
        message: MessageId,
    ) -> Result<(), TransportError> {
        let known = self.sent.lock().iter().any(|record| record.id == message);
        if !known {
            return Err(TransportError::NotFound);
        }
        self.deleted.lock().push(message);
        Ok(())
    }

    async fn delete_messages(
        &self,
        channel: ChannelId,
        messages: &[MessageId],
    ) -> Result<(), TransportError> {
        if self.fail_bulk.load(Ordering::SeqCst) {
            return Err(TransportError::BulkUnsupported);
        }
        for message in messages {
            // Bulk deletion tolerates already-deleted ids.
            let _ = self.delete_message(channel, *message).await;
        }
        Ok(())
    }

    async fn fetch_message(
        &self,
        _channel: ChannelId,
        _message: MessageId,
    ) -> Result<MessageEvent, TransportError> {
        Err(TransportError::NotFound)
    }
}

/// A dispatcher wired to a fresh mock transport.
pub fn test_dispatcher(config: DispatchConfig) -> (Arc<Dispatcher>, Arc<MockTransport>) {
    let transport = MockTransport::new();
    let client = Dispatcher::new(transport.clone(), config);
    (client, transport)
}

/// Baseline config for tests: default prefixes and timings.
pub fn base_config() -> DispatchConfig {
    DispatchConfig::default()
}

/// A guild message event with the given id and content.
pub fn guild_message(id: u64, content: &str) -> MessageEvent {
    MessageEvent {
        id: MessageId(id),
        channel_id: ChannelId(100),
        guild_id: Some(cmdispatch::GuildId(200)),
        author_id: UserId(300),
        content: content.to_string(),
        timestamp: Utc::now(),
    }
}

/// The same event with edited content.
pub fn edited(msg: &MessageEvent, content: &str) -> MessageEvent {
    MessageEvent {
        content: content.to_string(),
        ..msg.clone()
    }
}
