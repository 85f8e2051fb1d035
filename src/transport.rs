//! Transport boundary: events consumed from the chat client and the
//! capabilities the engine needs from it.
//!
//! The transport itself (delivery, reconnection, rate limiting) is an
//! external collaborator. The engine only consumes a stream of message
//! events and a handful of send/delete/fetch primitives.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// Unique id of a message.
    MessageId
);
id_type!(
    /// Unique id of a channel.
    ChannelId
);
id_type!(
    /// Unique id of a guild (server). Absent for direct messages.
    GuildId
);
id_type!(
    /// Unique id of a user.
    UserId
);

/// A message as delivered by the transport.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub id: MessageId,
    pub channel_id: ChannelId,
    /// Absent in direct-message channels.
    pub guild_id: Option<GuildId>,
    pub author_id: UserId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Outgoing payload: plain text or a rich embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingMessage {
    Text(String),
    Embed {
        title: Option<String>,
        description: String,
    },
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    pub fn embed(description: impl Into<String>) -> Self {
        Self::Embed {
            title: None,
            description: description.into(),
        }
    }
}

impl From<String> for OutgoingMessage {
    fn from(content: String) -> Self {
        Self::Text(content)
    }
}

impl From<&str> for OutgoingMessage {
    fn from(content: &str) -> Self {
        Self::Text(content.to_string())
    }
}

/// Errors surfaced by the transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The referenced message no longer exists. Always swallowed by
    /// best-effort cleanup paths.
    #[error("message not found")]
    NotFound,

    #[error("missing permission for the requested operation")]
    PermissionDenied,

    /// The transport cannot delete messages in bulk; callers fall back to
    /// per-message deletion.
    #[error("bulk deletion not supported")]
    BulkUnsupported,

    #[error("transport connection closed")]
    Closed,

    #[error("transport error: {0}")]
    Other(String),
}

/// Capabilities the engine consumes from the chat transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a message to a channel, returning the sent message's id.
    async fn send_message(
        &self,
        channel: ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId, TransportError>;

    /// Delete a single message.
    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), TransportError>;

    /// Delete several messages at once. Implementations without a bulk
    /// primitive should return [`TransportError::BulkUnsupported`].
    async fn delete_messages(
        &self,
        channel: ChannelId,
        messages: &[MessageId],
    ) -> Result<(), TransportError>;

    /// Fetch a message by id. Used only during best-effort cleanup.
    async fn fetch_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<MessageEvent, TransportError>;
}

/// A named transport event, as handed to [`crate::Dispatcher::handle_event`].
#[derive(Debug, Clone)]
pub enum Event {
    /// The transport completed its startup handshake; modules launch here.
    Ready,
    MessageCreate(MessageEvent),
    MessageUpdate {
        /// Pre-edit state, when the transport supplies it. Without it the
        /// edit is treated as a content change.
        old: Option<MessageEvent>,
        new: MessageEvent,
    },
}

impl Event {
    /// Event name used to key the after-event hook registry.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::MessageCreate(_) => "message",
            Self::MessageUpdate { .. } => "message_update",
        }
    }
}
