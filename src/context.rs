//! Per-invocation execution context.
//!
//! A [`Context`] is created by the dispatcher when a message matches a
//! command and lives exactly as long as that invocation: it carries the
//! triggering message, addressing derived from it, the argument string in
//! its raw and post-flag-parsed forms, the replies sent so far, and the
//! cancellation handles an external actor can fire to abort the run.
//!
//! [`Context::flatten`] produces the immutable id-only snapshot retained
//! in the dispatcher's bounded recent-message cache after the context
//! itself is gone.

use crate::command::Command;
use crate::dispatch::Dispatcher;
use crate::error::CommandError;
use crate::flags::FlagMap;
use crate::transport::{
    ChannelId, GuildId, MessageEvent, MessageId, OutgoingMessage, UserId,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Execution context for a single command invocation.
pub struct Context {
    client: Arc<Dispatcher>,
    /// The triggering message; absent for synthesized contexts.
    message: Option<MessageEvent>,
    channel_id: Option<ChannelId>,
    guild_id: Option<GuildId>,
    author_id: Option<UserId>,
    cmd: Option<Arc<Command>>,
    alias: Option<String>,
    prefix: Option<String>,
    arg_str: String,
    args: Mutex<String>,
    flags: Mutex<FlagMap>,
    sent: Mutex<Vec<MessageId>>,
    /// Primary cancellation handle for the invocation, created with the
    /// context so cancellation can never race registration.
    cancel: CancellationToken,
    tasks: Mutex<Vec<CancellationToken>>,
    /// Working scratch storage for handlers. Never flattened.
    objects: DashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Context {
    /// Build a context for a message-triggered invocation. Channel, guild,
    /// and author are always derived from the message.
    pub fn for_message(
        client: Arc<Dispatcher>,
        message: MessageEvent,
        cmd: Arc<Command>,
        alias: impl Into<String>,
        prefix: impl Into<String>,
        arg_str: impl Into<String>,
    ) -> Arc<Self> {
        let arg_str = arg_str.into();
        Arc::new(Self {
            client,
            channel_id: Some(message.channel_id),
            guild_id: message.guild_id,
            author_id: Some(message.author_id),
            message: Some(message),
            cmd: Some(cmd),
            alias: Some(alias.into()),
            prefix: Some(prefix.into()),
            args: Mutex::new(arg_str.clone()),
            arg_str,
            flags: Mutex::new(FlagMap::default()),
            sent: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            objects: DashMap::new(),
        })
    }

    /// Build a context without a triggering message, with explicitly
    /// supplied addressing.
    pub fn synthetic(
        client: Arc<Dispatcher>,
        channel_id: Option<ChannelId>,
        guild_id: Option<GuildId>,
        author_id: Option<UserId>,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            message: None,
            channel_id,
            guild_id,
            author_id,
            cmd: None,
            alias: None,
            prefix: None,
            arg_str: String::new(),
            args: Mutex::new(String::new()),
            flags: Mutex::new(FlagMap::default()),
            sent: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            objects: DashMap::new(),
        })
    }

    pub fn client(&self) -> &Arc<Dispatcher> {
        &self.client
    }

    pub fn message(&self) -> Option<&MessageEvent> {
        self.message.as_ref()
    }

    pub fn channel_id(&self) -> Option<ChannelId> {
        self.channel_id
    }

    pub fn guild_id(&self) -> Option<GuildId> {
        self.guild_id
    }

    pub fn author_id(&self) -> Option<UserId> {
        self.author_id
    }

    pub fn cmd(&self) -> Option<&Arc<Command>> {
        self.cmd.as_ref()
    }

    /// The alias the command was invoked under.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// The prefix the invocation used.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// The raw trailing argument string, before flag parsing.
    pub fn arg_str(&self) -> &str {
        &self.arg_str
    }

    /// The argument string after flag parsing.
    pub fn args(&self) -> String {
        self.args.lock().clone()
    }

    pub fn set_args(&self, args: String) {
        *self.args.lock() = args;
    }

    /// Flags parsed from the argument string. Empty until the command's
    /// flag grammar (if any) has been applied.
    pub fn flags(&self) -> FlagMap {
        self.flags.lock().clone()
    }

    pub fn set_flags(&self, flags: FlagMap) {
        *self.flags.lock() = flags;
    }

    /// Reply in the invocation's channel, recording the sent message.
    pub async fn reply(
        &self,
        message: impl Into<OutgoingMessage>,
    ) -> Result<MessageId, CommandError> {
        let channel = self
            .channel_id
            .ok_or(CommandError::InvalidContext("no channel to reply in"))?;
        let id = self
            .client
            .transport()
            .send_message(channel, message.into())
            .await?;
        self.sent.lock().push(id);
        Ok(id)
    }

    /// Reply with an error embed.
    pub async fn error_reply(
        &self,
        description: impl Into<String>,
    ) -> Result<MessageId, CommandError> {
        self.reply(OutgoingMessage::embed(description)).await
    }

    /// Ids of every message sent as a reply during this invocation, in
    /// send order.
    pub fn sent_ids(&self) -> Vec<MessageId> {
        self.sent.lock().clone()
    }

    /// The invocation's primary cancellation token. The command execution
    /// wrapper and the dispatcher's readiness gate both observe it.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Register a cancellation handle for an auxiliary unit of work
    /// belonging to this invocation.
    pub fn register_task(&self, token: CancellationToken) {
        self.tasks.lock().push(token);
    }

    /// Cancel the invocation and every registered unit of work.
    pub fn cancel_all(&self) {
        self.cancel.cancel();
        for token in self.tasks.lock().iter() {
            token.cancel();
        }
    }

    /// Store a scratch object by name.
    pub fn set_object(&self, name: impl Into<String>, value: Arc<dyn Any + Send + Sync>) {
        self.objects.insert(name.into(), value);
    }

    /// Fetch a scratch object by name, downcast to the expected type.
    pub fn object<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.objects
            .get(name)
            .and_then(|entry| entry.value().clone().downcast::<T>().ok())
    }

    /// Produce the immutable id-only snapshot of this context. Pure and
    /// total: optional entities flatten to absent ids, never an error.
    pub fn flatten(&self) -> FlattenedContext {
        FlattenedContext {
            message_id: self.message.as_ref().map(|m| m.id),
            channel_id: self.channel_id,
            guild_id: self.guild_id,
            author_id: self.author_id,
            cmd_name: self.cmd.as_ref().map(|c| c.name().to_string()),
            alias: self.alias.clone(),
            prefix: self.prefix.clone(),
            arg_str: self.arg_str.clone(),
            sent: self.sent.lock().clone(),
        }
    }
}

/// Immutable, serializable snapshot of a [`Context`]: ids and short
/// strings only, safe to retain past the context's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlattenedContext {
    pub message_id: Option<MessageId>,
    pub channel_id: Option<ChannelId>,
    pub guild_id: Option<GuildId>,
    pub author_id: Option<UserId>,
    pub cmd_name: Option<String>,
    pub alias: Option<String>,
    pub prefix: Option<String>,
    pub arg_str: String,
    pub sent: Vec<MessageId>,
}
