//! The dispatch engine.
//!
//! The [`Dispatcher`] owns the module registry, the derived command-name
//! index, the bounded recent-context cache, the active-context map, and
//! the extension-hook registries. It turns transport events into command
//! executions and reconciles state when a triggering message is edited.

mod cache;
mod hooks;
mod index;

pub use hooks::{AfterEventHook, MessageParser};

use crate::command::Command;
use crate::config::DispatchConfig;
use crate::context::{Context, FlattenedContext};
use crate::error::DispatchError;
use crate::module::Module;
use crate::prefix::{PrefixResolver, StaticPrefixes};
use crate::transport::{
    ChannelId, ChatTransport, Event, MessageEvent, MessageId, TransportError,
};
use cache::ContextCache;
use dashmap::DashMap;
use hooks::PriorityRegistry;
use index::CommandIndex;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// The command-dispatch engine.
pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    config: DispatchConfig,
    prefix_resolver: RwLock<Arc<dyn PrefixResolver>>,
    /// Registered modules, in registration order. Append-only.
    modules: RwLock<Vec<Arc<Module>>>,
    /// Derived name index; replaced atomically on every structural change.
    index: RwLock<Arc<CommandIndex>>,
    /// Recent flattened snapshots, bounded LRU.
    recent: Mutex<ContextCache>,
    /// Live contexts for messages currently executing.
    active: DashMap<MessageId, Arc<Context>>,
    /// Signalled whenever an entry leaves the active map.
    drained: Notify,
    after_events: RwLock<HashMap<String, PriorityRegistry<dyn AfterEventHook>>>,
    parsers: RwLock<PriorityRegistry<dyn MessageParser>>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn ChatTransport>, config: DispatchConfig) -> Arc<Self> {
        let resolver: Arc<dyn PrefixResolver> =
            Arc::new(StaticPrefixes::new(config.prefixes.iter().cloned()));
        Arc::new(Self {
            transport,
            recent: Mutex::new(ContextCache::new(config.cache_size)),
            config,
            prefix_resolver: RwLock::new(resolver),
            modules: RwLock::new(Vec::new()),
            index: RwLock::new(Arc::new(CommandIndex::empty())),
            active: DashMap::new(),
            drained: Notify::new(),
            after_events: RwLock::new(HashMap::new()),
            parsers: RwLock::new(PriorityRegistry::new()),
        })
    }

    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Swap in a different prefix-resolution strategy.
    pub fn set_prefix_resolver(&self, resolver: Arc<dyn PrefixResolver>) {
        *self.prefix_resolver.write() = resolver;
    }

    // ------------------------------------------------------------------
    // Module registry
    // ------------------------------------------------------------------

    /// Register a module. Module names are unique; the command-name index
    /// is rebuilt immediately.
    pub fn register_module(&self, module: Arc<Module>) -> Result<(), DispatchError> {
        {
            let mut modules = self.modules.write();
            if modules.iter().any(|m| m.name() == module.name()) {
                return Err(DispatchError::DuplicateModule(module.name().to_string()));
            }
            info!(
                module = %module.name(),
                commands = module.commands().len(),
                "Registering module"
            );
            modules.push(module);
        }
        self.rebuild_index();
        Ok(())
    }

    pub fn module(&self, name: &str) -> Option<Arc<Module>> {
        self.modules.read().iter().find(|m| m.name() == name).cloned()
    }

    pub fn modules(&self) -> Vec<Arc<Module>> {
        self.modules.read().clone()
    }

    /// Enable or disable a module and rebuild the index, making its
    /// commands (un)resolvable in the same step.
    pub fn set_module_enabled(&self, name: &str, enabled: bool) -> Result<(), DispatchError> {
        let module = self
            .module(name)
            .ok_or_else(|| DispatchError::UnknownModule(name.to_string()))?;
        info!(module = %name, enabled, "Toggling module");
        module.set_enabled(enabled);
        self.rebuild_index();
        Ok(())
    }

    /// Rebuild the command-name index from scratch and swap it in as one
    /// atomic replacement. Call after adding commands to an
    /// already-registered module.
    pub fn rebuild_index(&self) {
        let modules = self.modules.read().clone();
        let index = Arc::new(CommandIndex::build(&modules));
        *self.index.write() = index;
    }

    /// Exact command lookup by name or alias among enabled modules.
    pub fn command_named(&self, name: &str) -> Option<Arc<Command>> {
        self.index.read().get(name)
    }

    /// Run every module's init tasks (idempotent per module).
    pub fn initialise_modules(&self) {
        for module in self.modules() {
            module.initialise(self);
        }
    }

    /// Run every module's launch tasks. A failing module is logged and
    /// left not ready — its commands stay gated — without affecting the
    /// other modules.
    pub async fn launch_modules(self: &Arc<Self>) {
        for module in self.modules() {
            if let Err(err) = module.launch(self).await {
                error!(
                    module = %module.name(),
                    error = ?err,
                    "Module launch failed; its commands stay gated"
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Extension hooks
    // ------------------------------------------------------------------

    /// Register an after-event handler for a named transport event.
    /// Handlers run after the primary handling completes, in ascending
    /// priority order; ties preserve registration order.
    pub fn add_after_event(
        &self,
        event: impl Into<String>,
        priority: i64,
        hook: Arc<dyn AfterEventHook>,
    ) {
        let event = event.into();
        debug!(event = %event, priority, "Adding after-event handler");
        self.after_events
            .write()
            .entry(event)
            .or_insert_with(PriorityRegistry::new)
            .insert(priority, hook);
    }

    /// Register an extra message parser, consulted when no command
    /// matches a message.
    pub fn add_message_parser(&self, priority: i64, parser: Arc<dyn MessageParser>) {
        debug!(priority, "Adding extra message parser");
        self.parsers.write().insert(priority, parser);
    }

    // ------------------------------------------------------------------
    // Event handling
    // ------------------------------------------------------------------

    /// Handle one transport event. The primary handling always completes
    /// before the event's after-handlers are scheduled; after-handlers
    /// are fire-and-forget and may outlive the next event.
    ///
    /// Spawn one task per event to keep command executions for different
    /// messages concurrent with each other.
    pub async fn handle_event(self: &Arc<Self>, event: Event) {
        let event = Arc::new(event);
        match &*event {
            Event::Ready => self.on_ready().await,
            Event::MessageCreate(msg) => self.on_message(msg.clone()).await,
            Event::MessageUpdate { old, new } => {
                self.on_message_edit(old.as_ref(), new.clone()).await;
            }
        }
        self.schedule_after_hooks(event);
    }

    async fn on_ready(self: &Arc<Self>) {
        self.launch_modules().await;
        let modules = self.modules();
        let commands: usize = modules.iter().map(|m| m.commands().len()).sum();
        info!(
            modules = modules.len(),
            commands,
            prefixes = ?self.config.prefixes,
            "Ready to take commands"
        );
    }

    /// Primary message path: resolve a prefix and command, or fall back
    /// to the extra parsers.
    pub async fn on_message(self: &Arc<Self>, msg: MessageEvent) {
        let resolver = self.prefix_resolver.read().clone();
        let prefixes = match resolver.resolve(&msg).await {
            Some(prefixes) if !prefixes.is_empty() => prefixes,
            _ => {
                error!(message = %msg.id, "No valid prefixes resolvable; dropping message");
                return;
            }
        };

        let content = msg.content.trim();
        let mut candidates: Vec<&String> = prefixes
            .iter()
            .filter(|p| !p.is_empty() && content.starts_with(p.as_str()))
            .collect();
        candidates.sort_by_key(|p| std::cmp::Reverse(p.len()));

        let index = self.index.read().clone();
        let mut matched: Option<(Arc<Command>, String, String, String)> = None;
        for prefix in candidates {
            let rest = content[prefix.len()..].trim_start();
            if let Some((alias, cmd)) = index.resolve_prefix_of(rest) {
                let arg_str = rest[alias.len()..].trim().to_string();
                matched = Some((cmd, alias, prefix.clone(), arg_str));
                break;
            }
        }

        match matched {
            Some((cmd, alias, prefix, arg_str)) => {
                self.run_cmd(msg, cmd, alias, prefix, arg_str).await;
            }
            None => self.run_extra_parsers(Arc::new(msg)),
        }
    }

    /// Execute a matched command with full lifecycle bookkeeping.
    async fn run_cmd(
        self: &Arc<Self>,
        msg: MessageEvent,
        cmd: Arc<Command>,
        alias: String,
        prefix: String,
        arg_str: String,
    ) {
        info!(
            command = %cmd.name(),
            alias = %alias,
            author = %msg.author_id,
            guild = ?msg.guild_id,
            message = %msg.id,
            "Executing command"
        );
        let Some(module) = cmd.module() else {
            warn!(command = %cmd.name(), "Command has no live module; dropping invocation");
            return;
        };

        let id = msg.id;
        let ctx = Context::for_message(self.clone(), msg, cmd.clone(), alias, prefix, arg_str);
        self.recent.lock().insert(id, ctx.flatten());
        self.active.insert(id, ctx.clone());

        // The readiness gate is cancellable too, so an edit arriving
        // while a module is still launching can abort the wait.
        let gate_token = ctx.cancellation();
        let gate = async {
            while !module.is_ready() {
                debug!(
                    module = %module.name(),
                    command = %cmd.name(),
                    "Module not ready; waiting"
                );
                tokio::time::sleep(self.config.ready_poll()).await;
            }
        };
        tokio::select! {
            () = gate_token.cancelled() => {
                debug!(message = %id, "Execution superseded while awaiting module readiness");
            }
            () = gate => {
                cmd.run(ctx.clone()).await;
            }
        }

        // Refresh the cache with the final snapshot before dropping the
        // live context, so a concurrent edit always finds an entry.
        self.recent.lock().insert(id, ctx.flatten());
        self.active.remove(&id);
        self.drained.notify_waiters();
    }

    /// Reconcile an edited message against any prior invocation.
    pub async fn on_message_edit(self: &Arc<Self>, old: Option<&MessageEvent>, new: MessageEvent) {
        let changed = old.is_none_or(|o| o.content != new.content);
        if !changed {
            return;
        }

        let cached = self.recent.lock().get(new.id);
        let Some(flat) = cached else {
            debug!(message = %new.id, "Edited message not in cache; treating as fresh");
            self.on_message(new).await;
            return;
        };

        let module = flat
            .cmd_name
            .as_deref()
            .and_then(|name| self.module_of_command(name));
        let (cleanup, reparse) = match &module {
            Some(m) => (m.cleanup_on_edit(), m.reparse_on_edit()),
            None => (false, false),
        };

        if cleanup {
            if let Some(ctx) = self.active.get(&new.id).map(|entry| entry.value().clone()) {
                debug!(message = %new.id, "Cancelling in-flight execution after edit");
                ctx.cancel_all();
                self.wait_until_inactive(new.id).await;
            }
            // The drained run refreshed its cache entry; re-read it so the
            // deletion list includes every reply that was sent.
            let latest = self.recent.lock().get(new.id).unwrap_or(flat);
            if let Some(channel) = latest.channel_id {
                self.delete_sent(channel, &latest.sent).await;
            }
        }

        if reparse {
            debug!(message = %new.id, "Re-parsing edited message");
            self.on_message(new).await;
        }
    }

    /// Whether a message id is currently executing.
    pub fn is_active(&self, id: MessageId) -> bool {
        self.active.contains_key(&id)
    }

    /// The cached flattened snapshot for a message, if still retained.
    pub fn recent_snapshot(&self, id: MessageId) -> Option<FlattenedContext> {
        self.recent.lock().get(id)
    }

    /// Block until the given message id leaves the active map.
    async fn wait_until_inactive(&self, id: MessageId) {
        loop {
            let notified = self.drained.notified();
            if !self.active.contains_key(&id) {
                return;
            }
            notified.await;
        }
    }

    /// The module owning a command of the given name, regardless of the
    /// enabled flag. Last-registered wins, matching index resolution.
    fn module_of_command(&self, name: &str) -> Option<Arc<Module>> {
        self.modules
            .read()
            .iter()
            .rev()
            .find(|m| m.command_named(name).is_some())
            .cloned()
    }

    /// Best-effort deletion of command responses: batch first, falling
    /// back to per-message deletion; already-deleted messages are
    /// swallowed.
    async fn delete_sent(&self, channel: ChannelId, ids: &[MessageId]) {
        if ids.is_empty() {
            return;
        }
        debug!(channel = %channel, count = ids.len(), "Deleting command responses");
        match self.transport.delete_messages(channel, ids).await {
            Ok(()) | Err(TransportError::NotFound) => return,
            Err(err) => {
                debug!(
                    channel = %channel,
                    error = %err,
                    "Bulk delete failed; deleting individually"
                );
            }
        }
        for id in ids {
            match self.transport.delete_message(channel, *id).await {
                Ok(()) | Err(TransportError::NotFound) => {}
                Err(err) => {
                    warn!(message = %id, error = %err, "Failed to delete response");
                }
            }
        }
    }

    fn run_extra_parsers(self: &Arc<Self>, msg: Arc<MessageEvent>) {
        let parsers: Vec<(i64, Arc<dyn MessageParser>)> = {
            let registry = self.parsers.read();
            registry.iter().map(|(p, e)| (p, e.clone())).collect()
        };
        if parsers.is_empty() {
            debug!(message = %msg.id, "No command matched");
            return;
        }
        for (priority, parser) in parsers {
            let client = self.clone();
            let msg = msg.clone();
            tokio::spawn(async move {
                if let Err(err) = parser.parse(client, msg.clone()).await {
                    error!(
                        message = %msg.id,
                        priority,
                        error = ?err,
                        "Extra message parser failed"
                    );
                }
            });
        }
    }

    fn schedule_after_hooks(self: &Arc<Self>, event: Arc<Event>) {
        let hooks: Vec<(i64, Arc<dyn AfterEventHook>)> = {
            let registry = self.after_events.read();
            match registry.get(event.name()) {
                Some(registry) => registry.iter().map(|(p, h)| (p, h.clone())).collect(),
                None => return,
            }
        };
        for (priority, hook) in hooks {
            let client = self.clone();
            let event = event.clone();
            tokio::spawn(async move {
                if let Err(err) = hook.call(client, event.clone()).await {
                    error!(
                        event = event.name(),
                        priority,
                        error = ?err,
                        "After-event handler failed"
                    );
                }
            });
        }
    }
}
