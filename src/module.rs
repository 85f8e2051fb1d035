//! Modules: named, enable/disable-able collections of commands with
//! lifecycle hooks.
//!
//! A module moves `created → initialised → ready`. Commands of a module
//! that is not yet ready block at the dispatcher's readiness gate rather
//! than fail, so a launch task that never completes hangs every command
//! of that module. That is the intended behavior, not a bug: launch tasks
//! must finish for the module to serve.

use crate::command::{Command, CommandBuilder};
use crate::context::Context;
use crate::dispatch::Dispatcher;
use crate::error::{CommandError, CommandResult};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// A function run once during module initialisation.
pub type InitTask = Box<dyn Fn(&Dispatcher) + Send + Sync>;

/// An async function run once during module launch.
pub type LaunchTask =
    Box<dyn Fn(Arc<Dispatcher>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Per-command-run hooks owned by a module.
///
/// `on_exception` sees every failure from `pre_command`, flag parsing,
/// checks, the handler body, and `post_command` before the command-level
/// outcome conversion; the default re-raises unchanged.
#[async_trait]
pub trait ModuleHooks: Send + Sync {
    async fn pre_command(&self, _ctx: &Arc<Context>) -> CommandResult {
        Ok(())
    }

    async fn post_command(&self, _ctx: &Arc<Context>) -> CommandResult {
        Ok(())
    }

    async fn on_exception(&self, _ctx: &Arc<Context>, error: CommandError) -> CommandResult {
        Err(error)
    }
}

struct DefaultHooks;

impl ModuleHooks for DefaultHooks {}

/// A named collection of commands with lifecycle state.
pub struct Module {
    name: String,
    enabled: AtomicBool,
    initialised: AtomicBool,
    ready: AtomicBool,
    cmds: RwLock<Vec<Arc<Command>>>,
    init_tasks: Mutex<Vec<InitTask>>,
    launch_tasks: Mutex<Vec<LaunchTask>>,
    hooks: RwLock<Arc<dyn ModuleHooks>>,
    attachments: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    /// Whether an edit of a triggering message cancels the run and
    /// deletes the responses it produced.
    cleanup_on_edit: AtomicBool,
    /// Whether an edited message is re-parsed for a command.
    reparse_on_edit: AtomicBool,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        debug!(module = %name, "New module created");
        Arc::new(Self {
            name,
            enabled: AtomicBool::new(true),
            initialised: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            cmds: RwLock::new(Vec::new()),
            init_tasks: Mutex::new(Vec::new()),
            launch_tasks: Mutex::new(Vec::new()),
            hooks: RwLock::new(Arc::new(DefaultHooks)),
            attachments: RwLock::new(HashMap::new()),
            cleanup_on_edit: AtomicBool::new(true),
            reparse_on_edit: AtomicBool::new(true),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a command on this module. The caller must rebuild the
    /// dispatcher's index afterwards if the module is already registered;
    /// [`Dispatcher::register_module`] does so for the usual case of
    /// registering commands first.
    pub fn register(self: &Arc<Self>, builder: CommandBuilder) -> Arc<Command> {
        let cmd = builder.finish();
        cmd.bind_module(Arc::downgrade(self));
        debug!(module = %self.name, command = %cmd.name(), "Adding command");
        self.cmds.write().push(cmd.clone());
        cmd
    }

    /// All commands owned by this module, in registration order. Reachable
    /// regardless of the enabled flag.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        self.cmds.read().clone()
    }

    /// Look a command up by name or alias, case-insensitively.
    pub fn command_named(&self, name: &str) -> Option<Arc<Command>> {
        self.cmds
            .read()
            .iter()
            .find(|cmd| {
                cmd.name().eq_ignore_ascii_case(name)
                    || cmd.aliases().iter().any(|a| a.eq_ignore_ascii_case(name))
            })
            .cloned()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Flip the enabled flag. Use [`Dispatcher::set_module_enabled`] so
    /// the command-name index is rebuilt in the same step.
    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn cleanup_on_edit(&self) -> bool {
        self.cleanup_on_edit.load(Ordering::Acquire)
    }

    pub fn reparse_on_edit(&self) -> bool {
        self.reparse_on_edit.load(Ordering::Acquire)
    }

    pub fn set_edit_policies(&self, cleanup: bool, reparse: bool) {
        self.cleanup_on_edit.store(cleanup, Ordering::Release);
        self.reparse_on_edit.store(reparse, Ordering::Release);
    }

    /// Replace the per-command-run hook set.
    pub fn set_hooks(&self, hooks: Arc<dyn ModuleHooks>) {
        *self.hooks.write() = hooks;
    }

    pub fn hooks(&self) -> Arc<dyn ModuleHooks> {
        self.hooks.read().clone()
    }

    /// Late-bind an auxiliary value onto this module by name.
    pub fn attach(&self, name: impl Into<String>, value: Arc<dyn Any + Send + Sync>) {
        let name = name.into();
        debug!(module = %self.name, attachment = %name, "Attached");
        self.attachments.write().insert(name, value);
    }

    /// Fetch an attachment by name, downcast to the expected type.
    pub fn attachment<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.attachments
            .read()
            .get(name)
            .and_then(|value| value.clone().downcast::<T>().ok())
    }

    /// Queue a function for the initialisation phase.
    pub fn add_init_task(&self, task: InitTask) {
        debug!(module = %self.name, "Adding initialisation task");
        self.init_tasks.lock().push(task);
    }

    /// Queue an async function for the launch phase.
    pub fn add_launch_task(&self, task: LaunchTask) {
        debug!(module = %self.name, "Adding launch task");
        self.launch_tasks.lock().push(task);
    }

    /// Run all init tasks exactly once. A repeat call is a no-op.
    pub fn initialise(&self, client: &Dispatcher) {
        if self.initialised.load(Ordering::Acquire) {
            debug!(module = %self.name, "Already initialised, skipping initialisation");
            return;
        }
        debug!(module = %self.name, "Running initialisation tasks");
        for (n, task) in self.init_tasks.lock().iter().enumerate() {
            debug!(module = %self.name, task = n, "Running initialisation task");
            task(client);
        }
        self.initialised.store(true, Ordering::Release);
    }

    /// Run all launch tasks exactly once and mark the module ready. A
    /// repeat call is a no-op. A task failure leaves the module not
    /// ready, which keeps its commands blocked at the readiness gate.
    pub async fn launch(self: &Arc<Self>, client: &Arc<Dispatcher>) -> anyhow::Result<()> {
        if self.ready.load(Ordering::Acquire) {
            debug!(module = %self.name, "Already launched, skipping launch");
            return Ok(());
        }
        debug!(module = %self.name, "Running launch tasks");
        let mut tasks = std::mem::take(&mut *self.launch_tasks.lock());
        let mut n = 0;
        while n < tasks.len() {
            debug!(module = %self.name, task = n, "Running launch task");
            if let Err(err) = (tasks[n])(client.clone()).await {
                error!(module = %self.name, task = n, error = ?err, "Launch task failed");
                // Put the failed task and the rest back so a retry can
                // finish the job.
                *self.launch_tasks.lock() = tasks.split_off(n);
                return Err(err);
            }
            n += 1;
        }
        self.ready.store(true, Ordering::Release);
        info!(module = %self.name, "Module ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{handler, Command};

    fn noop_cmd(name: &str) -> CommandBuilder {
        Command::build(name, handler(|_ctx| async { Ok(()) }))
    }

    #[test]
    fn test_register_binds_module() {
        let module = Module::new("util");
        let cmd = module.register(noop_cmd("ping"));
        assert_eq!(cmd.module().unwrap().name(), "util");
        assert_eq!(module.commands().len(), 1);
    }

    #[test]
    fn test_command_named_matches_aliases_case_insensitively() {
        let module = Module::new("util");
        module.register(noop_cmd("ping").alias("p"));
        assert!(module.command_named("PING").is_some());
        assert!(module.command_named("P").is_some());
        assert!(module.command_named("pong").is_none());
    }

    #[test]
    fn test_attachments_round_trip() {
        let module = Module::new("util");
        module.attach("greeting", Arc::new("hello".to_string()));
        assert_eq!(
            module.attachment::<String>("greeting").as_deref(),
            Some(&"hello".to_string())
        );
        assert!(module.attachment::<usize>("greeting").is_none());
    }
}
