//! Commands: a handler function wrapped with metadata, argument-flag
//! extraction, and a guarded execution wrapper.
//!
//! [`Command::run`] never lets a failure escape its boundary: every
//! execution resolves to exactly one outcome — success, a check-failure
//! reply, a cooperative-cancellation reply, a timeout reply, a silent
//! edit-supersession, or an unexpected-error reply with the detail kept
//! in the logs.

use crate::check::Check;
use crate::context::Context;
use crate::error::{CommandError, CommandResult};
use crate::flags::{self, FlagSpec};
use crate::module::Module;
use crate::telemetry::CommandTimer;
use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Boxed async handler taking the invocation context.
pub type CommandHandler =
    Arc<dyn Fn(Arc<Context>) -> BoxFuture<'static, CommandResult> + Send + Sync>;

/// Wrap an async function as a [`CommandHandler`].
pub fn handler<F, Fut>(f: F) -> CommandHandler
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CommandResult> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// A named command belonging to exactly one module.
pub struct Command {
    name: String,
    aliases: Vec<String>,
    hidden: bool,
    flags: FlagSpec,
    checks: Vec<Arc<Check>>,
    timeout: Option<Duration>,
    short_help: Option<String>,
    long_help: Vec<(String, String)>,
    /// Back-reference to the owning module; bound once at registration.
    module: OnceLock<Weak<Module>>,
    handler: CommandHandler,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("hidden", &self.hidden)
            .finish()
    }
}

impl Command {
    pub fn build(name: impl Into<String>, handler: CommandHandler) -> CommandBuilder {
        CommandBuilder {
            name: name.into(),
            handler,
            aliases: Vec::new(),
            hidden: false,
            flags: Vec::new(),
            checks: Vec::new(),
            timeout: None,
            short_help: None,
            help_text: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn flag_spec(&self) -> &FlagSpec {
        &self.flags
    }

    pub fn short_help(&self) -> Option<&str> {
        self.short_help.as_deref()
    }

    /// Structured help: ordered `(field, body)` pairs parsed from the
    /// help text.
    pub fn long_help(&self) -> &[(String, String)] {
        &self.long_help
    }

    /// The owning module, if it is still alive.
    pub fn module(&self) -> Option<Arc<Module>> {
        self.module.get().and_then(Weak::upgrade)
    }

    pub(crate) fn bind_module(&self, module: Weak<Module>) {
        if self.module.set(module).is_err() {
            warn!(command = %self.name, "Command already bound to a module; ignoring rebind");
        }
    }

    /// Safely execute this command against the given context. All
    /// failures are caught and converted into a user-facing (or silent)
    /// outcome; this never returns an error to the caller.
    pub async fn run(self: &Arc<Self>, ctx: Arc<Context>) {
        let Some(module) = self.module() else {
            warn!(command = %self.name, "Command has no live module; dropping invocation");
            return;
        };
        let _timer = CommandTimer::new(self.name.as_str());

        // The run is a cancellable unit: the dispatcher supersedes it
        // through the context's primary token when the triggering message
        // is edited.
        let token = ctx.cancellation();

        let deadline = self
            .timeout
            .or_else(|| ctx.client().config().command_timeout());
        let guarded = async {
            match deadline {
                Some(limit) => match tokio::time::timeout(limit, self.execute(&ctx, &module)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(CommandError::Timeout),
                },
                None => self.execute(&ctx, &module).await,
            }
        };
        let result = tokio::select! {
            () = token.cancelled() => Err(CommandError::Superseded),
            result = guarded => result,
        };

        match result {
            Ok(()) => {
                debug!(command = %self.name, "Command completed");
            }
            Err(CommandError::FailedCheck(check)) => {
                debug!(command = %self.name, check = %check.name, "Command failed check");
                if !check.msg.is_empty() {
                    self.deliver(&ctx, &check.msg).await;
                }
            }
            Err(CommandError::Cancelled(msg)) => {
                debug!(command = %self.name, msg = ?msg, "Caught a safe command cancellation");
                if let Some(msg) = msg {
                    self.deliver(&ctx, &msg).await;
                }
            }
            Err(CommandError::Timeout) => {
                warn!(command = %self.name, "Command timed out");
                self.deliver(&ctx, "Operation timed out.").await;
            }
            Err(CommandError::Superseded) => {
                // The triggering message was edited away; resolve silently.
                debug!(command = %self.name, "Command superseded by message edit");
            }
            Err(err) => {
                // Full detail goes to the log; the user sees only the
                // single-line rendering.
                error!(
                    command = %self.name,
                    error = ?err,
                    "Caught an unexpected error while running command"
                );
                let report = format!(
                    "An unexpected internal error occurred while running your command! \
                     Please report the following error to the developer:\n`{err}`"
                );
                if let Err(reply_err) = ctx.reply(report).await {
                    warn!(
                        command = %self.name,
                        error = %reply_err,
                        "Failed to deliver error report"
                    );
                }
            }
        }
    }

    /// Run the execution pipeline, funneling any failure through the
    /// module's `on_exception` hook (default: re-raise unchanged).
    async fn execute(self: &Arc<Self>, ctx: &Arc<Context>, module: &Arc<Module>) -> CommandResult {
        match self.pipeline(ctx, module).await {
            Ok(()) => Ok(()),
            Err(err) => module.hooks().on_exception(ctx, err).await,
        }
    }

    async fn pipeline(self: &Arc<Self>, ctx: &Arc<Context>, module: &Arc<Module>) -> CommandResult {
        module.hooks().pre_command(ctx).await?;
        if !self.flags.is_empty() {
            let (parsed, remaining) = flags::parse(ctx.arg_str(), &self.flags);
            ctx.set_flags(parsed);
            ctx.set_args(remaining);
        }
        for check in &self.checks {
            check.require(ctx, &[]).await?;
        }
        (self.handler)(ctx.clone()).await?;
        module.hooks().post_command(ctx).await?;
        Ok(())
    }

    async fn deliver(&self, ctx: &Context, msg: &str) {
        if let Err(err) = ctx.error_reply(msg).await {
            warn!(command = %self.name, error = %err, "Failed to deliver command reply");
        }
    }
}

/// Builder for [`Command`]. Constructed via [`Command::build`].
pub struct CommandBuilder {
    name: String,
    handler: CommandHandler,
    aliases: Vec<String>,
    hidden: bool,
    flags: Vec<String>,
    checks: Vec<Arc<Check>>,
    timeout: Option<Duration>,
    short_help: Option<String>,
    help_text: Option<String>,
}

impl CommandBuilder {
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Hide the command from help listings.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Declare a flag grammar token (`name`, `name=`, or `name==`).
    pub fn flag(mut self, token: impl Into<String>) -> Self {
        self.flags.push(token.into());
        self
    }

    /// Attach a pre-condition check, evaluated in attachment order.
    pub fn check(mut self, check: Arc<Check>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn short_help(mut self, help: impl Into<String>) -> Self {
        self.short_help = Some(help.into());
        self
    }

    /// Structured help text; lines ending in `:` start a new field.
    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    pub fn finish(self) -> Arc<Command> {
        Arc::new(Command {
            name: self.name,
            aliases: self.aliases,
            hidden: self.hidden,
            flags: FlagSpec::new(self.flags.iter().map(String::as_str)),
            checks: self.checks,
            timeout: self.timeout,
            short_help: self.short_help,
            long_help: self
                .help_text
                .as_deref()
                .map(parse_help)
                .unwrap_or_default(),
            module: OnceLock::new(),
            handler: self.handler,
        })
    }
}

/// Convert structured help text into an ordered list of
/// `(field name, field content)` pairs, split on lines ending in `:`.
fn parse_help(text: &str) -> Vec<(String, String)> {
    let dedented = dedent(text);
    let lines: Vec<&str> = dedented.trim().lines().map(str::trim_end).collect();
    let mut fields = Vec::new();
    let mut field_name = String::new();
    let mut field_content: Vec<&str> = Vec::new();

    for line in lines {
        if line.ends_with(':') {
            if !field_content.is_empty() {
                fields.push((field_name.clone(), dedent(&field_content.join("\n"))));
            }
            field_name = line[..line.len() - 1].trim().to_string();
            field_content = Vec::new();
        } else {
            field_content.push(line);
        }
    }
    if !field_content.is_empty() {
        fields.push((field_name, dedent(&field_content.join("\n"))));
    }
    fields
}

/// Strip the longest common leading whitespace from every non-empty line.
fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|line| if line.len() >= margin { &line[margin..] } else { line.trim_start() })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> CommandHandler {
        handler(|_ctx| async { Ok(()) })
    }

    #[test]
    fn test_builder_metadata() {
        let cmd = Command::build("config", noop())
            .alias("cfg")
            .alias("settings")
            .hidden()
            .flag("force")
            .flag("value==")
            .finish();
        assert_eq!(cmd.name(), "config");
        assert_eq!(cmd.aliases(), ["cfg", "settings"]);
        assert!(cmd.hidden());
        assert_eq!(cmd.flag_spec().tokens().len(), 2);
        assert!(cmd.module().is_none());
    }

    #[test]
    fn test_help_fields_split_on_colon_lines() {
        let cmd = Command::build("remind", noop())
            .help(
                "Set a reminder for yourself.\n\
                 Usage:\n\
                 \x20   remind <time> <text>\n\
                 Examples:\n\
                 \x20   remind 1h stretch\n\
                 \x20   remind 2d water the plants",
            )
            .finish();
        let fields = cmd.long_help();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].0, "");
        assert_eq!(fields[0].1, "Set a reminder for yourself.");
        assert_eq!(fields[1].0, "Usage");
        assert_eq!(fields[1].1, "remind <time> <text>");
        assert_eq!(fields[2].0, "Examples");
        assert_eq!(fields[2].1, "remind 1h stretch\nremind 2d water the plants");
    }

    #[test]
    fn test_help_absent_yields_no_fields() {
        assert!(Command::build("bare", noop()).finish().long_help().is_empty());
    }
}
