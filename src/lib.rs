//! # cmdispatch
//!
//! A command-dispatch engine for chat message streams: it recognizes
//! command invocations inside arbitrary text, resolves them against
//! enable/disable-able modules, runs a chain of pre-conditions, executes
//! the handler under structured cancellation, and reconciles state when
//! the triggering message is edited.
//!
//! The underlying chat transport is an external collaborator behind the
//! [`ChatTransport`] trait; the embedding process feeds [`Event`]s into
//! [`Dispatcher::handle_event`].
//!
//! ## Quick start
//!
//! ```ignore
//! use cmdispatch::{handler, Command, DispatchConfig, Dispatcher, Module};
//!
//! let module = Module::new("util");
//! module.register(
//!     Command::build("ping", handler(|ctx| async move {
//!         ctx.reply("pong").await?;
//!         Ok(())
//!     }))
//!     .alias("p"),
//! );
//!
//! let client = Dispatcher::new(transport, DispatchConfig::default());
//! client.register_module(module)?;
//! client.initialise_modules();
//! // feed events: client.handle_event(event).await
//! ```

pub mod check;
pub mod checks;
pub mod command;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod flags;
pub mod module;
pub mod prefix;
pub mod telemetry;
pub mod transport;

pub use check::{sync_predicate, Check, CheckBuilder, CheckPredicate};
pub use command::{handler, Command, CommandBuilder, CommandHandler};
pub use config::{ConfigError, DispatchConfig};
pub use context::{Context, FlattenedContext};
pub use dispatch::{AfterEventHook, Dispatcher, MessageParser};
pub use error::{CommandError, CommandResult, DispatchError};
pub use flags::{FlagMap, FlagSpec, FlagValue};
pub use module::{Module, ModuleHooks};
pub use prefix::{PrefixResolver, StaticPrefixes};
pub use transport::{
    ChannelId, ChatTransport, Event, GuildId, MessageEvent, MessageId, OutgoingMessage,
    TransportError, UserId,
};
