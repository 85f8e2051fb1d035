//! Stock checks shipped with the engine.

use crate::check::{sync_predicate, Check};
use std::sync::Arc;

/// Passes when the invoking author is one of the configured owners.
pub fn is_owner() -> Arc<Check> {
    Check::builder("IS_OWNER", "You need to be a bot owner to use this command!")
        .predicate(sync_predicate(|ctx, _| match ctx.author_id() {
            Some(author) => ctx.client().config().owners.contains(&author.0),
            None => false,
        }))
        .build()
}

/// Passes only inside a guild channel.
pub fn in_guild() -> Arc<Check> {
    Check::builder("IN_GUILD", "This command may only be used in a server!")
        .predicate(sync_predicate(|ctx, _| ctx.guild_id().is_some()))
        .build()
}
