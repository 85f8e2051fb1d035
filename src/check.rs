//! Composable pre-condition checks.
//!
//! A [`Check`] bundles a name, a user-facing failure message, and an async
//! predicate over the execution context. Checks compose through `parents`
//! (if any parent passes, the check passes) and `requires` (all must pass
//! before the own predicate is consulted). They are immutable, stateless,
//! and shared between commands as `Arc<Check>`.

use crate::context::Context;
use crate::error::{CommandError, CommandResult};
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Async predicate over `(context, extra args)`.
pub type CheckPredicate =
    Arc<dyn for<'a> Fn(&'a Context, &'a [String]) -> BoxFuture<'a, bool> + Send + Sync>;

/// Wrap a synchronous predicate as a [`CheckPredicate`].
pub fn sync_predicate<F>(predicate: F) -> CheckPredicate
where
    F: Fn(&Context, &[String]) -> bool + Send + Sync + 'static,
{
    Arc::new(move |ctx, extra| {
        let passed = predicate(ctx, extra);
        Box::pin(async move { passed })
    })
}

/// A pre-condition evaluated before a command handler runs.
pub struct Check {
    /// Name used in logs.
    pub name: String,
    /// Posted to the user when the check fails before a command. An empty
    /// message suppresses the reply entirely.
    pub msg: String,
    predicate: CheckPredicate,
    parents: Vec<Arc<Check>>,
    requires: Vec<Arc<Check>>,
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("name", &self.name)
            .field("parents", &self.parents.len())
            .field("requires", &self.requires.len())
            .finish()
    }
}

impl Check {
    pub fn builder(name: impl Into<String>, msg: impl Into<String>) -> CheckBuilder {
        CheckBuilder {
            name: name.into(),
            msg: msg.into(),
            predicate: None,
            parents: Vec::new(),
            requires: Vec::new(),
        }
    }

    /// Evaluate the full chain: parents (OR, short-circuit on first pass),
    /// then requires (AND, short-circuit on first failure), then the own
    /// predicate. Fails closed.
    pub fn passes<'a>(&'a self, ctx: &'a Context, extra: &'a [String]) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            for parent in &self.parents {
                if parent.passes(ctx, extra).await {
                    return true;
                }
            }
            for required in &self.requires {
                if !required.passes(ctx, extra).await {
                    return false;
                }
            }
            (self.predicate)(ctx, extra).await
        })
    }

    /// Evaluate the chain, surfacing failure as a [`CommandError`]
    /// carrying this check.
    pub async fn require(self: &Arc<Self>, ctx: &Context, extra: &[String]) -> CommandResult {
        if self.passes(ctx, extra).await {
            Ok(())
        } else {
            Err(CommandError::FailedCheck(self.clone()))
        }
    }
}

/// Builder for [`Check`]. Constructed via [`Check::builder`].
pub struct CheckBuilder {
    name: String,
    msg: String,
    predicate: Option<CheckPredicate>,
    parents: Vec<Arc<Check>>,
    requires: Vec<Arc<Check>>,
}

impl CheckBuilder {
    pub fn predicate(mut self, predicate: CheckPredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Add a superseding check: if it passes, this check passes.
    pub fn parent(mut self, parent: Arc<Check>) -> Self {
        self.parents.push(parent);
        self
    }

    /// Add a required check: it must pass before the own predicate runs.
    pub fn requires(mut self, required: Arc<Check>) -> Self {
        self.requires.push(required);
        self
    }

    pub fn build(self) -> Arc<Check> {
        Arc::new(Check {
            name: self.name,
            msg: self.msg,
            // A check without a predicate degenerates to its chain.
            predicate: self
                .predicate
                .unwrap_or_else(|| sync_predicate(|_, _| true)),
            parents: self.parents,
            requires: self.requires,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(name: &str, result: bool, counter: Arc<AtomicUsize>) -> Arc<Check> {
        Check::builder(name, "")
            .predicate(sync_predicate(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                result
            }))
            .build()
    }

    fn fixed(name: &str, result: bool) -> Arc<Check> {
        Check::builder(name, "")
            .predicate(sync_predicate(move |_, _| result))
            .build()
    }

    async fn with_ctx<F, Fut>(f: F)
    where
        F: FnOnce(Arc<Context>) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        f(crate::context::test_support::bare_context()).await
    }

    #[tokio::test]
    async fn test_bare_predicate() {
        with_ctx(|ctx| async move {
            assert!(fixed("yes", true).passes(&ctx, &[]).await);
            assert!(!fixed("no", false).passes(&ctx, &[]).await);
        })
        .await;
    }

    #[tokio::test]
    async fn test_passing_parent_short_circuits() {
        with_ctx(|ctx| async move {
            let own = Arc::new(AtomicUsize::new(0));
            let check = Check::builder("child", "")
                .parent(fixed("parent", true))
                .requires(fixed("req", false))
                .predicate(sync_predicate({
                    let own = own.clone();
                    move |_, _| {
                        own.fetch_add(1, Ordering::SeqCst);
                        false
                    }
                }))
                .build();
            // Parent passes, so requires and the own predicate are skipped.
            assert!(check.passes(&ctx, &[]).await);
            assert_eq!(own.load(Ordering::SeqCst), 0);
        })
        .await;
    }

    #[tokio::test]
    async fn test_failing_require_short_circuits() {
        with_ctx(|ctx| async move {
            let second = Arc::new(AtomicUsize::new(0));
            let own = Arc::new(AtomicUsize::new(0));
            let check = Check::builder("child", "")
                .requires(fixed("first", false))
                .requires(counting("second", true, second.clone()))
                .predicate(sync_predicate({
                    let own = own.clone();
                    move |_, _| {
                        own.fetch_add(1, Ordering::SeqCst);
                        true
                    }
                }))
                .build();
            assert!(!check.passes(&ctx, &[]).await);
            assert_eq!(second.load(Ordering::SeqCst), 0);
            assert_eq!(own.load(Ordering::SeqCst), 0);
        })
        .await;
    }

    #[tokio::test]
    async fn test_require_surfaces_the_failed_check() {
        with_ctx(|ctx| async move {
            let check = Check::builder("denied", "nope")
                .predicate(sync_predicate(|_, _| false))
                .build();
            match check.require(&ctx, &[]).await {
                Err(CommandError::FailedCheck(failed)) => assert_eq!(failed.name, "denied"),
                other => panic!("expected FailedCheck, got {other:?}"),
            }
        })
        .await;
    }
}
