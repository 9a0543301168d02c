//! Execution context subsystem.
//!
//! # Data Flow
//! ```text
//! Context::background()                root, never cancelled
//!     → with_value(Params)             same scope, new value head
//!     → with_cancel / with_timeout     child scope + CancelHandle
//!         → cancel() / drop(handle)    child and its descendants stop
//! ```
//!
//! # Design Decisions
//! - A context is immutable; every "change" returns a new handle
//! - Cancellation is monotonic and broadcast via token listeners
//! - Deadlines are a refinement of cancellation (auto-cancel at a time)
//! - Values are keyed by type, so no global key registry is needed

mod cancel;
mod values;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use self::cancel::CancelScope;
use self::values::ValueNode;

pub use self::cancel::{CancelHandle, ContextError};

/// Handle to one logical operation's lifetime and its request-scoped values.
///
/// Cloning is cheap and every clone observes the same cancellation.
#[derive(Clone)]
pub struct Context {
    scope: Arc<CancelScope>,
    values: Option<Arc<ValueNode>>,
}

impl Context {
    /// The root context: never cancelled, no deadline, no values.
    pub fn background() -> Self {
        Self {
            scope: Arc::new(CancelScope::root()),
            values: None,
        }
    }

    /// Derive a cancellable child. The child inherits values, deadline
    /// and cancellation from `parent`; cancelling the returned handle
    /// only stops the child and what is derived from it.
    pub fn with_cancel(parent: &Context) -> (Context, CancelHandle) {
        Self::derive(parent, None)
    }

    /// Derive a child that is cancelled automatically at `deadline`.
    pub fn with_deadline(parent: &Context, deadline: Instant) -> (Context, CancelHandle) {
        Self::derive(parent, Some(deadline))
    }

    /// Derive a child that is cancelled automatically after `timeout`.
    ///
    /// A timeout too large to represent as an `Instant` sets no deadline
    /// of its own; the parent's deadline still applies.
    pub fn with_timeout(parent: &Context, timeout: Duration) -> (Context, CancelHandle) {
        Self::derive(parent, Instant::now().checked_add(timeout))
    }

    fn derive(parent: &Context, deadline: Option<Instant>) -> (Context, CancelHandle) {
        let scope = Arc::new(CancelScope::child(&parent.scope, deadline));
        let ctx = Context {
            scope: Arc::clone(&scope),
            values: parent.values.clone(),
        };
        (ctx, CancelHandle::new(scope))
    }

    /// Return a context carrying `value`, sharing this context's cancellation.
    pub fn with_value<T>(&self, value: T) -> Context
    where
        T: Send + Sync + 'static,
    {
        Context {
            scope: Arc::clone(&self.scope),
            values: Some(ValueNode::push(self.values.clone(), value)),
        }
    }

    /// Look up the most recently stored value of type `T`.
    pub fn value<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.values.as_deref().and_then(|node| node.get::<T>())
    }

    /// True once the context was cancelled or its deadline passed.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// `None` while live, otherwise the first recorded cause.
    pub fn err(&self) -> Option<ContextError> {
        self.scope.err()
    }

    /// The effective deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.scope.deadline()
    }

    /// Wait until the context is done.
    pub async fn done(&self) {
        self.scope.done().await;
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("err", &self.err())
            .field("deadline", &self.deadline())
            .field("values", &self.values.as_deref().map_or(0, ValueNode::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_is_live() {
        let ctx = Context::background();
        assert!(!ctx.is_done());
        assert_eq!(ctx.err(), None);
        assert_eq!(ctx.deadline(), None);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (ctx, handle) = Context::with_cancel(&Context::background());
        handle.cancel();
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
        handle.cancel();
        handle.cancel();
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }

    #[test]
    fn test_parent_cancel_reaches_children_derived_before_and_after() {
        let (parent, handle) = Context::with_cancel(&Context::background());
        let (before, _before_handle) = Context::with_cancel(&parent);
        let (grandchild, _gc_handle) = Context::with_cancel(&before);

        handle.cancel();

        let (after, _after_handle) = Context::with_cancel(&parent);
        assert!(before.is_done());
        assert!(grandchild.is_done());
        assert!(after.is_done());
        assert_eq!(grandchild.err(), Some(ContextError::Canceled));
    }

    #[test]
    fn test_child_cancel_does_not_reach_parent() {
        let (parent, _handle) = Context::with_cancel(&Context::background());
        let (child, child_handle) = Context::with_cancel(&parent);
        child_handle.cancel();
        assert!(child.is_done());
        assert!(!parent.is_done());
    }

    #[test]
    fn test_dropping_handle_releases_scope() {
        let (ctx, handle) = Context::with_cancel(&Context::background());
        drop(handle);
        assert_eq!(ctx.err(), Some(ContextError::Canceled));
    }

    #[test]
    fn test_expired_deadline_reports_deadline_exceeded() {
        let past = Instant::now() - Duration::from_millis(1);
        let (ctx, _handle) = Context::with_deadline(&Context::background(), past);
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[test]
    fn test_first_cause_wins() {
        let past = Instant::now() - Duration::from_millis(1);
        let (ctx, handle) = Context::with_deadline(&Context::background(), past);
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
        handle.cancel();
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[test]
    fn test_child_inherits_earlier_deadline() {
        let soon = Instant::now() + Duration::from_secs(1);
        let (parent, _h1) = Context::with_deadline(&Context::background(), soon);
        let (child, _h2) = Context::with_timeout(&parent, Duration::from_secs(60));
        assert_eq!(child.deadline(), Some(soon));
    }

    #[test]
    fn test_values_shadow_and_inherit() {
        #[derive(Debug, PartialEq)]
        struct User(&'static str);

        let ctx = Context::background().with_value(User("alice")).with_value(7u32);
        let ctx = ctx.with_value(User("bob"));
        assert_eq!(ctx.value::<User>(), Some(&User("bob")));
        assert_eq!(ctx.value::<u32>(), Some(&7));
        assert_eq!(ctx.value::<String>(), None);

        let (child, _handle) = Context::with_cancel(&ctx);
        assert_eq!(child.value::<User>(), Some(&User("bob")));
    }

    #[test]
    fn test_value_context_shares_cancellation() {
        let (ctx, handle) = Context::with_cancel(&Context::background());
        let with_value = ctx.with_value("payload");
        handle.cancel();
        assert!(with_value.is_done());
    }

    #[tokio::test]
    async fn test_done_resolves_on_cancel() {
        let (ctx, handle) = Context::with_cancel(&Context::background());
        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.done().await })
        };
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("done() did not resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_done_resolves_on_deadline() {
        let (ctx, _handle) = Context::with_timeout(&Context::background(), Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(1), ctx.done())
            .await
            .expect("deadline did not fire");
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_parent_deadline_is_observed_by_child() {
        let (parent, _h1) = Context::with_timeout(&Context::background(), Duration::from_millis(10));
        let (child, _h2) = Context::with_cancel(&parent);
        tokio::time::timeout(Duration::from_secs(1), child.done())
            .await
            .expect("child did not observe parent deadline");
        assert_eq!(child.err(), Some(ContextError::DeadlineExceeded));
    }

    #[test]
    fn test_unrepresentable_timeout_sets_no_deadline() {
        let (ctx, _handle) = Context::with_timeout(&Context::background(), Duration::MAX);
        assert_eq!(ctx.deadline(), None);
        assert_eq!(ctx.err(), None);

        let (parent, _h1) = Context::with_timeout(&Context::background(), Duration::from_secs(5));
        let (child, _h2) = Context::with_timeout(&parent, Duration::MAX);
        assert_eq!(child.deadline(), parent.deadline());
    }
}
