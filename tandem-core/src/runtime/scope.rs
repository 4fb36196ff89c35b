//! Cancellation Scopes
//!
//! A scope is a node in a tree of cancellation tokens. Stores, list mounts
//! and mount points each own one, created as a child of whatever owns them.
//! Cancelling a scope cancels its whole subtree, which stops queue workers,
//! closes data streams and ends every task spawned on the subtree.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A structured cancellation scope.
///
/// Cloning a scope yields a handle to the same node, not a child.
#[derive(Clone, Debug)]
pub struct Scope {
    token: CancellationToken,
    path: Arc<str>,
}

impl Scope {
    /// Create a root scope with no parent.
    pub fn root(id: &str) -> Self {
        Self {
            token: CancellationToken::new(),
            path: Arc::from(id),
        }
    }

    /// Create a child scope. It is cancelled when `self` is.
    pub fn child(&self, id: &str) -> Self {
        Self {
            token: self.token.child_token(),
            path: Arc::from(format!("{}.{}", self.path, id)),
        }
    }

    /// Dot-joined ids from the root down to this scope.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Cancel this scope and every scope below it.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!(scope = %self.path, "cancelling scope");
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once this scope (or an ancestor) is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// An owned handle to the underlying token, for moving into tasks.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawn a task that is dropped when this scope is cancelled.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = task => {}
            }
        })
    }

    /// Run `f` once this scope is cancelled.
    pub fn on_cancel<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            f();
        });
    }
}
