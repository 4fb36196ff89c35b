//! Mount Points
//!
//! A mount point carries the lifecycle hooks and the cancellation scope of
//! one rendered node. Mount targets drive it; rendering code only registers
//! hooks.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::{HookReporter, MountId, MountState};
use crate::error::{BoxError, HookError};
use crate::runtime::Scope;
use crate::store::panic_message;

/// Runs once the node is in its container.
pub type AfterAttach<N> = Box<dyn FnOnce(&N) -> Result<(), BoxError> + Send>;

/// Runs before the node is removed; removal waits for the returned future.
pub type BeforeDetach<N> = Box<dyn FnOnce(N) -> BoxFuture<'static, Result<(), BoxError>> + Send>;

struct Lifecycle<N> {
    state: MountState,
    node: Option<N>,
    after_attach: SmallVec<[AfterAttach<N>; 2]>,
    before_detach: SmallVec<[BeforeDetach<N>; 2]>,
}

struct Inner<N> {
    id: MountId,
    scope: Scope,
    reporter: Arc<HookReporter>,
    lifecycle: Mutex<Lifecycle<N>>,
}

/// Lifecycle handle of one rendered node.
///
/// Clones refer to the same mount point.
pub struct MountPoint<N> {
    inner: Arc<Inner<N>>,
}

impl<N> MountPoint<N>
where
    N: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(parent: &Scope, reporter: Arc<HookReporter>) -> Self {
        let id = MountId::next();
        let scope = parent.child(&id.to_string());
        Self {
            inner: Arc::new(Inner {
                id,
                scope,
                reporter,
                lifecycle: Mutex::new(Lifecycle {
                    state: MountState::Pending,
                    node: None,
                    after_attach: SmallVec::new(),
                    before_detach: SmallVec::new(),
                }),
            }),
        }
    }

    pub fn id(&self) -> MountId {
        self.inner.id
    }

    /// Scope of this node. Cancelled once the node is detached.
    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    pub fn state(&self) -> MountState {
        if self.inner.scope.is_cancelled() {
            return MountState::Detached;
        }
        self.inner.lifecycle.lock().state
    }

    /// The rendered node, while attached.
    pub fn node(&self) -> Option<N> {
        self.inner.lifecycle.lock().node.clone()
    }

    /// Register a hook to run once the node is attached.
    ///
    /// On an already attached mount point the hook runs immediately. On a
    /// detaching or detached one it is dropped.
    pub fn after_attach<F>(&self, hook: F)
    where
        F: FnOnce(&N) -> Result<(), BoxError> + Send + 'static,
    {
        let mut lifecycle = self.inner.lifecycle.lock();
        let state = lifecycle.state;
        match state {
            MountState::Pending => lifecycle.after_attach.push(Box::new(hook)),
            MountState::Attached => {
                let node = lifecycle.node.clone();
                drop(lifecycle);
                if let Some(node) = node {
                    self.run_after_attach(&node, Box::new(hook));
                }
            }
            MountState::Detaching | MountState::Detached => {
                debug!(mount = %self.inner.id, "after-attach hook dropped on detached mount");
            }
        }
    }

    /// Like [`after_attach`](Self::after_attach), passing `payload` to the hook.
    pub fn after_attach_with<P, F>(&self, payload: P, hook: F)
    where
        P: Send + 'static,
        F: FnOnce(&N, P) -> Result<(), BoxError> + Send + 'static,
    {
        self.after_attach(move |node: &N| hook(node, payload));
    }

    /// Register a hook to run before the node is removed.
    ///
    /// Dropped if the node is already detaching.
    pub fn before_detach<F, Fut>(&self, hook: F)
    where
        F: FnOnce(N) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let mut lifecycle = self.inner.lifecycle.lock();
        let state = lifecycle.state;
        match state {
            MountState::Pending | MountState::Attached => lifecycle
                .before_detach
                .push(Box::new(move |node: N| hook(node).boxed())),
            MountState::Detaching | MountState::Detached => {
                debug!(mount = %self.inner.id, "before-detach hook dropped on detached mount");
            }
        }
    }

    /// Like [`before_detach`](Self::before_detach), passing `payload` to the hook.
    pub fn before_detach_with<P, F, Fut>(&self, payload: P, hook: F)
    where
        P: Send + 'static,
        F: FnOnce(N, P) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.before_detach(move |node: N| hook(node, payload));
    }

    /// Mark attached and run the after-attach hooks in order.
    pub(crate) fn attach(&self, node: N) {
        let hooks = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state != MountState::Pending {
                return;
            }
            lifecycle.state = MountState::Attached;
            lifecycle.node = Some(node.clone());
            std::mem::take(&mut lifecycle.after_attach)
        };

        trace!(mount = %self.inner.id, hooks = hooks.len(), "attached");
        for hook in hooks {
            self.run_after_attach(&node, hook);
        }
    }

    fn run_after_attach(&self, node: &N, hook: AfterAttach<N>) {
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| hook(node)))
            .unwrap_or_else(|panic| Err(panicked(panic)));
        if let Err(source) = outcome {
            self.inner.reporter.report(HookError::AfterAttach {
                mount: self.inner.id,
                source,
            });
        }
    }

    /// Mark detaching and run the before-detach hooks one after another.
    ///
    /// A failing hook is reported and the next one still runs. Cancelling
    /// the mount point's scope interrupts the running hook and skips the
    /// rest, so a forced teardown never waits on an exit animation.
    pub(crate) async fn run_before_detach(&self) {
        let (node, hooks) = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if matches!(lifecycle.state, MountState::Detaching | MountState::Detached) {
                return;
            }
            lifecycle.state = MountState::Detaching;
            lifecycle.after_attach.clear();
            (
                lifecycle.node.clone(),
                std::mem::take(&mut lifecycle.before_detach),
            )
        };

        // A node that never attached has nothing to clean up.
        let Some(node) = node else { return };

        trace!(mount = %self.inner.id, hooks = hooks.len(), "detaching");
        let scope = &self.inner.scope;
        for hook in hooks {
            if scope.is_cancelled() {
                debug!(mount = %self.inner.id, "scope cancelled, skipping before-detach hooks");
                break;
            }
            let pending = std::panic::catch_unwind(AssertUnwindSafe(|| hook(node.clone())));
            let outcome = match pending {
                Ok(future) => {
                    tokio::select! {
                        biased;
                        _ = scope.cancelled() => {
                            debug!(mount = %self.inner.id, "before-detach hook interrupted");
                            break;
                        }
                        outcome = AssertUnwindSafe(future).catch_unwind() => {
                            outcome.unwrap_or_else(|panic| Err(panicked(panic)))
                        }
                    }
                }
                Err(panic) => Err(panicked(panic)),
            };
            if let Err(source) = outcome {
                self.inner.reporter.report(HookError::BeforeDetach {
                    mount: self.inner.id,
                    source,
                });
            }
        }
    }

    /// Mark detached, drop the node and hooks, and cancel the scope.
    pub(crate) fn finish_detach(&self) {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            lifecycle.state = MountState::Detached;
            lifecycle.node = None;
            lifecycle.after_attach.clear();
            lifecycle.before_detach.clear();
        }
        self.inner.scope.cancel();
        trace!(mount = %self.inner.id, "detached");
    }

    /// Detach without running before-detach hooks.
    pub(crate) fn force_detach(&self) {
        self.finish_detach();
    }
}

impl<N> Clone for MountPoint<N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<N> std::fmt::Debug for MountPoint<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountPoint")
            .field("id", &self.inner.id)
            .field("scope", &self.inner.scope.path())
            .finish()
    }
}

fn panicked(panic: Box<dyn std::any::Any + Send>) -> BoxError {
    format!("hook panicked: {}", panic_message(panic)).into()
}
