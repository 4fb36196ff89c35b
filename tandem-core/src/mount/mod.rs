//! Mounting
//!
//! This module applies list patches to a [`Container`] and runs the
//! lifecycle hooks of every node it renders.
//!
//! # Lifecycle
//!
//! Each rendered node gets a [`MountPoint`]. Code rendering the node
//! registers hooks on it:
//!
//! - after-attach hooks run, in registration order, once the node is in its
//!   container;
//! - before-detach hooks run, in registration order, before the node is
//!   removed, and may be asynchronous (an exit animation, say). Removal waits
//!   for them.
//!
//! A mount point moves through [`MountState::Pending`], `Attached`,
//! `Detaching` and `Detached`. Its [`Scope`](crate::runtime::Scope) is a
//! child of the owning mount's scope, so anything nested under a node
//! (another list, a slot, a listener task) is cancelled with it.
//!
//! Forced teardown skips before-detach hooks and interrupts any that are
//! already running. Delete patches never skip them.
//!
//! # Failures
//!
//! A failing or panicking hook is reported and skipped. Sibling hooks and
//! later patches still run, and a node whose before-detach hook failed is
//! removed anyway.

pub mod container;
mod list;
mod mount_point;
mod slot;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

pub use container::{Container, VecContainer};
pub use list::{ListMount, ListMountBuilder};
pub use mount_point::{AfterAttach, BeforeDetach, MountPoint};
pub use slot::{SlotMount, SlotMountBuilder};

use crate::error::{ErrorHandler, HookError, TandemError};
use crate::runtime::Probe;

/// Unique identifier of a mount point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MountId(u64);

impl MountId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Scope id of a mount target built without an explicit id, unique per
/// process so that sibling targets never share a scope path.
fn default_target_id(kind: &str) -> String {
    format!("{kind}-{}", MountId::next().raw())
}

impl fmt::Display for MountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Where a mount point is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MountState {
    /// Rendered, not yet in the container.
    Pending,
    /// In the container; after-attach hooks have run.
    Attached,
    /// Before-detach hooks are running.
    Detaching,
    /// Removed, or its scope was cancelled.
    Detached,
}

/// Turns an item into a node, registering hooks on its mount point.
pub(crate) type Render<T, N> = dyn Fn(&T, &MountPoint<N>) -> N + Send + Sync;

/// Routes hook failures of one mount target to its error handler.
pub(crate) struct HookReporter {
    origin: String,
    handler: Arc<dyn ErrorHandler>,
    probe: Option<Probe>,
}

impl HookReporter {
    pub(crate) fn new(origin: &str, handler: Arc<dyn ErrorHandler>, probe: Option<Probe>) -> Self {
        Self {
            origin: origin.to_string(),
            handler,
            probe,
        }
    }

    pub(crate) fn origin(&self) -> &str {
        &self.origin
    }

    pub(crate) fn report(&self, error: HookError) {
        warn!(target_path = %self.origin, %error, "hook failed");
        if let Some(probe) = &self.probe {
            probe.hook_failure();
        }
        self.handler.on_error(&self.origin, &TandemError::Hook(error));
    }
}

impl fmt::Debug for HookReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookReporter")
            .field("origin", &self.origin)
            .finish()
    }
}
