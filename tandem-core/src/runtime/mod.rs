//! Runtime
//!
//! The runtime is the application root. It owns the root [`Scope`], the
//! shared error handler, the optional [`Diagnostics`] registry and the
//! configuration, and wires all of them into the stores and mounts it
//! creates. Nothing here is global: two runtimes in one process are fully
//! independent.
//!
//! # Example
//!
//! ```rust,ignore
//! let runtime = Runtime::new(RuntimeConfig::default());
//! let todos = runtime.store("todos", Vec::<Todo>::new());
//! let list = runtime.list_mount(container, |t: &Todo| t.id, render).build();
//! list.bind(todos.data());
//!
//! // later
//! runtime.shutdown();
//! ```

mod diagnostics;
mod scope;

use std::sync::Arc;

use tracing::debug;

pub use diagnostics::{Diagnostics, Probe, Stats};
pub use scope::Scope;

use crate::config::RuntimeConfig;
use crate::error::{default_error_handler, ErrorHandler};
use crate::mount::{Container, ListMountBuilder, MountPoint, SlotMountBuilder};
use crate::mount::{ListMount, SlotMount};
use crate::store::RootStore;

/// Owner of every store and mount of one application.
#[derive(Clone)]
pub struct Runtime {
    config: RuntimeConfig,
    scope: Scope,
    diagnostics: Option<Diagnostics>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        let scope = Scope::root(&config.root_id);
        let diagnostics = config.diagnostics.then(Diagnostics::new);
        debug!(root = %config.root_id, diagnostics = config.diagnostics, "runtime created");

        Self {
            config,
            scope,
            diagnostics,
            error_handler: default_error_handler(),
        }
    }

    /// Replace the error handler given to everything created from now on.
    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = handler;
        self
    }

    /// Create a root store under the runtime's scope.
    ///
    /// Must be called inside a tokio runtime.
    pub fn store<D>(&self, id: &str, initial: D) -> RootStore<D>
    where
        D: Clone + Send + Sync + 'static,
    {
        let mut builder = RootStore::builder(id, initial)
            .scope(self.scope.child(id))
            .error_handler(Arc::clone(&self.error_handler))
            .trace_commits(self.config.store.trace_commits);
        if let Some(diagnostics) = &self.diagnostics {
            builder = builder.diagnostics(diagnostics.clone());
        }
        builder.spawn()
    }

    /// Start a list mount under the runtime's scope, using the runtime's
    /// diff settings and error handler.
    pub fn list_mount<C, T, K, I, R>(
        &self,
        container: C,
        identity: I,
        render: R,
    ) -> ListMountBuilder<C, T>
    where
        C: Container,
        T: Clone + Send + Sync + 'static,
        K: PartialEq,
        I: Fn(&T) -> K + Send + Sync + 'static,
        R: Fn(&T, &MountPoint<C::Node>) -> C::Node + Send + Sync + 'static,
    {
        let mut builder = ListMount::builder(container, identity, render)
            .scope(self.scope.clone())
            .diff_config(self.config.diff.clone())
            .error_handler(Arc::clone(&self.error_handler));
        if let Some(diagnostics) = &self.diagnostics {
            builder = builder.diagnostics(diagnostics.clone());
        }
        builder
    }

    /// Start a slot mount under the runtime's scope.
    pub fn slot_mount<C, T, R>(&self, container: C, render: R) -> SlotMountBuilder<C, T>
    where
        C: Container,
        T: Send + Sync + 'static,
        R: Fn(&T, &MountPoint<C::Node>) -> C::Node + Send + Sync + 'static,
    {
        let mut builder = SlotMount::builder(container, render)
            .scope(self.scope.clone())
            .error_handler(Arc::clone(&self.error_handler));
        if let Some(diagnostics) = &self.diagnostics {
            builder = builder.diagnostics(diagnostics.clone());
        }
        builder
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        self.diagnostics.as_ref()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Cancel every store and mount created by this runtime.
    pub fn shutdown(&self) {
        debug!(root = %self.config.root_id, "runtime shutting down");
        self.scope.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.scope.is_cancelled()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("scope", &self.scope.path())
            .finish()
    }
}
