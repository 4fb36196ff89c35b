//! List Mounts
//!
//! A list mount keeps a container's children in step with a list of items.
//! It owns one [`MountPoint`] per child, parallel to the container, and
//! applies patches under an async mutex so that applications never
//! interleave.

use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::stream::{Stream, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{default_target_id, Container, HookReporter, MountPoint, Render};
use crate::diff::{self, DiffConfig, Patch};
use crate::error::{default_error_handler, ErrorHandler, MountError};
use crate::runtime::{Diagnostics, Scope};

type Differ<T> = dyn Fn(&[T], &[T], &DiffConfig) -> Vec<Patch<T>> + Send + Sync;

struct ListState<C: Container, T> {
    container: C,
    entries: Vec<MountPoint<C::Node>>,
    items: Vec<T>,
}

struct Inner<C: Container, T> {
    scope: Scope,
    reporter: Arc<HookReporter>,
    render: Box<Render<T, C::Node>>,
    differ: Box<Differ<T>>,
    config: DiffConfig,
    state: Mutex<ListState<C, T>>,
}

/// Renders a list of items into a container.
///
/// Handles are cheap to clone and share the same state.
///
/// Hooks must not apply patches to the list that is running them; the
/// application lock is held while hooks run.
pub struct ListMount<C: Container, T> {
    inner: Arc<Inner<C, T>>,
}

impl<C, T> ListMount<C, T>
where
    C: Container,
    T: Clone + Send + Sync + 'static,
{
    /// Start building a list mount.
    ///
    /// `identity` keys items for diffing; `render` turns an item into a node
    /// and may register hooks on the node's mount point.
    pub fn builder<K, I, R>(container: C, identity: I, render: R) -> ListMountBuilder<C, T>
    where
        K: PartialEq,
        I: Fn(&T) -> K + Send + Sync + 'static,
        R: Fn(&T, &MountPoint<C::Node>) -> C::Node + Send + Sync + 'static,
    {
        ListMountBuilder {
            container,
            id: default_target_id("list"),
            parent: None,
            render: Box::new(render),
            differ: Box::new(move |old: &[T], new: &[T], config: &DiffConfig| {
                diff::diff_with_config(old, new, &identity, config)
            }),
            config: DiffConfig::default(),
            error_handler: None,
            diagnostics: None,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    /// Apply `patches` in order.
    ///
    /// Stops at the first patch that does not fit the current list. Hook
    /// failures are reported and never stop the application.
    pub async fn apply_patches(&self, patches: Vec<Patch<T>>) -> Result<(), MountError> {
        let mut state = self.inner.state.lock().await;
        self.apply_locked(&mut state, patches).await
    }

    /// Diff `items` against the last rendered items and apply the result.
    pub async fn update(&self, items: Vec<T>) -> Result<(), MountError> {
        let mut state = self.inner.state.lock().await;
        let patches =
            (self.inner.differ)(state.items.as_slice(), items.as_slice(), &self.inner.config);
        self.apply_locked(&mut state, patches).await?;
        state.items = items;
        Ok(())
    }

    /// Render every list `source` yields.
    ///
    /// The task runs on the list's scope and stops with it, when `source`
    /// ends, or when an update fails.
    pub fn bind<S>(&self, source: S) -> JoinHandle<()>
    where
        S: Stream<Item = Vec<T>> + Send + 'static,
    {
        let list = self.clone();
        self.inner.scope.spawn(async move {
            let mut source = Box::pin(source);
            while let Some(items) = source.next().await {
                if let Err(error) = list.update(items).await {
                    debug!(
                        target_path = %list.inner.reporter.origin(),
                        %error,
                        "list binding stopped"
                    );
                    break;
                }
            }
        })
    }

    /// Forced teardown: cancel every scope and clear the container without
    /// running before-detach hooks. Hooks of an in-flight delete are
    /// interrupted, so this never waits on them.
    pub async fn teardown(&self) {
        self.inner.scope.cancel();

        let mut state = self.inner.state.lock().await;
        let ListState {
            container,
            entries,
            items,
        } = &mut *state;
        while !container.is_empty() {
            container.remove(container.len() - 1);
        }
        for entry in entries.drain(..) {
            entry.force_detach();
        }
        items.clear();
        debug!(target_path = %self.inner.reporter.origin(), "list torn down");
    }

    /// Run `f` against the container.
    pub async fn with_container<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.inner.state.lock().await.container)
    }

    /// Mount points of the current children, in container order.
    pub async fn mount_points(&self) -> Vec<MountPoint<C::Node>> {
        self.inner.state.lock().await.entries.clone()
    }

    /// The items currently rendered, in container order.
    pub async fn items(&self) -> Vec<T> {
        self.inner.state.lock().await.items.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.entries.len()
    }

    async fn apply_locked(
        &self,
        state: &mut ListState<C, T>,
        patches: Vec<Patch<T>>,
    ) -> Result<(), MountError> {
        trace!(
            target_path = %self.inner.reporter.origin(),
            patches = patches.len(),
            "applying patches"
        );
        self.ensure_live()?;
        for patch in patches {
            // A teardown may cancel the scope while a delete awaits its hooks.
            self.ensure_live()?;
            let len = state.entries.len();
            if !patch.fits(len) {
                return Err(MountError::InvalidPatch {
                    patch: patch.to_string(),
                    len,
                });
            }
            self.apply_one(state, patch).await;
        }
        Ok(())
    }

    async fn apply_one(&self, state: &mut ListState<C, T>, patch: Patch<T>) {
        match patch {
            Patch::Insert { element, index } => {
                let mount = self.mount_point();
                let node = (self.inner.render)(&element, &mount);

                state.container.insert(index, node.clone());
                state.entries.insert(index, mount.clone());
                state.items.insert(index, element);
                mount.attach(node);
            }
            Patch::InsertMany { elements, index } => {
                let rendered: Vec<_> = elements
                    .iter()
                    .map(|element| {
                        let mount = self.mount_point();
                        let node = (self.inner.render)(element, &mount);
                        (mount, node)
                    })
                    .collect();

                state
                    .container
                    .insert_many(index, rendered.iter().map(|(_, node)| node.clone()).collect());
                state
                    .entries
                    .splice(index..index, rendered.iter().map(|(mount, _)| mount.clone()));
                state.items.splice(index..index, elements);
                for (mount, node) in rendered {
                    mount.attach(node);
                }
            }
            Patch::Delete { start, count } => {
                let doomed: Vec<_> = state.entries[start..start + count].to_vec();
                join_all(doomed.iter().map(|mount| mount.run_before_detach())).await;

                for _ in 0..count {
                    state.container.remove(start);
                }
                state.entries.drain(start..start + count);
                state.items.drain(start..start + count);
                for mount in doomed {
                    mount.finish_detach();
                }
            }
            Patch::Move { from, to } => {
                state.container.relocate(from, to);
                let mount = state.entries.remove(from);
                state.entries.insert(to, mount);
                let item = state.items.remove(from);
                state.items.insert(to, item);
            }
        }
    }

    fn ensure_live(&self) -> Result<(), MountError> {
        if self.inner.scope.is_cancelled() {
            return Err(MountError::Cancelled {
                target: self.inner.reporter.origin().to_string(),
            });
        }
        Ok(())
    }

    fn mount_point(&self) -> MountPoint<C::Node> {
        MountPoint::new(&self.inner.scope, Arc::clone(&self.inner.reporter))
    }
}

impl<C: Container, T> Clone for ListMount<C, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Configures a [`ListMount`].
pub struct ListMountBuilder<C: Container, T> {
    container: C,
    id: String,
    parent: Option<Scope>,
    render: Box<Render<T, C::Node>>,
    differ: Box<Differ<T>>,
    config: DiffConfig,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    diagnostics: Option<Diagnostics>,
}

impl<C, T> ListMountBuilder<C, T>
where
    C: Container,
    T: Clone + Send + Sync + 'static,
{
    /// Id of the list's scope. Defaults to a unique `"list-<n>"`.
    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Parent scope; the list's scope is created as its child. Pass a mount
    /// point's scope to nest the list under that node.
    pub fn scope(mut self, parent: Scope) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn diff_config(mut self, config: DiffConfig) -> Self {
        self.config = config;
        self
    }

    pub fn error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Count hook failures in `diagnostics`. Requires a tokio runtime at
    /// [`build`](Self::build).
    pub fn diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn build(self) -> ListMount<C, T> {
        let scope = match &self.parent {
            Some(parent) => parent.child(&self.id),
            None => Scope::root(&self.id),
        };
        let probe = self
            .diagnostics
            .map(|diagnostics| diagnostics.register(scope.path(), &scope));
        let reporter = HookReporter::new(
            scope.path(),
            self.error_handler.unwrap_or_else(default_error_handler),
            probe,
        );

        ListMount {
            inner: Arc::new(Inner {
                scope,
                reporter: Arc::new(reporter),
                render: self.render,
                differ: self.differ,
                config: self.config,
                state: Mutex::new(ListState {
                    container: self.container,
                    entries: Vec::new(),
                    items: Vec::new(),
                }),
            }),
        }
    }
}
