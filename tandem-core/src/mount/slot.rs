//! Slot Mounts
//!
//! A slot shows one rendered node for the latest value of a stream. It is
//! the single-value counterpart of a list mount: each new value replaces
//! the content, and the old content's before-detach hooks finish before the
//! new content is attached.

use std::sync::Arc;

use futures_util::stream::{Stream, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{default_target_id, Container, HookReporter, MountPoint, Render};
use crate::error::{default_error_handler, ErrorHandler, FocusError, MountError};
use crate::runtime::{Diagnostics, Scope};

struct SlotState<C: Container> {
    container: C,
    content: Option<MountPoint<C::Node>>,
}

struct Inner<C: Container, T> {
    scope: Scope,
    reporter: Arc<HookReporter>,
    render: Box<Render<T, C::Node>>,
    state: Mutex<SlotState<C>>,
}

/// Renders the latest value of a stream into a dedicated container.
///
/// The slot's content is always the container's only child.
pub struct SlotMount<C: Container, T> {
    inner: Arc<Inner<C, T>>,
}

impl<C, T> SlotMount<C, T>
where
    C: Container,
    T: Send + Sync + 'static,
{
    pub fn builder<R>(container: C, render: R) -> SlotMountBuilder<C, T>
    where
        R: Fn(&T, &MountPoint<C::Node>) -> C::Node + Send + Sync + 'static,
    {
        SlotMountBuilder {
            container,
            id: default_target_id("slot"),
            parent: None,
            render: Box::new(render),
            error_handler: None,
            diagnostics: None,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    /// Replace the content with a rendering of `value`.
    pub async fn show(&self, value: T) -> Result<(), MountError> {
        let mut state = self.inner.state.lock().await;
        self.ensure_live()?;
        self.unmount(&mut state).await;
        // A teardown may have cancelled the slot while the old content left.
        self.ensure_live()?;

        let mount = MountPoint::new(&self.inner.scope, Arc::clone(&self.inner.reporter));
        let node = (self.inner.render)(&value, &mount);
        state.container.insert(0, node.clone());
        state.content = Some(mount.clone());
        mount.attach(node);
        Ok(())
    }

    /// Unmount the content, running its before-detach hooks.
    pub async fn clear(&self) -> Result<(), MountError> {
        let mut state = self.inner.state.lock().await;
        self.ensure_live()?;
        self.unmount(&mut state).await;
        Ok(())
    }

    /// Show every value `source` yields.
    pub fn bind<S>(&self, source: S) -> JoinHandle<()>
    where
        S: Stream<Item = T> + Send + 'static,
    {
        let slot = self.clone();
        self.inner.scope.spawn(async move {
            let mut source = Box::pin(source);
            while let Some(value) = source.next().await {
                if slot.show(value).await.is_err() {
                    break;
                }
            }
        })
    }

    /// Show every value of a derived store's [`watch`](crate::store::SubStore::watch)
    /// stream. When the focus is lost the content is unmounted, with its
    /// before-detach hooks, and the binding ends.
    pub fn bind_watch<S>(&self, source: S) -> JoinHandle<()>
    where
        S: Stream<Item = Result<T, FocusError>> + Send + 'static,
    {
        let slot = self.clone();
        self.inner.scope.spawn(async move {
            let mut source = Box::pin(source);
            while let Some(item) = source.next().await {
                match item {
                    Ok(value) => {
                        if slot.show(value).await.is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        debug!(
                            target_path = %slot.inner.reporter.origin(),
                            %error,
                            "focus lost, unmounting slot"
                        );
                        let _ = slot.clear().await;
                        break;
                    }
                }
            }
        })
    }

    /// Forced teardown: cancel the slot's scope and remove the content
    /// without running before-detach hooks. Hooks already running are
    /// interrupted.
    pub async fn teardown(&self) {
        self.inner.scope.cancel();

        let mut state = self.inner.state.lock().await;
        if let Some(mount) = state.content.take() {
            state.container.remove(0);
            mount.force_detach();
        }
    }

    /// The current content's mount point.
    pub async fn mount_point(&self) -> Option<MountPoint<C::Node>> {
        self.inner.state.lock().await.content.clone()
    }

    pub async fn with_container<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.inner.state.lock().await.container)
    }

    fn ensure_live(&self) -> Result<(), MountError> {
        if self.inner.scope.is_cancelled() {
            return Err(MountError::Cancelled {
                target: self.inner.reporter.origin().to_string(),
            });
        }
        Ok(())
    }

    async fn unmount(&self, state: &mut SlotState<C>) {
        if let Some(mount) = state.content.take() {
            mount.run_before_detach().await;
            state.container.remove(0);
            mount.finish_detach();
        }
    }
}

impl<C: Container, T> Clone for SlotMount<C, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Configures a [`SlotMount`].
pub struct SlotMountBuilder<C: Container, T> {
    container: C,
    id: String,
    parent: Option<Scope>,
    render: Box<Render<T, C::Node>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    diagnostics: Option<Diagnostics>,
}

impl<C, T> SlotMountBuilder<C, T>
where
    C: Container,
    T: Send + Sync + 'static,
{
    /// Id of the slot's scope. Defaults to a unique `"slot-<n>"`.
    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Parent scope; the slot's scope is created as its child.
    pub fn scope(mut self, parent: Scope) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn build(self) -> SlotMount<C, T> {
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

        SlotMount {
            inner: Arc::new(Inner {
                scope,
                reporter: Arc::new(reporter),
                render: self.render,
                state: Mutex::new(SlotState {
                    container: self.container,
                    content: None,
                }),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::{MountState, VecContainer};
    use crate::store::{ListStore, RootStore, Store};
    use parking_lot::Mutex as SyncMutex;
    use std::time::Duration;

    type Log = Arc<SyncMutex<Vec<String>>>;

    fn logging_slot(
        view: &VecContainer<String>,
        log: &Log,
    ) -> SlotMount<VecContainer<String>, String> {
        let log = log.clone();
        SlotMount::builder(view.clone(), move |text: &String, mount: &MountPoint<String>| {
            let attach = log.clone();
            mount.after_attach(move |node: &String| {
                attach.lock().push(format!("attach {node}"));
                Ok(())
            });
            let detach = log.clone();
            mount.before_detach(move |node: String| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                detach.lock().push(format!("detach {node}"));
                Ok(())
            });
            format!("<p>{text}</p>")
        })
        .build()
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(check());
    }

    #[tokio::test]
    async fn new_value_replaces_content_after_detach() {
        let view = VecContainer::new();
        let log: Log = Arc::default();
        let slot = logging_slot(&view, &log);

        slot.show("a".to_string()).await.unwrap();
        let first = slot.mount_point().await.unwrap();
        slot.show("b".to_string()).await.unwrap();

        assert_eq!(view.nodes(), ["<p>b</p>"]);
        assert_eq!(first.state(), MountState::Detached);
        assert_eq!(
            log.lock().as_slice(),
            ["attach <p>a</p>", "detach <p>a</p>", "attach <p>b</p>"]
        );
    }

    #[tokio::test]
    async fn focus_loss_unmounts_and_stops() {
        #[derive(Debug, Clone, PartialEq)]
        struct Todo {
            id: u32,
            text: String,
        }

        let view = VecContainer::new();
        let log: Log = Arc::default();
        let slot = logging_slot(&view, &log);
        let todos = RootStore::new(
            "todos",
            vec![
                Todo {
                    id: 1,
                    text: "milk".into(),
                },
                Todo {
                    id: 2,
                    text: "eggs".into(),
                },
            ],
        );
        let second = todos.map_key(|t: &Todo| t.id, 2);
        let text = second.watch().map(|item| item.map(|t| t.text));
        let binding = slot.bind_watch(text);

        eventually(|| view.nodes() == ["<p>eggs</p>"]).await;

        todos
            .update(|list| list.into_iter().filter(|t| t.id != 2).collect())
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), binding)
            .await
            .unwrap()
            .unwrap();

        assert!(view.nodes().is_empty());
        assert_eq!(
            log.lock().as_slice(),
            ["attach <p>eggs</p>", "detach <p>eggs</p>"]
        );
        assert!(slot.mount_point().await.is_none());
    }

    #[tokio::test]
    async fn teardown_skips_hooks_and_cancels_nested_scopes() {
        let view = VecContainer::new();
        let log: Log = Arc::default();
        let parent = Scope::root("page");
        let slot = SlotMount::builder(view.clone(), {
            let log = log.clone();
            move |text: &String, mount: &MountPoint<String>| {
                let log = log.clone();
                mount.before_detach(move |_: String| async move {
                    log.lock().push("detach".into());
                    Ok(())
                });
                text.clone()
            }
        })
        .id("header")
        .scope(parent.clone())
        .build();
        assert_eq!(slot.scope().path(), "page.header");

        slot.show("title".to_string()).await.unwrap();
        let mount = slot.mount_point().await.unwrap();
        let nested = mount.scope().child("badge");

        slot.teardown().await;

        assert!(log.lock().is_empty());
        assert!(view.nodes().is_empty());
        assert!(nested.is_cancelled());
        assert!(matches!(
            slot.show("again".to_string()).await,
            Err(MountError::Cancelled { .. })
        ));
    }

    #[tokio::test]
    async fn teardown_interrupts_a_pending_replacement() {
        let view = VecContainer::new();
        let slot = SlotMount::builder(view.clone(), |text: &String, mount: &MountPoint<String>| {
            mount.before_detach(|_: String| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            });
            text.clone()
        })
        .build();
        slot.show("old".to_string()).await.unwrap();

        let replacing = tokio::spawn({
            let slot = slot.clone();
            async move { slot.show("new".to_string()).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(2), slot.teardown())
            .await
            .expect("teardown waited on a before-detach hook");
        let outcome = tokio::time::timeout(Duration::from_secs(2), replacing)
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(outcome, Err(MountError::Cancelled { .. })));
        assert!(view.nodes().is_empty());
        assert!(slot.mount_point().await.is_none());
    }

    #[tokio::test]
    async fn parent_cancellation_ends_binding() {
        let view = VecContainer::new();
        let parent = Scope::root("page");
        let slot = SlotMount::builder(view.clone(), |n: &u32, _: &MountPoint<String>| n.to_string())
            .scope(parent.clone())
            .build();
        let counter = RootStore::new("n", 0u32);
        let binding = slot.bind(counter.data());

        counter.set(3).unwrap();
        eventually(|| view.nodes() == ["3"]).await;

        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), binding)
            .await
            .unwrap()
            .unwrap();
        assert!(slot.scope().is_cancelled());
    }
}
