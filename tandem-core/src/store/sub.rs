//! Derived stores.

use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::stream::{self, BoxStream, StreamExt};
use tracing::debug;

use super::{Lens, Store, Update};
use crate::error::{BoxError, FocusError, StoreError};
use crate::runtime::Scope;

/// A store that reads and writes its parent through a lens.
///
/// Updates are forwarded to the parent, so they take their place in the
/// root's queue and commit in the root's order.
pub struct SubStore<P, D> {
    parent: Arc<dyn Store<P>>,
    lens: Lens<P, D>,
    path: String,
    scope: Scope,
}

impl<P, D> SubStore<P, D>
where
    P: Clone + Send + Sync + 'static,
    D: Clone + Send + Sync + PartialEq + 'static,
{
    pub fn new(parent: Arc<dyn Store<P>>, lens: Lens<P, D>) -> Self {
        let path = format!("{}.{}", parent.path(), lens.id());
        let scope = parent.scope().child(lens.id());
        Self {
            parent,
            lens,
            path,
            scope,
        }
    }

    /// Like [`data`](Store::data), but ends with `Err` when the focus is lost.
    ///
    /// Distinguishes "my element was removed" from "my scope was cancelled",
    /// which both end the plain data stream.
    pub fn watch(&self) -> BoxStream<'static, Result<D, FocusError>> {
        let source = self.parent.data();
        let lens = self.lens.clone();

        stream::unfold(
            (source, lens, None::<D>, false),
            |(mut source, lens, mut last, lost)| async move {
                if lost {
                    return None;
                }
                loop {
                    let parent = source.next().await?;
                    match lens.get(&parent) {
                        Ok(value) if last.as_ref() == Some(&value) => continue,
                        Ok(value) => {
                            last = Some(value.clone());
                            return Some((Ok(value), (source, lens, last, false)));
                        }
                        Err(error) => return Some((Err(error), (source, lens, last, true))),
                    }
                }
            },
        )
        .boxed()
    }
}

impl<P, D> Clone for SubStore<P, D> {
    fn clone(&self) -> Self {
        Self {
            parent: Arc::clone(&self.parent),
            lens: self.lens.clone(),
            path: self.path.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<P, D> std::fmt::Debug for SubStore<P, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubStore").field("path", &self.path).finish()
    }
}

impl<P, D> Store<D> for SubStore<P, D>
where
    P: Clone + Send + Sync + 'static,
    D: Clone + Send + Sync + PartialEq + 'static,
{
    fn id(&self) -> &str {
        self.lens.id()
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn current(&self) -> Result<D, StoreError> {
        let parent = self.parent.current()?;
        Ok(self.lens.get(&parent)?)
    }

    fn enqueue(&self, update: Update<D>) -> Result<(), StoreError> {
        if self.scope.is_cancelled() {
            return Err(StoreError::Closed {
                store: self.path.clone(),
            });
        }
        let lens = self.lens.clone();
        self.parent.enqueue(Box::new(move |parent: P| {
            async move {
                let focus = lens.get(&parent)?;
                let next = update(focus).await?;
                Ok::<P, BoxError>(lens.set(&parent, next)?)
            }
            .boxed()
        }))
    }

    fn data(&self) -> BoxStream<'static, D> {
        let path = self.path.clone();
        self.watch()
            .take_while(move |item| {
                if let Err(error) = item {
                    debug!(store = %path, %error, "focus lost, ending data stream");
                }
                future::ready(item.is_ok())
            })
            .filter_map(|item| future::ready(item.ok()))
            .boxed()
    }

    fn settled(&self) -> BoxFuture<'static, Result<(), StoreError>> {
        self.parent.settled()
    }

    fn scope(&self) -> &Scope {
        &self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorHandler, TandemError, UpdateError};
    use crate::store::{ListStore, RootStore};
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Todo {
        id: u32,
        text: String,
        done: bool,
    }

    fn todo(id: u32, text: &str) -> Todo {
        Todo {
            id,
            text: text.to_string(),
            done: false,
        }
    }

    fn text() -> Lens<Todo, String> {
        Lens::new(
            "text",
            |t: &Todo| t.text.clone(),
            |t: &Todo, text| Todo { text, ..t.clone() },
        )
    }

    #[tokio::test]
    async fn reads_and_writes_through_lens() {
        let root = RootStore::new("todo", todo(1, "milk"));
        let sub = root.map(text());
        assert_eq!(sub.path(), "todo.text");
        assert_eq!(sub.current().unwrap(), "milk");

        sub.update(|t| t.to_uppercase()).unwrap();
        sub.settled().await.unwrap();

        assert_eq!(root.current().unwrap().text, "MILK");
        assert_eq!(sub.current().unwrap(), "MILK");
    }

    #[tokio::test]
    async fn nested_sub_stores_share_root_order() {
        let root = RootStore::new("todos", vec![todo(1, "a"), todo(2, "b")]);
        let first = root.map_index(0).map(text());
        let second = root.map_key(|t: &Todo| t.id, 2).map(text());
        assert_eq!(first.path(), "todos.0.text");

        for i in 0..3 {
            first.update(move |s| format!("{s}{i}")).unwrap();
            second.update(move |s| format!("{s}{i}")).unwrap();
            root.update(|mut list| {
                list.iter_mut().for_each(|t| t.text.push('|'));
                list
            })
            .unwrap();
        }
        root.settled().await.unwrap();

        let list = root.current().unwrap();
        assert_eq!(list[0].text, "a0|1|2|");
        assert_eq!(list[1].text, "b0|1|2|");
    }

    #[tokio::test]
    async fn data_skips_unrelated_parent_commits() {
        let root = RootStore::new("todo", todo(1, "milk"));
        let sub = root.map(text());
        let mut data = sub.data();

        root.update(|t| Todo { done: true, ..t }).unwrap();
        root.update(|t| Todo {
            text: "eggs".into(),
            ..t
        })
        .unwrap();

        assert_eq!(data.next().await.as_deref(), Some("milk"));
        assert_eq!(data.next().await.as_deref(), Some("eggs"));
    }

    #[tokio::test]
    async fn keyed_store_reports_focus_loss() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Arc<dyn ErrorHandler> = Arc::new(move |_: &str, error: &TandemError| {
            if let TandemError::Update(error) = error {
                sink.lock().push(error.is_focus());
            }
        });
        let root = RootStore::builder("todos", vec![todo(1, "a"), todo(2, "b")])
            .error_handler(handler)
            .spawn();
        let second = root.map_key(|t: &Todo| t.id, 2);
        let mut watch = second.watch();
        assert_eq!(watch.next().await.unwrap().unwrap().text, "b");

        root.update(|list| list.into_iter().filter(|t| t.id != 2).collect())
            .unwrap();
        assert!(matches!(
            watch.next().await,
            Some(Err(FocusError::KeyNotFound { .. }))
        ));
        assert!(watch.next().await.is_none());

        let error = second.current().unwrap_err();
        assert!(error.is_focus());

        second.update(|t| Todo { done: true, ..t }).unwrap();
        root.settled().await.unwrap();
        assert_eq!(seen.lock().as_slice(), [true]);
        assert_eq!(root.current().unwrap(), vec![todo(1, "a")]);
    }

    #[tokio::test]
    async fn focus_error_reaches_handler_as_update_error() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let handler: Arc<dyn ErrorHandler> = Arc::new(move |_: &str, error: &TandemError| {
            if let TandemError::Update(UpdateError::Focus(focus)) = error {
                *sink.lock() = Some(focus.clone());
            }
        });
        let root = RootStore::builder("list", vec![1, 2])
            .error_handler(handler)
            .spawn();

        root.map_index(5).update(|n| n + 1).unwrap();
        root.settled().await.unwrap();

        assert_eq!(
            *seen.lock(),
            Some(FocusError::IndexOutOfRange { index: 5, len: 2 })
        );
    }

    #[tokio::test]
    async fn cancelled_sub_store_rejects_updates() {
        let root = RootStore::new("todo", todo(1, "milk"));
        let sub = root.map(text());

        sub.scope().cancel();

        assert!(matches!(
            sub.update(|t| t.to_uppercase()),
            Err(StoreError::Closed { store }) if store == "todo.text"
        ));
        root.update(|t| Todo { done: true, ..t }).unwrap();
        root.settled().await.unwrap();
        assert_eq!(root.current().unwrap().text, "milk");
        assert!(root.current().unwrap().done);
        assert!(!root.scope().is_cancelled());
    }
}
