//! Handlers
//!
//! A handler binds a source of typed actions to a store's queue. Every
//! action becomes one queued update, so the order in which actions arrive is
//! the order in which they apply, even when the update itself is
//! asynchronous.

use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::stream::{BoxStream, Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::debug;

use super::broadcast::Broadcast;
use super::Store;
use crate::error::{BoxError, StoreError};

type Execute<D, A> = dyn Fn(D, A) -> BoxFuture<'static, Result<D, BoxError>> + Send + Sync;

/// Turns actions of type `A` into updates of a `Store<D>`.
pub struct Handler<A, D> {
    store: Arc<dyn Store<D>>,
    execute: Arc<Execute<D, A>>,
}

impl<A, D> Handler<A, D>
where
    A: Send + 'static,
    D: Clone + Send + Sync + 'static,
{
    pub fn new<F>(store: Arc<dyn Store<D>>, execute: F) -> Self
    where
        F: Fn(D, A) -> BoxFuture<'static, Result<D, BoxError>> + Send + Sync + 'static,
    {
        Self {
            store,
            execute: Arc::new(execute),
        }
    }

    /// Queue one update for `action`.
    pub fn call(&self, action: A) -> Result<(), StoreError> {
        let execute = Arc::clone(&self.execute);
        self.store
            .enqueue(Box::new(move |current: D| execute(current, action)))
    }

    /// Queue one update per item of `source`, in arrival order.
    ///
    /// The listening task lives on the store's scope and ends with it, or
    /// when `source` ends.
    pub fn listen<S>(&self, source: S) -> JoinHandle<()>
    where
        S: Stream<Item = A> + Send + 'static,
    {
        let handler = self.clone();
        self.store.scope().spawn(async move {
            let mut source = Box::pin(source);
            while let Some(action) = source.next().await {
                if let Err(error) = handler.call(action) {
                    debug!(store = %handler.store.path(), %error, "handler stopped listening");
                    break;
                }
            }
        })
    }
}

impl<A, D> Clone for Handler<A, D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            execute: Arc::clone(&self.execute),
        }
    }
}

/// Side channel an emitting handler's updates write to.
pub struct Emitter<E> {
    hub: Arc<Broadcast<E>>,
}

impl<E> Emitter<E>
where
    E: Clone + Send + 'static,
{
    pub fn emit(&self, value: E) {
        self.hub.send(value);
    }
}

/// A handler whose updates may emit values of type `E`.
///
/// Emissions happen while the update is applied, so they follow the store's
/// commit order. Other stores consume them through [`emitted`](Self::emitted).
pub struct EmittingHandler<A, D, E> {
    handler: Handler<A, D>,
    hub: Arc<Broadcast<E>>,
}

impl<A, D, E> EmittingHandler<A, D, E>
where
    A: Send + 'static,
    D: Clone + Send + Sync + 'static,
    E: Clone + Send + 'static,
{
    /// Must be called inside a tokio runtime.
    pub fn new<F>(store: Arc<dyn Store<D>>, execute: F) -> Self
    where
        F: Fn(D, A, &Emitter<E>) -> D + Send + Sync + 'static,
    {
        let hub = Arc::new(Broadcast::new());
        let emitter = Emitter {
            hub: Arc::clone(&hub),
        };
        let closing = Arc::clone(&hub);
        store.scope().on_cancel(move || closing.close());

        let handler = Handler::new(store, move |current, action| {
            future::ready(Ok(execute(current, action, &emitter))).boxed()
        });

        Self { handler, hub }
    }

    pub fn call(&self, action: A) -> Result<(), StoreError> {
        self.handler.call(action)
    }

    pub fn listen<S>(&self, source: S) -> JoinHandle<()>
    where
        S: Stream<Item = A> + Send + 'static,
    {
        self.handler.listen(source)
    }

    /// Values emitted from now on. Ends when the store's scope is cancelled.
    pub fn emitted(&self) -> BoxStream<'static, E> {
        self.hub.subscribe()
    }
}

impl<A, D, E> Clone for EmittingHandler<A, D, E> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            hub: Arc::clone(&self.hub),
        }
    }
}
