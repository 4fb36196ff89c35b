//! Stores
//!
//! A store is a serialized, observable state container. This module
//! implements the store abstraction and everything derived from it.
//!
//! # Concepts
//!
//! ## Root stores
//!
//! A [`RootStore`] owns a value and a queue of pending updates. One worker
//! task drains the queue: it applies one update to the current value,
//! commits the result and publishes it, then takes the next. Updates may be
//! asynchronous; while one is suspended, further updates are accepted but
//! wait their turn. An update that fails or panics is reported to the
//! store's error handler and leaves the value untouched.
//!
//! ## Derived stores
//!
//! A [`SubStore`] owns nothing. It reads and writes through a [`Lens`] into
//! its parent, so all stores derived from one root share that root's queue
//! and therefore its total order of commits.
//!
//! ## Handlers
//!
//! A [`Handler`] turns typed actions into queued updates. An
//! [`EmittingHandler`] may also emit values while it runs; other stores'
//! handlers can listen to those, which is how stores talk to each other.
//!
//! # Data streams
//!
//! [`Store::data`] replays the latest committed value to a new subscriber and
//! then delivers every later commit in order.

mod broadcast;
mod handler;
mod lens;
mod root;
mod sub;

use std::future::Future;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::stream::BoxStream;

pub use handler::{Emitter, EmittingHandler, Handler};
pub use lens::{lens_at_index, lens_for_key, IdProvider, Lens};
pub use root::{RootStore, StoreBuilder};
pub(crate) use root::panic_message;
pub use sub::SubStore;

use crate::error::{BoxError, StoreError};
use crate::runtime::Scope;

/// A queued state transition.
pub type Update<D> = Box<dyn FnOnce(D) -> BoxFuture<'static, Result<D, BoxError>> + Send>;

/// The store interface shared by root and derived stores.
pub trait Store<D>: Send + Sync
where
    D: Clone + Send + Sync + 'static,
{
    /// Last segment of the store's path.
    fn id(&self) -> &str;

    /// Dot-joined ids from the root store down to this one. Diagnostic only.
    fn path(&self) -> &str;

    /// The last committed value.
    fn current(&self) -> Result<D, StoreError>;

    /// Queue an update. Returns once the update is accepted, not applied.
    fn enqueue(&self, update: Update<D>) -> Result<(), StoreError>;

    /// Replay the latest value, then every later commit.
    fn data(&self) -> BoxStream<'static, D>;

    /// Resolves once every update queued before this call has been applied.
    fn settled(&self) -> BoxFuture<'static, Result<(), StoreError>>;

    /// The scope bounding this store's tasks.
    fn scope(&self) -> &Scope;

    fn update<F>(&self, f: F) -> Result<(), StoreError>
    where
        Self: Sized,
        F: FnOnce(D) -> D + Send + 'static,
    {
        self.enqueue(Box::new(move |d: D| {
            future::ready(Ok::<D, BoxError>(f(d))).boxed()
        }))
    }

    fn try_update<F>(&self, f: F) -> Result<(), StoreError>
    where
        Self: Sized,
        F: FnOnce(D) -> Result<D, BoxError> + Send + 'static,
    {
        self.enqueue(Box::new(move |d: D| future::ready(f(d)).boxed()))
    }

    fn update_async<F, Fut>(&self, f: F) -> Result<(), StoreError>
    where
        Self: Sized,
        F: FnOnce(D) -> Fut + Send + 'static,
        Fut: Future<Output = Result<D, BoxError>> + Send + 'static,
    {
        self.enqueue(Box::new(move |d: D| f(d).boxed()))
    }

    /// Queue a replacement of the whole value.
    fn set(&self, value: D) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        self.update(move |_| value)
    }

    /// Derive a store focused through `lens`.
    fn map<X>(&self, lens: Lens<D, X>) -> SubStore<D, X>
    where
        Self: Clone + Sized + 'static,
        X: Clone + Send + Sync + PartialEq + 'static,
    {
        SubStore::new(Arc::new(self.clone()), lens)
    }

    /// Build a handler that queues `execute(current, action)` per action.
    fn handle<A, F>(&self, execute: F) -> Handler<A, D>
    where
        Self: Clone + Sized + 'static,
        A: Send + 'static,
        F: Fn(D, A) -> D + Send + Sync + 'static,
    {
        Handler::new(Arc::new(self.clone()), move |d, a| {
            future::ready(Ok(execute(d, a))).boxed()
        })
    }

    /// Like [`handle`](Store::handle), for asynchronous, fallible updates.
    fn handle_async<A, F, Fut>(&self, execute: F) -> Handler<A, D>
    where
        Self: Clone + Sized + 'static,
        A: Send + 'static,
        F: Fn(D, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D, BoxError>> + Send + 'static,
    {
        Handler::new(Arc::new(self.clone()), move |d, a| execute(d, a).boxed())
    }

    /// Build a handler whose updates may emit values for other stores.
    fn handle_and_emit<A, E, F>(&self, execute: F) -> EmittingHandler<A, D, E>
    where
        Self: Clone + Sized + 'static,
        A: Send + 'static,
        E: Clone + Send + 'static,
        F: Fn(D, A, &Emitter<E>) -> D + Send + Sync + 'static,
    {
        EmittingHandler::new(Arc::new(self.clone()), execute)
    }
}

/// Derivations specific to stores holding a list.
pub trait ListStore<T>: Store<Vec<T>> + Clone + Sized + 'static
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Derive the element at `index`. Unstable under reordering.
    fn map_index(&self, index: usize) -> SubStore<Vec<T>, T> {
        self.map(lens_at_index(index))
    }

    /// Derive the element whose identity is `key`. Stable under reordering.
    fn map_key<K, I>(&self, id_provider: I, key: K) -> SubStore<Vec<T>, T>
    where
        K: PartialEq + std::fmt::Debug + Send + Sync + 'static,
        I: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.map(lens_for_key(Arc::new(id_provider), key))
    }
}

impl<S, T> ListStore<T> for S
where
    S: Store<Vec<T>> + Clone + Sized + 'static,
    T: Clone + Send + Sync + PartialEq + 'static,
{
}
