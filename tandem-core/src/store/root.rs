//! Root Store
//!
//! The root store owns its value and its update queue.
//!
//! # How It Works
//!
//! 1. `enqueue` pushes a job onto an unbounded mpsc channel and returns.
//!
//! 2. A single worker task, spawned on the store's scope, pops jobs in
//!    arrival order. For an update it clones the current value, runs the
//!    update to completion, and commits the result.
//!
//! 3. A commit swaps the value under a write lock and publishes it while the
//!    lock is still held. New subscribers take the read lock to copy the
//!    value and register, so they can never miss or double-see a commit.
//!
//! 4. Errors and panics from an update are caught at this one site and go to
//!    the error handler. The queue keeps running.
//!
//! Cancelling the scope stops the worker. An update in flight at that moment
//! is dropped without committing, and every data stream ends.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::BoxStream;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::broadcast::Broadcast;
use super::{Store, Update};
use crate::error::{default_error_handler, ErrorHandler, StoreError, TandemError, UpdateError};
use crate::runtime::{Diagnostics, Probe, Scope};

enum Job<D> {
    Apply(Update<D>),
    Barrier(oneshot::Sender<()>),
}

/// State shared between store handles and the worker.
struct Shared<D> {
    path: String,
    current: RwLock<D>,
    published: Broadcast<D>,
    error_handler: Arc<dyn ErrorHandler>,
    probe: Option<Probe>,
    trace_commits: bool,
}

impl<D> Shared<D>
where
    D: Clone + Send + Sync + 'static,
{
    fn commit(&self, next: D) {
        let mut current = self.current.write();
        *current = next.clone();
        self.published.send(next);
        drop(current);

        if let Some(probe) = &self.probe {
            probe.commit();
        }
        if self.trace_commits {
            trace!(store = %self.path, "committed update");
        }
    }

    fn fail(&self, error: UpdateError) {
        if let Some(probe) = &self.probe {
            probe.failed_update();
        }
        self.error_handler
            .on_error(&self.path, &TandemError::Update(error));
    }
}

/// A store that owns its value.
///
/// Handles are cheap to clone and all refer to the same queue.
///
/// # Example
///
/// ```rust,ignore
/// let store = RootStore::new("greeting", String::new());
/// store.update(|s| s + "hello")?;
/// store.settled().await?;
/// assert_eq!(store.current()?, "hello");
/// ```
pub struct RootStore<D> {
    shared: Arc<Shared<D>>,
    tx: mpsc::UnboundedSender<Job<D>>,
    scope: Scope,
}

impl<D> RootStore<D>
where
    D: Clone + Send + Sync + 'static,
{
    /// Create a store in its own root scope with default settings.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(id: &str, initial: D) -> Self {
        Self::builder(id, initial).spawn()
    }

    pub fn builder(id: &str, initial: D) -> StoreBuilder<D> {
        StoreBuilder {
            id: id.to_string(),
            initial,
            scope: None,
            error_handler: None,
            diagnostics: None,
            trace_commits: false,
        }
    }

    /// Number of live `data()` subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.published.subscriber_count()
    }

    fn closed(&self) -> StoreError {
        StoreError::Closed {
            store: self.shared.path.clone(),
        }
    }
}

impl<D> Clone for RootStore<D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            tx: self.tx.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<D> std::fmt::Debug for RootStore<D>
where
    D: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootStore")
            .field("path", &self.shared.path)
            .field("current", &*self.shared.current.read())
            .finish()
    }
}

impl<D> Store<D> for RootStore<D>
where
    D: Clone + Send + Sync + 'static,
{
    fn id(&self) -> &str {
        &self.shared.path
    }

    fn path(&self) -> &str {
        &self.shared.path
    }

    fn current(&self) -> Result<D, StoreError> {
        Ok(self.shared.current.read().clone())
    }

    fn enqueue(&self, update: Update<D>) -> Result<(), StoreError> {
        if self.scope.is_cancelled() {
            return Err(self.closed());
        }
        self.tx
            .send(Job::Apply(update))
            .map_err(|_| self.closed())
    }

    fn data(&self) -> BoxStream<'static, D> {
        let current = self.shared.current.read();
        self.shared.published.subscribe_with(current.clone())
    }

    fn settled(&self) -> BoxFuture<'static, Result<(), StoreError>> {
        let (done, wait) = oneshot::channel();
        let sent = self.tx.send(Job::Barrier(done)).is_ok();
        let closed = self.closed();
        async move {
            if !sent {
                return Err(closed);
            }
            wait.await.map_err(|_| closed)
        }
        .boxed()
    }

    fn scope(&self) -> &Scope {
        &self.scope
    }
}

/// Configures and spawns a [`RootStore`].
pub struct StoreBuilder<D> {
    id: String,
    initial: D,
    scope: Option<Scope>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    diagnostics: Option<Diagnostics>,
    trace_commits: bool,
}

impl<D> StoreBuilder<D>
where
    D: Clone + Send + Sync + 'static,
{
    /// Scope owning the store. Defaults to a fresh root scope.
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Receiver of failed updates. Defaults to [`LogErrorHandler`](crate::error::LogErrorHandler).
    pub fn error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn trace_commits(mut self, enabled: bool) -> Self {
        self.trace_commits = enabled;
        self
    }

    /// Spawn the queue worker and return the store.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(self) -> RootStore<D> {
        let scope = self.scope.unwrap_or_else(|| Scope::root(&self.id));
        let probe = self
            .diagnostics
            .map(|diagnostics| diagnostics.register(&self.id, &scope));

        let shared = Arc::new(Shared {
            path: self.id,
            current: RwLock::new(self.initial),
            published: Broadcast::new(),
            error_handler: self.error_handler.unwrap_or_else(default_error_handler),
            probe,
            trace_commits: self.trace_commits,
        });

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_queue(Arc::clone(&shared), rx, scope.token()));

        RootStore { shared, tx, scope }
    }
}

async fn run_queue<D>(
    shared: Arc<Shared<D>>,
    mut rx: mpsc::UnboundedReceiver<Job<D>>,
    token: CancellationToken,
) where
    D: Clone + Send + Sync + 'static,
{
    debug!(store = %shared.path, "update queue started");

    loop {
        let job = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        match job {
            Job::Barrier(done) => {
                let _ = done.send(());
            }
            Job::Apply(update) => {
                let snapshot = shared.current.read().clone();
                let outcome = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    outcome = apply(update, snapshot) => outcome,
                };
                match outcome {
                    Ok(next) => shared.commit(next),
                    Err(error) => shared.fail(error),
                }
            }
        }
    }

    shared.published.close();
    debug!(store = %shared.path, "update queue stopped");
}

/// Run one update, turning errors and panics into [`UpdateError`].
async fn apply<D>(update: Update<D>, snapshot: D) -> Result<D, UpdateError> {
    let pending = std::panic::catch_unwind(AssertUnwindSafe(move || update(snapshot)))
        .map_err(|panic| UpdateError::Panicked(panic_message(panic)))?;

    match AssertUnwindSafe(pending).catch_unwind().await {
        Ok(result) => result.map_err(UpdateError::from_source),
        Err(panic) => Err(UpdateError::Panicked(panic_message(panic))),
    }
}

pub(crate) fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
