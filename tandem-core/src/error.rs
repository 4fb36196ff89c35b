//! Error Types
//!
//! Every failure the core can observe is contained at one of three isolation
//! boundaries: a store's update application site, a mount point's hook
//! runner, or a derived store's lens. The types in this module name those
//! failures so an [`ErrorHandler`] can tell them apart.
//!
//! [`FocusError`] is special: it is an expected control-flow case (a derived
//! store whose element has been removed), not a bug. Bound UI matches on it
//! to unmount itself quietly.

use std::sync::Arc;

use thiserror::Error;

use crate::mount::MountId;

/// Error type for user-supplied updates and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A lens could not resolve its focus in the parent value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FocusError {
    /// A positional lens pointed past the end of the list.
    #[error("index {index} is out of range for a list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A keyed lens found no element with its key.
    #[error("no element with key {key}")]
    KeyNotFound { key: String },

    /// A custom partial lens rejected the parent value.
    #[error("{0}")]
    Custom(String),
}

/// Failure while applying one queued update.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The update returned an error.
    #[error("update failed: {0}")]
    Failed(#[source] BoxError),

    /// The update panicked. The message is the panic payload when it was a string.
    #[error("update panicked: {0}")]
    Panicked(String),

    /// The update targeted a derived store whose focus is gone.
    #[error(transparent)]
    Focus(#[from] FocusError),
}

impl UpdateError {
    /// Classify an error returned by an update function.
    ///
    /// Focus errors travel through derived stores boxed; they are unboxed
    /// here so handlers can match on them.
    pub fn from_source(error: BoxError) -> Self {
        match error.downcast::<FocusError>() {
            Ok(focus) => Self::Focus(*focus),
            Err(other) => Self::Failed(other),
        }
    }

    pub fn is_focus(&self) -> bool {
        matches!(self, Self::Focus(_))
    }
}

/// Errors returned to callers of the store API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store's queue worker has stopped (its scope was cancelled).
    #[error("store `{store}` is closed")]
    Closed { store: String },

    #[error(transparent)]
    Focus(#[from] FocusError),
}

impl StoreError {
    pub fn is_focus(&self) -> bool {
        matches!(self, Self::Focus(_))
    }
}

/// A lifecycle hook failed. The hook is skipped; its siblings still run.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("after-attach hook of mount {mount} failed: {source}")]
    AfterAttach { mount: MountId, source: BoxError },

    #[error("before-detach hook of mount {mount} failed: {source}")]
    BeforeDetach { mount: MountId, source: BoxError },
}

/// Errors returned by patch application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountError {
    /// The mount target's scope was cancelled.
    #[error("mount target `{target}` has been torn down")]
    Cancelled { target: String },

    /// A patch referenced an index that does not exist in the live list.
    #[error("patch {patch} is out of range for a list of length {len}")]
    InvalidPatch { patch: String, len: usize },
}

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Everything an [`ErrorHandler`] may be told about.
#[derive(Debug, Error)]
pub enum TandemError {
    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Hook(#[from] HookError),
}

/// Receives failures that were contained at an isolation boundary.
///
/// `origin` is the path of the store or mount target where the failure was
/// caught.
pub trait ErrorHandler: Send + Sync {
    fn on_error(&self, origin: &str, error: &TandemError);
}

impl<F> ErrorHandler for F
where
    F: Fn(&str, &TandemError) + Send + Sync,
{
    fn on_error(&self, origin: &str, error: &TandemError) {
        self(origin, error)
    }
}

/// Default handler: log and continue.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn on_error(&self, origin: &str, error: &TandemError) {
        tracing::error!(origin, %error, "isolated failure");
    }
}

pub(crate) fn default_error_handler() -> Arc<dyn ErrorHandler> {
    Arc::new(LogErrorHandler)
}
