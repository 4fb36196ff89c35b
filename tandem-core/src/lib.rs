//! Tandem Core
//!
//! This crate provides the state and mounting core of the Tandem UI
//! framework. It implements:
//!
//! - Serialized, observable stores with asynchronous updates
//! - Lens-derived stores that share their root's commit order
//! - An ordered-list diff engine producing move-aware patches
//! - A patch applier that drives node lifecycle hooks
//!
//! The crate knows nothing about any particular view technology. Rendered
//! nodes live in a [`mount::Container`] supplied by the embedding
//! application.
//!
//! # Architecture
//!
//! - `store`: root stores, derived stores, lenses and action handlers
//! - `diff`: the Myers-based list diff and its patch type
//! - `mount`: mount points, list mounts and slot mounts
//! - `runtime`: cancellation scopes, diagnostics and the application root
//! - `config`: serde-loadable runtime settings
//! - `error`: error types and the error handler trait
//!
//! # Example
//!
//! ```rust,ignore
//! use tandem_core::prelude::*;
//!
//! let runtime = Runtime::default();
//! let todos = runtime.store("todos", vec!["milk".to_string()]);
//!
//! let list = runtime
//!     .list_mount(container, |t: &String| t.clone(), |t, mount| {
//!         mount.after_attach(|node| Ok(focus(node)));
//!         render_row(t)
//!     })
//!     .build();
//! list.bind(todos.data());
//!
//! todos.update(|mut list| {
//!     list.push("eggs".to_string());
//!     list
//! })?;
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod mount;
pub mod runtime;
pub mod store;

/// The types most applications need.
pub mod prelude {
    pub use crate::config::RuntimeConfig;
    pub use crate::diff::{diff, diff_by_value, DiffConfig, Patch};
    pub use crate::error::{BoxError, ErrorHandler, FocusError, StoreError, TandemError};
    pub use crate::mount::{Container, ListMount, MountPoint, MountState, SlotMount};
    pub use crate::runtime::{Runtime, Scope};
    pub use crate::store::{Lens, ListStore, RootStore, Store, SubStore};
}
