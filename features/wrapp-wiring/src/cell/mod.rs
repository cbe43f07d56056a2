//! Runtime primitives a generated container builds on.
//!
//! A plan only describes construction; these cells carry its concurrency contract into the
//! generated code. [`Deferred`] backs deferred references, [`LazySingleton`] guards lazy
//! singletons.

use thiserror::Error;

pub mod deferred;
pub mod lazy;

pub use deferred::Deferred;
pub use lazy::LazySingleton;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    /// Accessed before the provider was bound
    #[error("Deferred '{0}' accessed before it was bound")]
    Unbound(&'static str),
    /// `bind` called on a cell that already holds a value
    #[error("Deferred '{0}' is already bound - use rebind to replace it")]
    AlreadyBound(&'static str),
    /// Every handle was dropped while waiting
    #[error("Deferred '{0}' was dropped before it was bound")]
    Abandoned(&'static str),
}
