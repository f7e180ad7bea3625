//! Task state for the logged-in user's dashboard.
//!
//! [`TaskStore`] caches the user's task list and keeps it consistent with
//! the remote store after each mutation without refetching. The cache
//! updates themselves are the pure reducers in [`reconcile`]; [`Pager`]
//! slices the cached list for display.

pub mod page;
pub mod reconcile;
pub mod store;

pub use page::{PageError, Pager};
pub use reconcile::{Outcome, apply};
pub use store::{TaskDraft, TaskListState, TaskStore};

use smarttask_proto::validation::ValidationError;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors returned by task operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// The operation needs a logged-in user and there is none. Raised
    /// before any remote call is made.
    #[error("No user logged in")]
    NoUserLoggedIn,
    /// Form input was rejected before any remote call was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The remote store rejected or failed the call.
    #[error(transparent)]
    Remote(#[from] GatewayError),
}
