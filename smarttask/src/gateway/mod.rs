//! Remote data gateway for `SmartTask`.
//!
//! Defines the [`RemoteGateway`] trait through which every domain operation
//! reaches the remote identity and persistence service. Each method performs
//! exactly one remote call and surfaces failures as [`GatewayError`]; nothing
//! here retries or adds timeouts on top of what the transport does.
//!
//! Implementations:
//! - [`supabase::SupabaseGateway`]: HTTP client for a Supabase project
//! - [`memory::InMemoryGateway`]: in-process backend for tests and demos

pub mod listeners;
pub mod memory;
pub mod persist;
pub mod supabase;

use std::future::Future;

use smarttask_proto::auth::{LoginOutcome, Session, User, UserId, UserProfile};
use smarttask_proto::task::{NewTask, Task, TaskId, TaskPatch, TaskStatus};

pub use listeners::{AuthCallback, AuthListeners, AuthSubscription};

/// Errors surfaced by gateway operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The backend rejected the call. Displays the backend's own message.
    #[error("{message}")]
    Backend {
        /// HTTP status, when the call went over HTTP.
        status: Option<u16>,
        /// Human-readable message from the backend.
        message: String,
    },

    /// The request never produced a response (connect, TLS, I/O).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be decoded into the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// An update matched no row (missing, or hidden by row-level security).
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    /// The call needs a logged-in user and there is none.
    #[error("Auth session missing!")]
    SessionMissing,
}

impl GatewayError {
    /// Builds a [`GatewayError::Backend`] without an HTTP status.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            status: None,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Async gateway to the remote identity and persistence service.
///
/// Every operation maps to one remote call. Callers own all state; the
/// gateway keeps only what the identity protocol itself needs (the current
/// session tokens) plus the registry of auth listeners.
pub trait RemoteGateway: Send + Sync {
    /// Register a new account.
    ///
    /// Fails on a malformed email, a weak password, or a duplicate account.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<User, GatewayError>> + Send;

    /// Log in with email and password. Emits `SignedIn` on success.
    fn login(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<LoginOutcome, GatewayError>> + Send;

    /// Log out the current user. Emits `SignedOut`.
    ///
    /// Logging out while already logged out is not an error here, though
    /// callers should tolerate a backend that says otherwise.
    fn logout(&self) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// The current session, if any.
    fn get_session(&self) -> impl Future<Output = Result<Option<Session>, GatewayError>> + Send;

    /// The current user as the identity service sees it, if any.
    fn get_current_user(&self) -> impl Future<Output = Result<Option<User>, GatewayError>> + Send;

    /// Exchange the refresh token for a new session. Emits `TokenRefreshed`.
    fn refresh_session(&self) -> impl Future<Output = Result<Session, GatewayError>> + Send;

    /// Send a password-recovery email whose link points at `redirect_to`.
    fn request_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Change the current user's password. Emits `UserUpdated`.
    fn update_password(
        &self,
        new_password: &str,
    ) -> impl Future<Output = Result<User, GatewayError>> + Send;

    /// All user profiles, oldest account first.
    fn list_users(&self) -> impl Future<Output = Result<Vec<UserProfile>, GatewayError>> + Send;

    /// Tasks assigned to `user`, newest first.
    fn fetch_tasks_for_user(
        &self,
        user: &UserId,
    ) -> impl Future<Output = Result<Vec<Task>, GatewayError>> + Send;

    /// Insert a task and return the stored row.
    fn create_task(&self, task: &NewTask)
    -> impl Future<Output = Result<Task, GatewayError>> + Send;

    /// Update title, description and optionally assignee.
    fn update_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<Task, GatewayError>> + Send;

    /// Update only the status.
    fn update_task_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
    ) -> impl Future<Output = Result<Task, GatewayError>> + Send;

    /// Delete a task by id.
    fn delete_task(&self, id: &TaskId) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Register `callback` for every identity-state transition.
    ///
    /// Delivery stops for good once the returned handle is released.
    fn subscribe_to_auth_changes(&self, callback: AuthCallback) -> AuthSubscription;
}
