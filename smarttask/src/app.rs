//! Application controller.
//!
//! [`App`] wires the session context, the task store and the pager together
//! and exposes the intents a front end needs: auth flows that end in a
//! navigation, and dashboard actions on the current user's tasks. It owns no
//! rendering; callers read snapshots and draw them however they like.

use std::sync::Arc;

use smarttask_proto::auth::{User, UserId, UserProfile};
use smarttask_proto::task::{Task, TaskId, TaskPatch, TaskStatus};

use crate::gateway::{GatewayError, RemoteGateway};
use crate::route::{self, Navigation, Route, RouteGuard};
use crate::session::SessionContext;
use crate::tasks::{PageError, Pager, TaskDraft, TaskError, TaskStore};

/// Errors surfaced by controller intents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    /// An auth flow was rejected by the identity service.
    #[error(transparent)]
    Auth(#[from] GatewayError),
    /// A task operation failed.
    #[error(transparent)]
    Task(#[from] TaskError),
    /// An unsupported page size was requested.
    #[error(transparent)]
    Page(#[from] PageError),
}

/// One page of the dashboard's task table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardPage {
    pub rows: Vec<Task>,
    /// "Page X of Y".
    pub label: String,
    pub has_prev: bool,
    pub has_next: bool,
    /// Message of the last failed fetch, if any.
    pub error: Option<String>,
}

/// Controller over a [`RemoteGateway`].
pub struct App<G> {
    gateway: Arc<G>,
    session: Arc<SessionContext>,
    tasks: TaskStore<G>,
    pager: Pager,
    reset_redirect: String,
    route: Route,
}

impl<G: RemoteGateway> App<G> {
    /// Creates a controller. Call [`start`](Self::start) before anything else.
    #[must_use]
    pub fn new(gateway: Arc<G>, pager: Pager, reset_redirect: impl Into<String>) -> Self {
        Self {
            tasks: TaskStore::new(Arc::clone(&gateway)),
            gateway,
            session: Arc::new(SessionContext::new()),
            pager,
            reset_redirect: reset_redirect.into(),
            route: Route::Login,
        }
    }

    /// Subscribes to auth changes and resolves the initial session.
    pub async fn start(&self) {
        self.session.init(self.gateway.as_ref()).await;
    }

    /// Releases the auth subscription and stops applying task results.
    pub fn dispose(&self) {
        self.tasks.dispose();
        self.session.dispose();
    }

    #[must_use]
    pub const fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    #[must_use]
    pub const fn tasks(&self) -> &TaskStore<G> {
        &self.tasks
    }

    #[must_use]
    pub const fn pager(&self) -> &Pager {
        &self.pager
    }

    /// Route the controller currently shows.
    #[must_use]
    pub const fn route(&self) -> Route {
        self.route
    }

    /// A guard for `route` bound to this controller's session.
    #[must_use]
    pub fn guard(&self, route: Route) -> RouteGuard {
        RouteGuard::new(route, self.session.subscribe())
    }

    /// Resolves `route` against the current session and moves there.
    ///
    /// A placeholder leaves the current route unchanged.
    pub fn navigate(&mut self, route: Route) -> Navigation {
        let navigation = route::resolve(route, &self.session.snapshot());
        match navigation {
            Navigation::Render(to) | Navigation::Redirect(to) => {
                tracing::debug!(from = %self.route, to = %to, "navigate");
                self.route = to;
            }
            Navigation::Placeholder => {}
        }
        navigation
    }

    // -----------------------------------------------------------------------
    // Auth flows
    // -----------------------------------------------------------------------

    /// Creates an account, then sends the user to the login route.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Auth`] with the identity service's message.
    pub async fn sign_up(&mut self, email: &str, password: &str) -> Result<User, AppError> {
        let user = self.gateway.sign_up(email, password).await?;
        tracing::info!(email, "account created");
        self.navigate(Route::Login);
        Ok(user)
    }

    /// Logs in, then sends the user to the dashboard.
    ///
    /// Tasks cached for an earlier user are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Auth`] with the identity service's message.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<User, AppError> {
        let outcome = self.gateway.login(email, password).await?;
        self.forget_tasks();
        self.navigate(Route::Dashboard);
        Ok(outcome.user)
    }

    /// Logs out, then sends the user to the login route.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Auth`] if the identity service refuses.
    pub async fn logout(&mut self) -> Result<(), AppError> {
        self.gateway.logout().await?;
        self.forget_tasks();
        self.navigate(Route::Login);
        Ok(())
    }

    /// Sends a recovery email, then returns to the login route.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Auth`] with the identity service's message.
    pub async fn forgot_password(&mut self, email: &str) -> Result<(), AppError> {
        self.gateway
            .request_password_reset(email, &self.reset_redirect)
            .await?;
        tracing::info!(email, "password reset requested");
        self.navigate(Route::Login);
        Ok(())
    }

    /// Sets a new password for the logged-in user and opens the dashboard.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Auth`], e.g. when the recovery session is gone.
    pub async fn reset_password(&mut self, new_password: &str) -> Result<User, AppError> {
        let user = self.gateway.update_password(new_password).await?;
        self.navigate(Route::Dashboard);
        Ok(user)
    }

    // -----------------------------------------------------------------------
    // Dashboard intents
    // -----------------------------------------------------------------------

    /// "Welcome, <email>" for the current user, or "Welcome, Guest".
    #[must_use]
    pub fn welcome_line(&self) -> String {
        let who = self
            .session
            .current_user()
            .map_or_else(|| "Guest".to_string(), |u| u.email);
        format!("Welcome, {who}")
    }

    /// Fetches the current user's tasks and keeps the page in range.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Task`] when nobody is logged in or the fetch
    /// fails; in the latter case the previous list stays cached.
    pub async fn load_tasks(&mut self) -> Result<(), AppError> {
        let result = self.tasks.fetch_for(&self.session).await;
        self.clamp_page();
        Ok(result?)
    }

    /// The rows and controls of the current page.
    #[must_use]
    pub fn dashboard_page(&self) -> DashboardPage {
        let state = self.tasks.snapshot();
        let total = state.tasks.len();
        DashboardPage {
            rows: self.pager.slice(&state.tasks).to_vec(),
            label: self.pager.label(total),
            has_prev: self.pager.has_prev(),
            has_next: self.pager.has_next(total),
            error: state.error,
        }
    }

    pub fn next_page(&mut self) {
        let total = self.task_count();
        self.pager.next(total);
    }

    pub fn prev_page(&mut self) {
        self.pager.prev();
    }

    /// Jumps to `page`, clamped to the available range.
    pub fn go_to_page(&mut self, page: usize) {
        let total = self.task_count();
        self.pager.go_to(page, total);
    }

    /// Changes the page size and returns to the first page.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Page`] for sizes other than 10, 20 or 50.
    pub fn set_rows_per_page(&mut self, rows: usize) -> Result<(), AppError> {
        Ok(self.pager.set_rows_per_page(rows)?)
    }

    /// Creates a task for the current user.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Task`] on validation, session or remote failure.
    pub async fn create_task(&self, draft: TaskDraft) -> Result<Task, AppError> {
        Ok(self.tasks.add_for(&self.session, draft).await?)
    }

    /// Edits title, description and optionally assignee.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Task`] on validation or remote failure.
    pub async fn edit_task(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, AppError> {
        Ok(self.tasks.edit(id, patch).await?)
    }

    /// Sets a new title, keeping the current description unless one is given.
    ///
    /// An uncached task is looked up by loading the user's tasks first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Task`] if the task isn't among the user's tasks,
    /// or on validation or remote failure.
    pub async fn retitle_task(
        &mut self,
        id: &TaskId,
        title: String,
        description: Option<String>,
        assigned_to: Option<UserId>,
    ) -> Result<Task, AppError> {
        let description = match description {
            Some(description) => description,
            None => {
                if self.cached_task(id).is_none() {
                    self.load_tasks().await?;
                }
                self.cached_task(id)
                    .ok_or_else(|| TaskError::Remote(GatewayError::TaskNotFound(id.clone())))?
                    .description
                    .unwrap_or_default()
            }
        };
        let patch = TaskPatch {
            title,
            description,
            assigned_to,
        };
        self.edit_task(id, patch).await
    }

    /// Changes a task's status.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Task`] on remote failure.
    pub async fn change_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, AppError> {
        Ok(self.tasks.change_status(id, status).await?)
    }

    /// Deletes a task and keeps the page in range.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Task`] on remote failure.
    pub async fn delete_task(&mut self, id: &TaskId) -> Result<(), AppError> {
        self.tasks.remove(id).await?;
        self.clamp_page();
        Ok(())
    }

    /// Users a task can be assigned to.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Auth`] if the profile list can't be read.
    pub async fn list_users(&self) -> Result<Vec<UserProfile>, AppError> {
        Ok(self.gateway.list_users().await?)
    }

    fn cached_task(&self, id: &TaskId) -> Option<Task> {
        self.tasks.snapshot().tasks.into_iter().find(|t| &t.id == id)
    }

    fn forget_tasks(&mut self) {
        self.tasks.reset();
        self.clamp_page();
    }

    fn task_count(&self) -> usize {
        self.tasks.snapshot().tasks.len()
    }

    fn clamp_page(&mut self) {
        let total = self.task_count();
        self.pager.clamp(total);
    }
}
