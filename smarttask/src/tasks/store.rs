//! Cached task list for the logged-in user.
//!
//! `TaskStore` owns the cache and is its only writer. Every mutation waits
//! for the remote store's answer and folds the authoritative record into the
//! cache through [`reconcile`](super::reconcile); nothing is applied
//! optimistically. A failed mutation leaves the cache exactly as it was.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use smarttask_proto::auth::UserId;
use smarttask_proto::task::{NewTask, Task, TaskId, TaskPatch, TaskStatus};
use smarttask_proto::validation::{validate_description, validate_title};

use super::TaskError;
use super::reconcile::{self, Outcome};
use crate::gateway::RemoteGateway;
use crate::session::SessionContext;

/// Observable state of the task list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskListState {
    /// Cached tasks, newest first.
    pub tasks: Vec<Task>,
    /// True while a fetch is in flight.
    pub loading: bool,
    /// Message of the most recent failed fetch. Cleared when a fetch starts.
    pub error: Option<String>,
}

/// Form input for a new task. Creator and assignee come from the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
}

/// Task list cache backed by a [`RemoteGateway`].
pub struct TaskStore<G> {
    gateway: Arc<G>,
    state: watch::Sender<TaskListState>,
    alive: AtomicBool,
}

impl<G: RemoteGateway> TaskStore<G> {
    /// Creates an empty store.
    #[must_use]
    pub fn new(gateway: Arc<G>) -> Self {
        let (state, _) = watch::channel(TaskListState::default());
        Self {
            gateway,
            state,
            alive: AtomicBool::new(true),
        }
    }

    /// Loads the tasks assigned to `user`, replacing the cache.
    ///
    /// On failure the previous list is kept and the message is recorded in
    /// [`TaskListState::error`]. `loading` is false again either way.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Remote`] if the remote fetch fails.
    pub async fn fetch(&self, user: &UserId) -> Result<(), TaskError> {
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });
        let result = self.gateway.fetch_tasks_for_user(user).await;
        if !self.is_alive() {
            return result.map(|_| ()).map_err(TaskError::from);
        }
        match result {
            Ok(tasks) => {
                tracing::debug!(%user, count = tasks.len(), "tasks fetched");
                self.state.send_modify(|state| {
                    reconcile::apply(&mut state.tasks, Outcome::Fetched(tasks));
                    state.loading = false;
                });
                Ok(())
            }
            Err(e) => {
                tracing::warn!(%user, error = %e, "task fetch failed");
                let message = e.to_string();
                self.state.send_modify(|state| {
                    state.error = Some(message);
                    state.loading = false;
                });
                Err(e.into())
            }
        }
    }

    /// Loads the tasks of the session's current user.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NoUserLoggedIn`] without calling the remote
    /// store when nobody is logged in, otherwise as [`fetch`](Self::fetch).
    pub async fn fetch_for(&self, session: &SessionContext) -> Result<(), TaskError> {
        let user = session.current_user().ok_or(TaskError::NoUserLoggedIn)?;
        self.fetch(&user.id).await
    }

    /// Creates a task and puts the stored row first in the cache.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Validation`] before any remote call if the
    /// title or description is out of bounds, or [`TaskError::Remote`] if
    /// the insert fails.
    pub async fn add(&self, task: NewTask) -> Result<Task, TaskError> {
        validate_title(&task.title)?;
        validate_description(task.description.as_deref())?;
        let created = self.gateway.create_task(&task).await?;
        tracing::info!(task_id = %created.id, "task created");
        self.apply(Outcome::Created(created.clone()));
        Ok(created)
    }

    /// Creates a task owned by and assigned to the session's current user.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NoUserLoggedIn`] without calling the remote
    /// store when nobody is logged in, otherwise as [`add`](Self::add).
    pub async fn add_for(
        &self,
        session: &SessionContext,
        draft: TaskDraft,
    ) -> Result<Task, TaskError> {
        let user = session.current_user().ok_or(TaskError::NoUserLoggedIn)?;
        self.add(NewTask {
            title: draft.title,
            description: draft.description,
            assigned_to: Some(user.id.clone()),
            created_by: user.id,
        })
        .await
    }

    /// Edits title, description and optionally assignee.
    ///
    /// The cached entry is replaced in place. If the id is no longer cached
    /// the cache is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Validation`] before any remote call, or
    /// [`TaskError::Remote`] if the update fails.
    pub async fn edit(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, TaskError> {
        validate_title(&patch.title)?;
        validate_description(Some(&patch.description))?;
        let updated = self.gateway.update_task(id, &patch).await?;
        tracing::info!(task_id = %id, "task edited");
        self.apply(Outcome::Updated(updated.clone()));
        Ok(updated)
    }

    /// Changes only the status; the cached entry is replaced in place.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Remote`] if the update fails.
    pub async fn change_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task, TaskError> {
        let updated = self.gateway.update_task_status(id, status).await?;
        tracing::info!(task_id = %id, %status, "task status changed");
        self.apply(Outcome::Updated(updated.clone()));
        Ok(updated)
    }

    /// Deletes a task and drops it from the cache. Removing an id that is
    /// not cached is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Remote`] if the delete fails.
    pub async fn remove(&self, id: &TaskId) -> Result<(), TaskError> {
        self.gateway.delete_task(id).await?;
        tracing::info!(task_id = %id, "task deleted");
        self.apply(Outcome::Removed(id.clone()));
        Ok(())
    }

    /// Drops every cached task, e.g. when the logged-in user changes.
    pub fn reset(&self) {
        self.state.send_modify(|state| {
            state.tasks.clear();
            state.error = None;
            state.loading = false;
        });
    }

    /// Stops applying results of calls still in flight.
    pub fn dispose(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> TaskListState {
        self.state.borrow().clone()
    }

    /// Cached tasks, newest first.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.state.borrow().tasks.clone()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TaskListState> {
        self.state.subscribe()
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn apply(&self, outcome: Outcome) {
        if !self.is_alive() {
            tracing::debug!("task store disposed, result dropped");
            return;
        }
        self.state
            .send_modify(|state| reconcile::apply(&mut state.tasks, outcome));
    }
}
