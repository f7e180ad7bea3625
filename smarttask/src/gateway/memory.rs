//! In-process gateway for testing and offline demos.
//!
//! [`InMemoryGateway`] keeps accounts, tasks and the current session in
//! memory and mirrors the remote service's observable behavior: ordering,
//! error messages, and auth notifications. Tests can queue failures per
//! [`Operation`] and inspect the call log to prove that a code path never
//! reached the backend.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use smarttask_proto::auth::{AuthEvent, LoginOutcome, Session, User, UserId, UserProfile};
use smarttask_proto::task::{NewTask, Task, TaskId, TaskPatch, TaskStatus};

use super::{AuthCallback, AuthListeners, AuthSubscription, GatewayError, RemoteGateway};

/// Minimum password length the in-memory identity service accepts.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Lifetime of issued access tokens.
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Creation time of the first stored row (2025-01-01T00:00:00Z).
const CLOCK_START_SECS: i64 = 1_735_689_600;

/// Gateway operations, used to queue failures and read the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SignUp,
    Login,
    Logout,
    GetSession,
    GetCurrentUser,
    RefreshSession,
    RequestPasswordReset,
    UpdatePassword,
    ListUsers,
    FetchTasks,
    CreateTask,
    UpdateTask,
    UpdateTaskStatus,
    DeleteTask,
}

struct Account {
    user: User,
    password: String,
}

struct MemoryState {
    accounts: Vec<Account>,
    tasks: Vec<Task>,
    session: Option<Session>,
    clock: DateTime<Utc>,
    token_seq: u64,
    failures: HashMap<Operation, VecDeque<GatewayError>>,
    calls: Vec<Operation>,
    reset_requests: Vec<(String, String)>,
}

impl MemoryState {
    /// Advances the row clock by one second and returns the new time, so
    /// rows created in sequence have strictly increasing `created_at`.
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += Duration::seconds(1);
        self.clock
    }

    fn issue_session(&mut self, user: User) -> Session {
        self.token_seq += 1;
        let n = self.token_seq;
        Session {
            access_token: format!("mem-access-{n}"),
            token_type: "bearer".to_string(),
            expires_in: TOKEN_LIFETIME_SECS,
            expires_at: None,
            refresh_token: format!("mem-refresh-{n}"),
            user,
        }
        .with_expiry_from(Utc::now())
    }
}

/// In-memory stand-in for the remote identity and persistence service.
pub struct InMemoryGateway {
    state: Mutex<MemoryState>,
    listeners: AuthListeners,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    /// Creates an empty backend with nobody logged in.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                accounts: Vec::new(),
                tasks: Vec::new(),
                session: None,
                clock: DateTime::from_timestamp(CLOCK_START_SECS, 0).unwrap_or_default(),
                token_seq: 0,
                failures: HashMap::new(),
                calls: Vec::new(),
                reset_requests: Vec::new(),
            }),
            listeners: AuthListeners::new(),
        }
    }

    /// Creates an account directly, bypassing validation and the call log.
    pub fn register_account(&self, email: &str, password: &str) -> User {
        let mut state = self.state.lock();
        let created_at = state.tick();
        let user = User {
            id: UserId::generate(),
            email: email.to_string(),
            created_at: Some(created_at),
        };
        state.accounts.push(Account {
            user: user.clone(),
            password: password.to_string(),
        });
        user
    }

    /// Inserts a task row directly, bypassing the call log.
    pub fn seed_task(&self, task: &NewTask) -> Task {
        let mut state = self.state.lock();
        insert_task(&mut state, task)
    }

    /// Makes the next call of `op` fail with `err`. Failures queue in order.
    pub fn fail_next(&self, op: Operation, err: GatewayError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Every operation invoked so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Operation> {
        self.state.lock().calls.clone()
    }

    /// How many times `op` has been invoked.
    #[must_use]
    pub fn call_count(&self, op: Operation) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == op).count()
    }

    /// Snapshot of every stored task, in insertion order.
    #[must_use]
    pub fn stored_tasks(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    /// Recorded password-reset requests as `(email, redirect_to)`.
    #[must_use]
    pub fn reset_requests(&self) -> Vec<(String, String)> {
        self.state.lock().reset_requests.clone()
    }

    /// Marks the current session's access token as expired.
    pub fn expire_session(&self) {
        if let Some(session) = self.state.lock().session.as_mut() {
            session.expires_at = Some(Utc::now().timestamp() - 1);
        }
    }

    /// Number of live auth subscriptions.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Logs the call and pops a queued failure, if any.
    async fn begin(&self, op: Operation) -> Result<(), GatewayError> {
        let queued = {
            let mut state = self.state.lock();
            state.calls.push(op);
            state.failures.get_mut(&op).and_then(VecDeque::pop_front)
        };
        // Let other tasks run, as a real network round trip would.
        tokio::task::yield_now().await;
        queued.map_or(Ok(()), Err)
    }

    fn refresh_locked(&self) -> Result<Session, GatewayError> {
        let session = {
            let mut state = self.state.lock();
            let user = state
                .session
                .as_ref()
                .map(|s| s.user.clone())
                .ok_or(GatewayError::SessionMissing)?;
            let session = state.issue_session(user);
            state.session = Some(session.clone());
            session
        };
        self.listeners
            .notify(AuthEvent::TokenRefreshed, Some(&session));
        Ok(session)
    }
}

fn insert_task(state: &mut MemoryState, task: &NewTask) -> Task {
    let created_at = state.tick();
    let row = Task {
        id: TaskId::generate(),
        title: task.title.clone(),
        description: task.description.clone(),
        status: TaskStatus::Todo,
        assigned_to: task.assigned_to.clone(),
        created_by: Some(task.created_by.clone()),
        created_at,
    };
    state.tasks.push(row.clone());
    row
}

fn validate_email(email: &str) -> Result<(), GatewayError> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        });
    if valid {
        Ok(())
    } else {
        Err(GatewayError::backend(
            "Unable to validate email address: invalid format",
        ))
    }
}

fn validate_password(password: &str) -> Result<(), GatewayError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(GatewayError::backend(format!(
            "Password should be at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }
    Ok(())
}

impl RemoteGateway for InMemoryGateway {
    async fn sign_up(&self, email: &str, password: &str) -> Result<User, GatewayError> {
        self.begin(Operation::SignUp).await?;
        validate_email(email)?;
        validate_password(password)?;
        if self
            .state
            .lock()
            .accounts
            .iter()
            .any(|a| a.user.email.eq_ignore_ascii_case(email))
        {
            return Err(GatewayError::backend("User already registered"));
        }
        Ok(self.register_account(email, password))
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, GatewayError> {
        self.begin(Operation::Login).await?;
        let session = {
            let mut state = self.state.lock();
            let user = state
                .accounts
                .iter()
                .find(|a| a.user.email.eq_ignore_ascii_case(email) && a.password == password)
                .map(|a| a.user.clone())
                .ok_or_else(|| GatewayError::backend("Invalid login credentials"))?;
            let session = state.issue_session(user);
            state.session = Some(session.clone());
            session
        };
        self.listeners.notify(AuthEvent::SignedIn, Some(&session));
        Ok(LoginOutcome {
            user: session.user.clone(),
            session,
        })
    }

    async fn logout(&self) -> Result<(), GatewayError> {
        self.begin(Operation::Logout).await?;
        self.state.lock().session = None;
        self.listeners.notify(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, GatewayError> {
        self.begin(Operation::GetSession).await?;
        let current = self.state.lock().session.clone();
        match current {
            Some(session) if session.is_expired(Utc::now()) => self.refresh_locked().map(Some),
            other => Ok(other),
        }
    }

    async fn get_current_user(&self) -> Result<Option<User>, GatewayError> {
        self.begin(Operation::GetCurrentUser).await?;
        Ok(self.state.lock().session.as_ref().map(|s| s.user.clone()))
    }

    async fn refresh_session(&self) -> Result<Session, GatewayError> {
        self.begin(Operation::RefreshSession).await?;
        self.refresh_locked()
    }

    async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), GatewayError> {
        self.begin(Operation::RequestPasswordReset).await?;
        validate_email(email)?;
        // Unknown addresses succeed too, so the call can't probe for accounts.
        self.state
            .lock()
            .reset_requests
            .push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<User, GatewayError> {
        self.begin(Operation::UpdatePassword).await?;
        validate_password(new_password)?;
        let session = {
            let mut state = self.state.lock();
            let session = state.session.clone().ok_or(GatewayError::SessionMissing)?;
            if let Some(account) = state
                .accounts
                .iter_mut()
                .find(|a| a.user.id == session.user.id)
            {
                account.password = new_password.to_string();
            }
            session
        };
        self.listeners
            .notify(AuthEvent::UserUpdated, Some(&session));
        Ok(session.user)
    }

    async fn list_users(&self) -> Result<Vec<UserProfile>, GatewayError> {
        self.begin(Operation::ListUsers).await?;
        let state = self.state.lock();
        let mut accounts: Vec<&Account> = state.accounts.iter().collect();
        accounts.sort_by_key(|a| a.user.created_at);
        Ok(accounts
            .into_iter()
            .map(|a| UserProfile {
                id: a.user.id.clone(),
                email: a.user.email.clone(),
                full_name: None,
            })
            .collect())
    }

    async fn fetch_tasks_for_user(&self, user: &UserId) -> Result<Vec<Task>, GatewayError> {
        self.begin(Operation::FetchTasks).await?;
        let state = self.state.lock();
        let mut tasks: Vec<Task> = state
            .tasks
            .iter()
            .filter(|t| t.assigned_to.as_ref() == Some(user))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, GatewayError> {
        self.begin(Operation::CreateTask).await?;
        let mut state = self.state.lock();
        Ok(insert_task(&mut state, task))
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, GatewayError> {
        self.begin(Operation::UpdateTask).await?;
        let mut state = self.state.lock();
        let row = state
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| GatewayError::TaskNotFound(id.clone()))?;
        row.title.clone_from(&patch.title);
        row.description = Some(patch.description.clone());
        if let Some(assignee) = &patch.assigned_to {
            row.assigned_to = Some(assignee.clone());
        }
        Ok(row.clone())
    }

    async fn update_task_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, GatewayError> {
        self.begin(Operation::UpdateTaskStatus).await?;
        let mut state = self.state.lock();
        let row = state
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| GatewayError::TaskNotFound(id.clone()))?;
        row.status = status;
        Ok(row.clone())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), GatewayError> {
        self.begin(Operation::DeleteTask).await?;
        self.state.lock().tasks.retain(|t| &t.id != id);
        Ok(())
    }

    fn subscribe_to_auth_changes(&self, callback: AuthCallback) -> AuthSubscription {
        self.listeners.register(callback)
    }
}
