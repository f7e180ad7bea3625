//! Integration tests for the session context.
//!
//! Covers the login/logout round trip, the ordering between the one-shot
//! session check and pushed auth events, and subscription lifecycle.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use tokio::sync::Notify;

use smarttask::gateway::memory::{InMemoryGateway, Operation};
use smarttask::gateway::{AuthCallback, AuthSubscription, GatewayError, RemoteGateway};
use smarttask::session::{SessionContext, SessionState};
use smarttask_proto::auth::{LoginOutcome, Session, User, UserId, UserProfile};
use smarttask_proto::task::{NewTask, Task, TaskId, TaskPatch, TaskStatus};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const EMAIL: &str = "ada@example.com";
const PASSWORD: &str = "secret1";

fn gateway_with_account() -> InMemoryGateway {
    let gw = InMemoryGateway::new();
    gw.register_account(EMAIL, PASSWORD);
    gw
}

/// Gateway whose session check reads the backend immediately but only
/// answers once `release` is notified, so the answer can be stale.
struct HeldCheck {
    inner: InMemoryGateway,
    release: Notify,
}

impl RemoteGateway for HeldCheck {
    async fn sign_up(&self, email: &str, password: &str) -> Result<User, GatewayError> {
        self.inner.sign_up(email, password).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, GatewayError> {
        self.inner.login(email, password).await
    }

    async fn logout(&self) -> Result<(), GatewayError> {
        self.inner.logout().await
    }

    async fn get_session(&self) -> Result<Option<Session>, GatewayError> {
        let answer = self.inner.get_session().await;
        self.release.notified().await;
        answer
    }

    async fn get_current_user(&self) -> Result<Option<User>, GatewayError> {
        self.inner.get_current_user().await
    }

    async fn refresh_session(&self) -> Result<Session, GatewayError> {
        self.inner.refresh_session().await
    }

    async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), GatewayError> {
        self.inner.request_password_reset(email, redirect_to).await
    }

    async fn update_password(&self, new_password: &str) -> Result<User, GatewayError> {
        self.inner.update_password(new_password).await
    }

    async fn list_users(&self) -> Result<Vec<UserProfile>, GatewayError> {
        self.inner.list_users().await
    }

    async fn fetch_tasks_for_user(&self, user: &UserId) -> Result<Vec<Task>, GatewayError> {
        self.inner.fetch_tasks_for_user(user).await
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, GatewayError> {
        self.inner.create_task(task).await
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, GatewayError> {
        self.inner.update_task(id, patch).await
    }

    async fn update_task_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, GatewayError> {
        self.inner.update_task_status(id, status).await
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), GatewayError> {
        self.inner.delete_task(id).await
    }

    fn subscribe_to_auth_changes(&self, callback: AuthCallback) -> AuthSubscription {
        self.inner.subscribe_to_auth_changes(callback)
    }
}

// ---------------------------------------------------------------------------
// Round trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_then_logout_round_trip() {
    let gw = gateway_with_account();
    let ctx = SessionContext::new();
    ctx.init(&gw).await;

    gw.login(EMAIL, PASSWORD).await.unwrap();
    let state = ctx.snapshot();
    assert!(!state.loading);
    assert_eq!(state.user.unwrap().email, EMAIL);

    gw.logout().await.unwrap();
    assert_eq!(
        ctx.snapshot(),
        SessionState {
            user: None,
            loading: false
        }
    );
}

#[tokio::test]
async fn subscribers_see_every_transition() {
    let gw = gateway_with_account();
    let ctx = SessionContext::new();
    let mut rx = ctx.subscribe();
    assert!(rx.borrow_and_update().loading);

    ctx.init(&gw).await;
    assert!(rx.has_changed().unwrap());
    assert!(!rx.borrow_and_update().loading);

    gw.login(EMAIL, PASSWORD).await.unwrap();
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_authenticated());

    gw.logout().await.unwrap();
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().user.is_none());
}

// ---------------------------------------------------------------------------
// Initial check vs. pushed events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_initial_check_does_not_override_login() {
    let gw = HeldCheck {
        inner: gateway_with_account(),
        release: Notify::new(),
    };
    let ctx = SessionContext::new();

    tokio::join!(ctx.init(&gw), async {
        gw.inner.login(EMAIL, PASSWORD).await.unwrap();
        gw.release.notify_one();
    });

    let state = ctx.snapshot();
    assert!(!state.loading);
    assert_eq!(state.user.map(|u| u.email).as_deref(), Some(EMAIL));
}

#[tokio::test]
async fn event_during_check_clears_loading_immediately() {
    let gw = HeldCheck {
        inner: gateway_with_account(),
        release: Notify::new(),
    };
    let ctx = SessionContext::new();

    tokio::join!(ctx.init(&gw), async {
        gw.inner.login(EMAIL, PASSWORD).await.unwrap();
        // The check is still held here.
        assert!(!ctx.is_loading());
        assert!(ctx.current_user().is_some());
        gw.release.notify_one();
    });
}

#[tokio::test]
async fn check_resolving_first_is_applied() {
    let gw = gateway_with_account();
    gw.login(EMAIL, PASSWORD).await.unwrap();

    let ctx = SessionContext::new();
    ctx.init(&gw).await;
    assert_eq!(ctx.current_user().unwrap().email, EMAIL);

    gw.logout().await.unwrap();
    assert!(ctx.current_user().is_none());
}

#[tokio::test]
async fn failed_check_is_treated_as_logged_out() {
    let gw = gateway_with_account();
    gw.fail_next(
        Operation::GetSession,
        GatewayError::Transport("connection refused".to_string()),
    );
    let ctx = SessionContext::new();
    ctx.init(&gw).await;
    assert_eq!(
        ctx.snapshot(),
        SessionState {
            user: None,
            loading: false
        }
    );
}

#[tokio::test]
async fn expired_session_is_refreshed_by_check() {
    let gw = gateway_with_account();
    gw.login(EMAIL, PASSWORD).await.unwrap();
    gw.expire_session();

    let ctx = SessionContext::new();
    ctx.init(&gw).await;
    assert_eq!(ctx.current_user().unwrap().email, EMAIL);
}

#[tokio::test]
async fn refresh_and_user_update_keep_user() {
    let gw = gateway_with_account();
    let ctx = SessionContext::new();
    ctx.init(&gw).await;
    gw.login(EMAIL, PASSWORD).await.unwrap();

    gw.refresh_session().await.unwrap();
    assert_eq!(ctx.current_user().unwrap().email, EMAIL);

    gw.update_password("better-secret").await.unwrap();
    assert_eq!(ctx.current_user().unwrap().email, EMAIL);
    assert!(!ctx.is_loading());
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disposed_context_ignores_events() {
    let gw = gateway_with_account();
    let ctx = SessionContext::new();
    ctx.init(&gw).await;
    ctx.dispose();

    gw.login(EMAIL, PASSWORD).await.unwrap();
    assert!(ctx.current_user().is_none());
    assert_eq!(gw.listener_count(), 0);
}

#[tokio::test]
async fn disposed_before_check_resolves_stays_loading() {
    let gw = HeldCheck {
        inner: gateway_with_account(),
        release: Notify::new(),
    };
    let ctx = SessionContext::new();

    tokio::join!(ctx.init(&gw), async {
        tokio::task::yield_now().await;
        ctx.dispose();
        gw.release.notify_one();
    });

    assert!(ctx.is_loading());
    assert_eq!(gw.inner.listener_count(), 0);
}

#[tokio::test]
async fn spawn_init_runs_in_background() {
    let gw = Arc::new(gateway_with_account());
    let ctx = Arc::new(SessionContext::new());
    ctx.spawn_init(Arc::clone(&gw)).await.unwrap();
    assert!(!ctx.is_loading());
    assert_eq!(gw.listener_count(), 1);
}
