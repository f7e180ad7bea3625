//! Session context: who is logged in right now.
//!
//! [`SessionContext`] is the single writer of the [`SessionState`] cell.
//! Two producers feed it: the one-shot session check issued by
//! [`SessionContext::init`], and the gateway's auth-change subscription.
//! Readers take a [`watch::Receiver`] via [`SessionContext::subscribe`] and
//! re-evaluate on every change.
//!
//! Ordering between the producers: `loading` turns false on whichever lands
//! first and never returns to true. Once any auth event has been applied,
//! a later-resolving initial check is discarded, so a stale "logged out"
//! answer can't overwrite a fresh login.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use smarttask_proto::auth::{AuthEvent, Session, User};

use crate::gateway::{AuthSubscription, GatewayError, RemoteGateway};

/// Authentication state visible to the whole view tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// The logged-in identity, `None` when nobody is.
    pub user: Option<User>,
    /// True until the first session answer (check or event) arrives.
    pub loading: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }
}

impl SessionState {
    /// Whether a user is confirmed logged in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        !self.loading && self.user.is_some()
    }
}

struct Inner {
    state: watch::Sender<SessionState>,
    /// Set under the watch lock when the first auth event is applied.
    event_seen: AtomicBool,
    alive: AtomicBool,
}

impl Inner {
    fn apply_event(&self, event: AuthEvent, session: Option<&Session>) {
        if !self.alive.load(Ordering::Acquire) {
            return;
        }
        let user = session.map(|s| s.user.clone());
        tracing::info!(
            %event,
            user = user.as_ref().map(|u| u.email.as_str()).unwrap_or("-"),
            "session updated"
        );
        self.state.send_modify(|state| {
            self.event_seen.store(true, Ordering::Release);
            state.user = user;
            state.loading = false;
        });
    }

    fn apply_initial(&self, result: Result<Option<Session>, GatewayError>) {
        if !self.alive.load(Ordering::Acquire) {
            tracing::debug!("session context disposed before initial check resolved");
            return;
        }
        let user = match result {
            Ok(session) => session.map(|s| s.user),
            Err(e) => {
                tracing::warn!(error = %e, "initial session check failed");
                None
            }
        };
        let applied = self.state.send_if_modified(|state| {
            if self.event_seen.load(Ordering::Acquire) {
                return false;
            }
            state.user = user;
            state.loading = false;
            true
        });
        if !applied {
            tracing::debug!("initial session check superseded by auth event");
        }
    }
}

/// Process-wide holder of the current authentication state.
///
/// Lifecycle: [`new`](Self::new) → [`init`](Self::init) →
/// [`dispose`](Self::dispose). Dropping the context also releases its
/// auth subscription.
pub struct SessionContext {
    inner: Arc<Inner>,
    subscription: Mutex<Option<AuthSubscription>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    /// Creates a context in the loading state.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            inner: Arc::new(Inner {
                state,
                event_seen: AtomicBool::new(false),
                alive: AtomicBool::new(true),
            }),
            subscription: Mutex::new(None),
        }
    }

    /// Subscribes to auth changes, then runs the one-shot session check.
    ///
    /// The subscription is live before the check is issued, so an event
    /// arriving while the check is in flight is never missed. Calling
    /// `init` again, or after [`dispose`](Self::dispose), does nothing.
    pub async fn init<G: RemoteGateway>(&self, gateway: &G) {
        if !self.register(gateway) {
            return;
        }
        let result = gateway.get_session().await;
        self.inner.apply_initial(result);
    }

    /// Runs [`init`](Self::init) on a background task.
    pub fn spawn_init<G: RemoteGateway + 'static>(
        self: &Arc<Self>,
        gateway: Arc<G>,
    ) -> JoinHandle<()> {
        let ctx = Arc::clone(self);
        tokio::spawn(async move { ctx.init(gateway.as_ref()).await })
    }

    fn register<G: RemoteGateway>(&self, gateway: &G) -> bool {
        if !self.inner.alive.load(Ordering::Acquire) {
            return false;
        }
        let mut slot = self.subscription.lock();
        if slot.is_some() {
            tracing::debug!("session context already initialized");
            return false;
        }
        let inner = Arc::clone(&self.inner);
        *slot = Some(
            gateway.subscribe_to_auth_changes(Arc::new(move |event, session| {
                inner.apply_event(event, session);
            })),
        );
        true
    }

    /// Releases the auth subscription and stops all further updates.
    ///
    /// Safe to call more than once; the subscription is released exactly once.
    pub fn dispose(&self) {
        self.inner.alive.store(false, Ordering::Release);
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
            tracing::debug!("session context disposed");
        }
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// The logged-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    /// Whether the first session answer is still pending.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }
}
