//! Registry of auth-change listeners.
//!
//! Gateways own one [`AuthListeners`] and call [`AuthListeners::notify`]
//! after every identity transition. Subscribers hold an
//! [`AuthSubscription`]; releasing it (explicitly or by drop) removes the
//! callback, after which it is never invoked again.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use smarttask_proto::auth::{AuthEvent, Session};

/// Callback invoked with the event kind and the session after the event
/// (`None` once logged out).
pub type AuthCallback = Arc<dyn Fn(AuthEvent, Option<&Session>) + Send + Sync>;

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    callbacks: BTreeMap<u64, AuthCallback>,
}

/// Shared, cloneable set of registered auth callbacks.
#[derive(Clone, Default)]
pub struct AuthListeners {
    table: Arc<Mutex<ListenerTable>>,
}

impl std::fmt::Debug for AuthListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthListeners")
            .field("registered", &self.len())
            .finish()
    }
}

impl AuthListeners {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` and returns the handle that unregisters it.
    #[must_use]
    pub fn register(&self, callback: AuthCallback) -> AuthSubscription {
        let mut table = self.table.lock();
        let id = table.next_id;
        table.next_id += 1;
        table.callbacks.insert(id, callback);
        AuthSubscription {
            id,
            table: Arc::downgrade(&self.table),
        }
    }

    /// Delivers `event` to every registered callback in registration order.
    ///
    /// Callbacks run outside the registry lock, so a callback may register
    /// or release subscriptions without deadlocking.
    pub fn notify(&self, event: AuthEvent, session: Option<&Session>) {
        let callbacks: Vec<AuthCallback> = self.table.lock().callbacks.values().cloned().collect();
        tracing::debug!(%event, listeners = callbacks.len(), "auth state change");
        for callback in callbacks {
            callback(event, session);
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().callbacks.len()
    }

    /// Whether no subscription is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle for one registered auth callback.
///
/// Dropping the handle releases it too; [`unsubscribe`](Self::unsubscribe)
/// just makes the release explicit at the call site.
#[derive(Debug)]
pub struct AuthSubscription {
    id: u64,
    table: Weak<Mutex<ListenerTable>>,
}

impl AuthSubscription {
    /// Stops delivery to this subscription's callback.
    pub fn unsubscribe(self) {
        drop(self);
    }

    fn release(&self) {
        if let Some(table) = self.table.upgrade() {
            table.lock().callbacks.remove(&self.id);
        }
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.release();
    }
}
