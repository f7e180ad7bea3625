//! Route table and authentication guard.
//!
//! Protected routes render only for a confirmed user. While the session is
//! still loading the guard yields a placeholder; once the session is known
//! to be empty it redirects to the login route. No "return to" location is
//! remembered, so after logging in the user lands on the dashboard.

use std::fmt;

use tokio::sync::watch;

use crate::session::SessionState;

/// Every route the client knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Root,
    Login,
    Signup,
    ForgotPassword,
    ResetPassword,
    Dashboard,
    Tasks,
    Profile,
    Settings,
}

impl Route {
    /// All routes, in table order.
    pub const ALL: [Self; 9] = [
        Self::Root,
        Self::Login,
        Self::Signup,
        Self::ForgotPassword,
        Self::ResetPassword,
        Self::Dashboard,
        Self::Tasks,
        Self::Profile,
        Self::Settings,
    ];

    /// Matches a path exactly. A single trailing slash is ignored.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let path = match path.strip_suffix('/') {
            Some("") | None => path,
            Some(trimmed) => trimmed,
        };
        Self::ALL.into_iter().find(|route| route.path() == path)
    }

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Root => "/",
            Self::Login => "/login",
            Self::Signup => "/signup",
            Self::ForgotPassword => "/forgot-password",
            Self::ResetPassword => "/reset-password",
            Self::Dashboard => "/dashboard",
            Self::Tasks => "/dashboard/tasks",
            Self::Profile => "/dashboard/profile",
            Self::Settings => "/dashboard/settings",
        }
    }

    /// Whether the route needs a logged-in user.
    #[must_use]
    pub const fn is_protected(self) -> bool {
        matches!(
            self,
            Self::Dashboard | Self::Tasks | Self::Profile | Self::Settings
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// What the guard knows about the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// The first session answer has not arrived.
    Unknown,
    Authenticated,
    Unauthenticated,
}

impl From<&SessionState> for GuardState {
    fn from(state: &SessionState) -> Self {
        if state.loading {
            Self::Unknown
        } else if state.user.is_some() {
            Self::Authenticated
        } else {
            Self::Unauthenticated
        }
    }
}

/// Result of resolving a route against the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Render nothing yet; the session is still loading.
    Placeholder,
    /// Go to another route instead, replacing the current history entry.
    Redirect(Route),
    /// Render the route.
    Render(Route),
}

/// Decides what to show for `route` given the session.
#[must_use]
pub fn resolve(route: Route, session: &SessionState) -> Navigation {
    if route == Route::Root {
        return Navigation::Redirect(Route::Login);
    }
    if !route.is_protected() {
        return Navigation::Render(route);
    }
    match GuardState::from(session) {
        GuardState::Unknown => Navigation::Placeholder,
        GuardState::Authenticated => Navigation::Render(route),
        GuardState::Unauthenticated => Navigation::Redirect(Route::Login),
    }
}

/// Guard for one route that re-evaluates on every session change.
pub struct RouteGuard {
    route: Route,
    session: watch::Receiver<SessionState>,
}

impl RouteGuard {
    #[must_use]
    pub const fn new(route: Route, session: watch::Receiver<SessionState>) -> Self {
        Self { route, session }
    }

    #[must_use]
    pub const fn route(&self) -> Route {
        self.route
    }

    /// Navigation for the current session state.
    #[must_use]
    pub fn current(&self) -> Navigation {
        resolve(self.route, &self.session.borrow())
    }

    /// Waits for the next session change and returns the new navigation.
    ///
    /// Returns `None` once the session context is gone.
    pub async fn changed(&mut self) -> Option<Navigation> {
        self.session.changed().await.ok()?;
        Some(resolve(self.route, &self.session.borrow_and_update()))
    }

    /// Waits until the session is known and returns the settled navigation.
    ///
    /// Returns `None` if the session context goes away first.
    pub async fn settled(&mut self) -> Option<Navigation> {
        let state = self
            .session
            .wait_for(|state| !state.loading)
            .await
            .ok()?;
        Some(resolve(self.route, &state))
    }
}
