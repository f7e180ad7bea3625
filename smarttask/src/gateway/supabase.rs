//! HTTP gateway for a Supabase project.
//!
//! Talks to the project's auth API (`/auth/v1`) for identity and to its
//! REST API (`/rest/v1`) for the `tasks` and `profiles` tables. The current
//! session lives in memory and, when configured, in a [`SessionFile`] so a
//! later process starts out logged in.
//!
//! Table requests carry the user's access token when there is one, so the
//! project's row-level security sees the real user.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use smarttask_proto::auth::{AuthEvent, LoginOutcome, Session, User, UserId, UserProfile};
use smarttask_proto::task::{NewTask, Task, TaskId, TaskPatch, TaskStatus};

use super::persist::SessionFile;
use super::{AuthCallback, AuthListeners, AuthSubscription, GatewayError, RemoteGateway};

/// Connection settings for a Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://abcd.supabase.co`.
    pub url: String,
    /// Public anon API key.
    pub anon_key: String,
    /// TCP connect timeout handed to the HTTP client.
    pub connect_timeout: Duration,
    /// Where to persist the session; `None` keeps it in memory only.
    pub session_file: Option<PathBuf>,
}

/// Error body shapes used by the auth and REST APIs.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

/// Sign-up answers with a session when email confirmation is off, and
/// with the bare user when it is on.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(Session),
    User(User),
}

/// Gateway backed by a Supabase project over HTTPS.
pub struct SupabaseGateway {
    client: Client,
    base: Url,
    anon_key: String,
    session: RwLock<Option<Session>>,
    session_file: Option<SessionFile>,
    listeners: AuthListeners,
}

impl SupabaseGateway {
    /// Builds the HTTP client and restores a persisted session, if any.
    ///
    /// An unreadable session file is logged and ignored; the user simply
    /// starts logged out.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] if the URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: SupabaseConfig) -> Result<Self, GatewayError> {
        let base = parse_base_url(&config.url)?;
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        let session_file = config.session_file.map(SessionFile::new);
        let restored = session_file.as_ref().and_then(|file| match file.load() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable session file");
                None
            }
        });
        if let Some(session) = &restored {
            tracing::debug!(user = %session.user.id, "restored persisted session");
        }

        Ok(Self {
            client,
            base,
            anon_key: config.anon_key,
            session: RwLock::new(restored),
            session_file,
            listeners: AuthListeners::new(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base
            .join(path)
            .map_err(|e| GatewayError::Transport(format!("invalid endpoint {path}: {e}")))
    }

    fn current_session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    /// Builds a request carrying the API key and a bearer token: the user's
    /// access token when logged in, the anon key otherwise.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let token = self
            .session
            .read()
            .as_ref()
            .map_or_else(|| self.anon_key.clone(), |s| s.access_token.clone());
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    /// Replaces the current session and mirrors it to disk.
    fn store_session(&self, session: Option<Session>) {
        if let Some(file) = &self.session_file {
            let result = match &session {
                Some(s) => file.save(s),
                None => file.clear(),
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to persist session");
            }
        }
        *self.session.write() = session;
    }

    fn tasks_url(&self) -> Result<Url, GatewayError> {
        self.endpoint("rest/v1/tasks")
    }

    fn task_by_id_url(&self, id: &TaskId) -> Result<Url, GatewayError> {
        let mut url = self.tasks_url()?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        Ok(url)
    }

    async fn exchange_token(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, GatewayError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        let session: Session = send_json(self.request(Method::POST, url).json(&body)).await?;
        Ok(session.with_expiry_from(Utc::now()))
    }

    /// Sends a representation-returning write and takes the single row.
    async fn write_one(&self, builder: RequestBuilder) -> Result<Option<Task>, GatewayError> {
        let rows: Vec<Task> =
            send_json(builder.header("Prefer", "return=representation")).await?;
        Ok(rows.into_iter().next())
    }
}

impl RemoteGateway for SupabaseGateway {
    async fn sign_up(&self, email: &str, password: &str) -> Result<User, GatewayError> {
        let url = self.endpoint("auth/v1/signup")?;
        let body = serde_json::json!({ "email": email, "password": password });
        let response: SignUpResponse = send_json(self.request(Method::POST, url).json(&body)).await?;
        match response {
            SignUpResponse::Session(session) => {
                let session = session.with_expiry_from(Utc::now());
                let user = session.user.clone();
                self.store_session(Some(session.clone()));
                self.listeners.notify(AuthEvent::SignedIn, Some(&session));
                Ok(user)
            }
            SignUpResponse::User(user) => Ok(user),
        }
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, GatewayError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let session = self.exchange_token("password", body).await?;
        tracing::info!(user = %session.user.id, "logged in");
        self.store_session(Some(session.clone()));
        self.listeners.notify(AuthEvent::SignedIn, Some(&session));
        Ok(LoginOutcome {
            user: session.user.clone(),
            session,
        })
    }

    async fn logout(&self) -> Result<(), GatewayError> {
        if self.current_session().is_some() {
            let url = self.endpoint("auth/v1/logout")?;
            match send_empty(self.request(Method::POST, url)).await {
                // The token is already dead server-side; finish locally.
                Ok(()) | Err(GatewayError::Backend {
                    status: Some(401 | 403 | 404),
                    ..
                }) => {}
                Err(e) => return Err(e),
            }
        }
        self.store_session(None);
        tracing::info!("logged out");
        self.listeners.notify(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, GatewayError> {
        match self.current_session() {
            Some(session) if session.is_expired(Utc::now()) => {
                tracing::debug!("stored session expired, refreshing");
                self.refresh_session().await.map(Some)
            }
            other => Ok(other),
        }
    }

    async fn get_current_user(&self) -> Result<Option<User>, GatewayError> {
        if self.current_session().is_none() {
            return Ok(None);
        }
        let url = self.endpoint("auth/v1/user")?;
        send_json(self.request(Method::GET, url)).await.map(Some)
    }

    async fn refresh_session(&self) -> Result<Session, GatewayError> {
        let refresh_token = self
            .current_session()
            .map(|s| s.refresh_token)
            .ok_or(GatewayError::SessionMissing)?;
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let session = self.exchange_token("refresh_token", body).await?;
        self.store_session(Some(session.clone()));
        self.listeners
            .notify(AuthEvent::TokenRefreshed, Some(&session));
        Ok(session)
    }

    async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), GatewayError> {
        let mut url = self.endpoint("auth/v1/recover")?;
        url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        let body = serde_json::json!({ "email": email });
        send_empty(self.request(Method::POST, url).json(&body)).await
    }

    async fn update_password(&self, new_password: &str) -> Result<User, GatewayError> {
        let mut session = self.current_session().ok_or(GatewayError::SessionMissing)?;
        let url = self.endpoint("auth/v1/user")?;
        let body = serde_json::json!({ "password": new_password });
        let user: User = send_json(self.request(Method::PUT, url).json(&body)).await?;
        session.user = user.clone();
        self.store_session(Some(session.clone()));
        self.listeners.notify(AuthEvent::UserUpdated, Some(&session));
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<UserProfile>, GatewayError> {
        let mut url = self.endpoint("rest/v1/profiles")?;
        url.query_pairs_mut()
            .append_pair("select", "id,email,full_name")
            .append_pair("order", "created_at.asc");
        send_json(self.request(Method::GET, url)).await
    }

    async fn fetch_tasks_for_user(&self, user: &UserId) -> Result<Vec<Task>, GatewayError> {
        let mut url = self.tasks_url()?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("assigned_to", &format!("eq.{user}"))
            .append_pair("order", "created_at.desc");
        send_json(self.request(Method::GET, url)).await
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, GatewayError> {
        let url = self.tasks_url()?;
        let builder = self.request(Method::POST, url).json(&[task]);
        self.write_one(builder)
            .await?
            .ok_or_else(|| GatewayError::Decode("insert returned no rows".to_string()))
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, GatewayError> {
        let url = self.task_by_id_url(id)?;
        let builder = self.request(Method::PATCH, url).json(patch);
        self.write_one(builder)
            .await?
            .ok_or_else(|| GatewayError::TaskNotFound(id.clone()))
    }

    async fn update_task_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, GatewayError> {
        let url = self.task_by_id_url(id)?;
        let body = serde_json::json!({ "status": status });
        let builder = self.request(Method::PATCH, url).json(&body);
        self.write_one(builder)
            .await?
            .ok_or_else(|| GatewayError::TaskNotFound(id.clone()))
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), GatewayError> {
        let url = self.task_by_id_url(id)?;
        send_empty(self.request(Method::DELETE, url)).await
    }

    fn subscribe_to_auth_changes(&self, callback: AuthCallback) -> AuthSubscription {
        self.listeners.register(callback)
    }
}

/// Parses the project URL, making sure its path ends in `/` so endpoint
/// joins append instead of replacing the last segment.
fn parse_base_url(raw: &str) -> Result<Url, GatewayError> {
    let mut base =
        Url::parse(raw).map_err(|e| GatewayError::Transport(format!("invalid url {raw}: {e}")))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, GatewayError> {
    let response = check(builder.send().await?).await?;
    response.json().await.map_err(Into::into)
}

async fn send_empty(builder: RequestBuilder) -> Result<(), GatewayError> {
    check(builder.send().await?).await.map(|_| ())
}

/// Turns a non-2xx response into [`GatewayError::Backend`].
async fn check(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    tracing::warn!(status = status.as_u16(), %message, "backend rejected request");
    Err(GatewayError::Backend {
        status: Some(status.as_u16()),
        message,
    })
}

/// Picks the human-readable message out of an error body.
fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .msg
        .or(parsed.message)
        .or(parsed.error_description)
        .or(parsed.error)
        .filter(|m| !m.is_empty())
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty() && !trimmed.starts_with('{')).then(|| trimmed.to_string())
        })
}
