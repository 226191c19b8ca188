use std::sync::{Arc, Mutex, MutexGuard};

use gloo_net::http::Request;
use leptos::prelude::*;
use leptos::task::spawn_local;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::errors::AuthError;
use crate::models::User;

/// Minimum password length enforced before any request is sent.
pub const MIN_PASSWORD_LEN: usize = 6;

const REFRESH_TOKEN_KEY: &str = "chatbot.refreshToken";

/// Authentication status of the current session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    /// Startup token restore still in flight.
    Loading,
    Authenticated,
    Unauthenticated,
}

/// Session lifecycle events delivered to registered listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
}

type AuthListener = Box<dyn Fn(AuthEvent) + Send + Sync>;

/// Owns the session: identity signals, token store, and the calls to the
/// hosted auth service. Provided once via Leptos context; every other
/// component only reads it.
#[derive(Clone)]
pub struct SessionClient {
    pub status: ReadSignal<AuthStatus>,
    /// Profile fetched from the auth service (secondary identity source).
    pub user: ReadSignal<Option<User>>,
    /// User id delivered with the session payload (primary identity source).
    pub user_id: ReadSignal<Option<String>>,
    pub auth_error: ReadSignal<Option<String>>,
    pub auth_busy: ReadSignal<bool>,

    set_status: WriteSignal<AuthStatus>,
    set_user: WriteSignal<Option<User>>,
    set_user_id: WriteSignal<Option<String>>,
    set_auth_error: WriteSignal<Option<String>>,
    set_auth_busy: WriteSignal<bool>,

    access_token: Arc<Mutex<Option<String>>>,
    refresh_token: Arc<Mutex<Option<String>>>,
    listeners: Arc<Mutex<Vec<AuthListener>>>,
}

impl SessionClient {
    /// Create the session client, provide it in the Leptos context, and
    /// start the token-restore attempt.
    pub fn provide() -> Self {
        let (status, set_status) = signal(AuthStatus::Loading);
        let (user, set_user) = signal(None::<User>);
        let (user_id, set_user_id) = signal(None::<String>);
        let (auth_error, set_auth_error) = signal(None::<String>);
        let (auth_busy, set_auth_busy) = signal(false);

        let client = Self {
            status,
            user,
            user_id,
            auth_error,
            auth_busy,
            set_status,
            set_user,
            set_user_id,
            set_auth_error,
            set_auth_busy,
            access_token: Arc::new(Mutex::new(None)),
            refresh_token: Arc::new(Mutex::new(None)),
            listeners: Arc::new(Mutex::new(Vec::new())),
        };

        provide_context(client.clone());
        client.restore();
        client
    }

    /// Register a listener for session lifecycle events.
    pub fn on_auth_event(&self, f: impl Fn(AuthEvent) + Send + Sync + 'static) {
        lock(&self.listeners).push(Box::new(f));
    }

    fn emit(&self, event: AuthEvent) {
        for listener in lock(&self.listeners).iter() {
            listener(event);
        }
    }

    // --- Session operations ---

    pub fn sign_in(&self, email: String, password: String) {
        let client = self.clone();
        self.run_auth(async move {
            validate_credentials(&email, &password)?;
            let resp: SignInResponse = post_auth(
                "/signin/email-password",
                &EmailPassword { email: &email, password: &password },
            )
            .await?;
            match resp.session {
                Some(session) => {
                    client.adopt_session(session);
                    Ok(())
                }
                None => Err(AuthError::Parse("no session in sign-in response".into())),
            }
        });
    }

    pub fn sign_up(&self, email: String, password: String, first_name: String, last_name: String) {
        let client = self.clone();
        self.run_auth(async move {
            validate_credentials(&email, &password)?;
            let body = SignUpBody {
                email: &email,
                password: &password,
                options: SignUpOptions {
                    display_name: format!("{first_name} {last_name}"),
                    metadata: serde_json::json!({
                        "firstName": first_name,
                        "lastName": last_name,
                    }),
                },
            };
            let resp: SignInResponse = post_auth("/signup/email-password", &body).await?;
            match resp.session {
                Some(session) => {
                    client.adopt_session(session);
                    Ok(())
                }
                // The service accepted the account but requires verification
                // before issuing a session.
                None => Err(AuthError::Rejected(
                    "Account created. Verify your email, then sign in.".into(),
                )),
            }
        });
    }

    /// Sign out: best-effort server call, then full local teardown.
    pub fn sign_out(&self) {
        let client = self.clone();
        spawn_local(async move {
            if let Some(token) = lock(&client.refresh_token).take() {
                let result: Result<serde_json::Value, AuthError> =
                    post_auth("/signout", &RefreshBody { refresh_token: &token }).await;
                if let Err(e) = result {
                    log::warn!("Sign-out request failed: {e}");
                }
            }
            client.clear_session();
        });
    }

    /// Current access token, refreshing through the auth service when only a
    /// refresh token is at hand. Always consulted at request time.
    pub async fn get_access_token(&self) -> Option<String> {
        if let Some(token) = lock(&self.access_token).clone() {
            return Some(token);
        }
        let refresh = lock(&self.refresh_token).clone()?;
        match post_auth::<_, SessionPayload>("/token", &RefreshBody { refresh_token: &refresh })
            .await
        {
            Ok(session) => {
                let token = session.access_token.clone();
                self.adopt_session(session);
                Some(token)
            }
            Err(e) => {
                log::error!("Token refresh failed: {e}");
                None
            }
        }
    }

    /// Authorization credential plus identity header pair, derived fresh
    /// from the session for every outgoing operation. `None` when no
    /// access token can be obtained (expired session, refused refresh).
    pub async fn auth_headers(&self) -> Option<Vec<(String, String)>> {
        let token = self.get_access_token().await?;
        Some(build_auth_headers(&token, self.user_id_now()))
    }

    /// Non-reactive read of the current user id, with the profile fallback.
    pub fn user_id_now(&self) -> Option<String> {
        resolve_user_id(self.user_id.get_untracked(), self.user.get_untracked().as_ref())
    }

    // --- Internals ---

    /// Run one sign-in/sign-up attempt, tracking busy state and surfacing
    /// the most recent error verbatim.
    fn run_auth(&self, fut: impl Future<Output = Result<(), AuthError>> + 'static) {
        let set_busy = self.set_auth_busy;
        let set_error = self.set_auth_error;
        set_busy.set(true);
        set_error.set(None);
        spawn_local(async move {
            if let Err(e) = fut.await {
                set_error.set(Some(e.to_string()));
            }
            set_busy.set(false);
        });
    }

    fn adopt_session(&self, session: SessionPayload) {
        *lock(&self.access_token) = Some(session.access_token);
        if let Some(refresh) = &session.refresh_token {
            persist_refresh_token(Some(refresh));
        }
        *lock(&self.refresh_token) = session.refresh_token;

        self.set_user_id.set(session.user.as_ref().map(|u| u.id.clone()));
        self.set_user.set(session.user);
        self.set_status.set(AuthStatus::Authenticated);
        self.emit(AuthEvent::SignedIn);
        self.refresh_user_profile();
    }

    /// Fetch the full profile from the auth service; keeps the `user`
    /// signal populated even when the session payload omitted it.
    fn refresh_user_profile(&self) {
        let client = self.clone();
        spawn_local(async move {
            let Some(token) = lock(&client.access_token).clone() else {
                return;
            };
            match fetch_user(&token).await {
                Ok(user) => client.set_user.set(Some(user)),
                Err(e) => log::warn!("Fetching user profile failed: {e}"),
            }
        });
    }

    fn clear_session(&self) {
        *lock(&self.access_token) = None;
        *lock(&self.refresh_token) = None;
        persist_refresh_token(None);
        self.set_user.set(None);
        self.set_user_id.set(None);
        self.set_auth_error.set(None);
        self.set_status.set(AuthStatus::Unauthenticated);
        self.emit(AuthEvent::SignedOut);
    }

    /// Startup restore: exchange a persisted refresh token for a session.
    fn restore(&self) {
        let client = self.clone();
        spawn_local(async move {
            let Some(refresh) = stored_refresh_token() else {
                client.set_status.set(AuthStatus::Unauthenticated);
                return;
            };
            match post_auth::<_, SessionPayload>("/token", &RefreshBody { refresh_token: &refresh })
                .await
            {
                Ok(session) => client.adopt_session(session),
                Err(e) => {
                    log::warn!("Session restore failed: {e}");
                    persist_refresh_token(None);
                    client.set_status.set(AuthStatus::Unauthenticated);
                }
            }
        });
    }
}

/// Header set attached to every outgoing gateway operation.
pub fn build_auth_headers(token: &str, user_id: Option<String>) -> Vec<(String, String)> {
    let mut headers = vec![("Authorization".to_string(), format!("Bearer {token}"))];
    if let Some(id) = user_id {
        headers.push(("x-hasura-role".to_string(), "user".to_string()));
        headers.push(("x-hasura-user-id".to_string(), id));
    }
    headers
}

/// Prefer the session-payload user id, fall back to the fetched profile.
pub fn resolve_user_id(primary: Option<String>, user: Option<&User>) -> Option<String> {
    primary.or_else(|| user.map(|u| u.id.clone()))
}

/// Client-side credential checks, applied before any network call.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() {
        return Err(AuthError::Invalid("Email is required".into()));
    }
    if password.is_empty() {
        return Err(AuthError::Invalid("Password is required".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Invalid(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

// --- Wire types & HTTP helpers ---

#[derive(Serialize)]
struct EmailPassword<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    options: SignUpOptions,
}

#[derive(Serialize)]
struct SignUpOptions {
    #[serde(rename = "displayName")]
    display_name: String,
    metadata: serde_json::Value,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct SignInResponse {
    session: Option<SessionPayload>,
}

#[derive(Deserialize)]
struct SessionPayload {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken", default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

async fn post_auth<B: Serialize, T: DeserializeOwned>(
    path: &str,
    body: &B,
) -> Result<T, AuthError> {
    let url = format!("{}{path}", config::AUTH_URL);
    let resp = Request::post(&url)
        .json(body)
        .map_err(|e| AuthError::Network(e.to_string()))?
        .send()
        .await
        .map_err(|e| AuthError::Network(e.to_string()))?;

    if !resp.ok() {
        let message = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| format!("auth service returned HTTP {}", resp.status()));
        return Err(AuthError::Rejected(message));
    }

    resp.json::<T>().await.map_err(|e| AuthError::Parse(e.to_string()))
}

async fn fetch_user(access_token: &str) -> Result<User, AuthError> {
    let url = format!("{}/user", config::AUTH_URL);
    let resp = Request::get(&url)
        .header("Authorization", &format!("Bearer {access_token}"))
        .send()
        .await
        .map_err(|e| AuthError::Network(e.to_string()))?;

    if !resp.ok() {
        return Err(AuthError::Rejected(format!(
            "auth service returned HTTP {}",
            resp.status()
        )));
    }

    resp.json::<User>().await.map_err(|e| AuthError::Parse(e.to_string()))
}

fn stored_refresh_token() -> Option<String> {
    web_sys::window()?
        .local_storage()
        .ok()??
        .get_item(REFRESH_TOKEN_KEY)
        .ok()?
}

fn persist_refresh_token(token: Option<&str>) {
    let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) else {
        return;
    };
    let result = match token {
        Some(t) => storage.set_item(REFRESH_TOKEN_KEY, t),
        None => storage.remove_item(REFRESH_TOKEN_KEY),
    };
    if result.is_err() {
        log::warn!("localStorage unavailable; refresh token not persisted");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_require_email_and_password() {
        assert!(validate_credentials("", "secret1").is_err());
        assert!(validate_credentials("   ", "secret1").is_err());
        assert!(validate_credentials("a@b.c", "").is_err());
    }

    #[test]
    fn password_min_length_enforced() {
        assert!(validate_credentials("a@b.c", "12345").is_err());
        assert!(validate_credentials("a@b.c", "123456").is_ok());
    }

    #[test]
    fn auth_headers_carry_identity_pair_when_id_known() {
        let headers = build_auth_headers("tok", Some("u1".into()));
        assert_eq!(headers[0], ("Authorization".to_string(), "Bearer tok".to_string()));
        assert!(headers.contains(&("x-hasura-role".to_string(), "user".to_string())));
        assert!(headers.contains(&("x-hasura-user-id".to_string(), "u1".to_string())));
    }

    #[test]
    fn auth_headers_omit_identity_pair_without_id() {
        let headers = build_auth_headers("tok", None);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].0, "Authorization");
    }

    #[test]
    fn user_id_prefers_primary_source() {
        let user = User { id: "from-profile".into(), email: None, display_name: None };
        assert_eq!(
            resolve_user_id(Some("from-session".into()), Some(&user)),
            Some("from-session".into())
        );
        assert_eq!(resolve_user_id(None, Some(&user)), Some("from-profile".into()));
        assert_eq!(resolve_user_id(None, None), None);
    }
}
