//! Sign-in session and bearer token supply.
//!
//! The identity provider is external; this module only keeps the token set
//! it hands out. A session lives for a fixed `auth.session_minutes`
//! (30 by default) from sign-in, independent of the token's own `exp`.
//! Once it has lapsed, [`TokenProvider::bearer`] returns `None` and requests
//! go out unauthenticated. Nothing refreshes the session automatically;
//! `odin refresh` does it on demand.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::ApiClient;
use crate::config::Config;
use crate::models::TokenResponse;
use crate::persist::Persisted;
use crate::storage::Storage;

pub const SESSION_STORAGE_KEY: &str = "session-storage";

/// Source of the bearer token attached to authenticated requests.
pub trait TokenProvider: Send + Sync {
    fn bearer(&self) -> Option<String>;
}

/// A fixed token, or none.
pub struct StaticToken(pub Option<String>);

impl TokenProvider for StaticToken {
    fn bearer(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn from_tokens(tokens: TokenResponse, now: DateTime<Utc>, lifetime_minutes: i64) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            issued_at: now,
            expires_at: now + Duration::minutes(lifetime_minutes),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session: Option<Session>,
}

/// Persisted session, shared by handle.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<Persisted<SessionState>>>,
}

impl SessionStore {
    pub fn open(storage: Arc<dyn Storage>) -> Self {
        let mut persisted = Persisted::new(storage, SESSION_STORAGE_KEY);
        persisted.rehydrate();
        Self {
            inner: Arc::new(Mutex::new(persisted)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Persisted<SessionState>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn session(&self) -> Option<Session> {
        self.lock().state().session.clone()
    }

    /// The session if it has not lapsed at `now`.
    pub fn active_at(&self, now: DateTime<Utc>) -> Option<Session> {
        self.session().filter(|s| !s.is_expired_at(now))
    }

    pub fn set(&self, session: Session) {
        self.lock().update(|state| state.session = Some(session));
    }

    pub fn clear(&self) {
        self.lock().update(|state| state.session = None);
    }
}

impl TokenProvider for SessionStore {
    fn bearer(&self) -> Option<String> {
        self.active_at(Utc::now()).map(|s| s.access_token)
    }
}

/// Unverified claims read from a JWT access token, for display only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Decodes the payload segment of a JWT without checking its signature.
pub fn decode_claims(token: &str) -> Result<TokenClaims> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("access token is not a JWT"))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .context("access token payload is not base64url")?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn read_password(password: Option<String>) -> Result<String> {
    if let Some(p) = password {
        return Ok(p);
    }
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    let line = line.trim_end_matches(['\r', '\n']).to_string();
    if line.is_empty() {
        anyhow::bail!("password must not be empty");
    }
    Ok(line)
}

pub async fn run_login(
    config: &Config,
    sessions: &SessionStore,
    username: &str,
    password: Option<String>,
) -> Result<()> {
    let password = read_password(password)?;
    let api = ApiClient::new(&config.api, None)?;
    let tokens = api.login(username, &password).await?;
    let session = Session::from_tokens(tokens, Utc::now(), config.auth.session_minutes);
    println!(
        "Signed in as {} (session valid until {}).",
        username,
        session.expires_at.format("%Y-%m-%d %H:%M UTC")
    );
    sessions.set(session);
    tracing::info!(%username, "signed in");
    Ok(())
}

pub async fn run_refresh(config: &Config, sessions: &SessionStore) -> Result<()> {
    let current = sessions
        .session()
        .ok_or_else(|| anyhow::anyhow!("not signed in; run `odin login` first"))?;
    let api = ApiClient::new(&config.api, None)?;
    let tokens = api.refresh(&current.refresh_token).await?;
    let session = Session::from_tokens(tokens, Utc::now(), config.auth.session_minutes);
    println!(
        "Session refreshed (valid until {}).",
        session.expires_at.format("%Y-%m-%d %H:%M UTC")
    );
    sessions.set(session);
    Ok(())
}

pub async fn run_logout(config: &Config, sessions: &SessionStore) -> Result<()> {
    let Some(current) = sessions.session() else {
        println!("Not signed in.");
        return Ok(());
    };

    let api = ApiClient::new(&config.api, None)?;
    if let Err(e) = api.logout(&current.refresh_token).await {
        // The local session is dropped either way.
        tracing::warn!(error = %e, "backend logout failed");
    }
    sessions.clear();
    println!("Signed out.");
    Ok(())
}

pub fn run_whoami(sessions: &SessionStore) -> Result<()> {
    let Some(session) = sessions.session() else {
        println!("Not signed in.");
        return Ok(());
    };

    let claims = decode_claims(&session.access_token).unwrap_or_default();
    let now = Utc::now();
    println!(
        "user:       {}",
        claims.preferred_username.as_deref().unwrap_or("(unknown)")
    );
    if let Some(email) = &claims.email {
        println!("email:      {}", email);
    }
    println!("signed in:  {}", session.issued_at.format("%Y-%m-%d %H:%M UTC"));
    if session.is_expired_at(now) {
        println!("session:    expired (requests are sent unauthenticated)");
    } else {
        let left = (session.expires_at - now).num_minutes();
        println!("session:    active, {} min left", left);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn tokens(access: &str) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            refresh_token: "refresh".to_string(),
            expires_in: 300,
            refresh_expires_in: 1800,
            token_type: "Bearer".to_string(),
        }
    }

    #[test]
    fn session_lasts_thirty_minutes() {
        let now = Utc::now();
        let session = Session::from_tokens(tokens("a"), now, 30);
        assert!(!session.is_expired_at(now + Duration::minutes(29)));
        assert!(session.is_expired_at(now + Duration::minutes(30)));
    }

    #[test]
    fn expired_session_yields_no_bearer() {
        let sessions = SessionStore::open(Arc::new(MemoryStorage::new()));
        assert_eq!(sessions.bearer(), None);

        let issued = Utc::now() - Duration::minutes(45);
        sessions.set(Session::from_tokens(tokens("old"), issued, 30));
        assert_eq!(sessions.bearer(), None);
        assert!(sessions.session().is_some());

        sessions.set(Session::from_tokens(tokens("fresh"), Utc::now(), 30));
        assert_eq!(sessions.bearer().as_deref(), Some("fresh"));
    }

    #[test]
    fn session_persists_and_clears() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let sessions = SessionStore::open(storage.clone());
        sessions.set(Session::from_tokens(tokens("tok"), Utc::now(), 30));

        let reopened = SessionStore::open(storage.clone());
        assert_eq!(reopened.bearer().as_deref(), Some("tok"));

        reopened.clear();
        assert_eq!(SessionStore::open(storage).session(), None);
    }

    #[test]
    fn claims_from_jwt_payload() {
        let payload = URL_SAFE_NO_PAD
            .encode(r#"{"preferred_username":"freya","email":"freya@example.org","exp":1700000000}"#);
        let token = format!("eyJhbGciOiJSUzI1NiJ9.{}.sig", payload);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.preferred_username.as_deref(), Some("freya"));
        assert_eq!(claims.email.as_deref(), Some("freya@example.org"));
        assert_eq!(claims.exp, Some(1_700_000_000));
    }

    #[test]
    fn opaque_token_has_no_claims() {
        assert!(decode_claims("opaque-token").is_err());
    }
}
