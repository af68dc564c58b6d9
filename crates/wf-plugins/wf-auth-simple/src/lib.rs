//! # wf-auth-simple
//!
//! In-process implementation of `IdentityProvider`.
//! Passwords are stored as Argon2 PHC strings; sessions are random bearer
//! tokens kept only as SHA-256 digests. Accounts live in memory for the
//! lifetime of the process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;
use wf_core::error::{AppError, Result};
use wf_core::models::{AuthChange, AuthEvent, Session, User};
use wf_core::traits::{AuthListener, IdentityProvider, Subscription};

const TOKEN_BYTES: usize = 32;
const BAD_CREDENTIALS: &str = "invalid login credentials";

struct Account {
    user: User,
    password_hash: String,
}

struct SessionRecord {
    email: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

type ListenerMap = DashMap<u64, AuthListener>;

pub struct SimpleIdentityProvider {
    /// Keyed by normalized email
    accounts: DashMap<String, Account>,
    /// Keyed by hex SHA-256 of the access token
    sessions: DashMap<String, SessionRecord>,
    listeners: Arc<ListenerMap>,
    next_listener: AtomicU64,
    session_ttl: Duration,
    min_password_length: usize,
    hasher: Argon2<'static>,
}

impl Default for SimpleIdentityProvider {
    fn default() -> Self {
        Self::new(Duration::days(7), 6)
    }
}

impl SimpleIdentityProvider {
    pub fn new(session_ttl: Duration, min_password_length: usize) -> Self {
        Self {
            accounts: DashMap::new(),
            sessions: DashMap::new(),
            listeners: Arc::new(DashMap::new()),
            next_listener: AtomicU64::new(0),
            session_ttl,
            min_password_length,
            hasher: Argon2::default(),
        }
    }

    /// Replaces the Argon2 instance used for new hashes, e.g. cheaper
    /// parameters in tests. Existing hashes verify with their own parameters.
    pub fn with_hasher(mut self, hasher: Argon2<'static>) -> Self {
        self.hasher = hasher;
        self
    }

    fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(AppError::internal)
    }

    fn verify_password(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(_) => return false,
        };
        self.hasher
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    fn check_password_strength(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.min_password_length {
            return Err(AppError::ValidationError(format!(
                "password must be at least {} characters",
                self.min_password_length
            )));
        }
        Ok(())
    }

    fn issue_session(&self, user: User) -> Result<Session> {
        let mut raw = [0u8; TOKEN_BYTES];
        getrandom::getrandom(&mut raw).map_err(AppError::internal)?;
        let access_token = URL_SAFE_NO_PAD.encode(raw);
        let now = Utc::now();
        let expires_at = now + self.session_ttl;

        // tokens that are never presented again would otherwise stay forever
        self.sessions.retain(|_, record| record.expires_at > now);

        self.sessions.insert(
            token_digest(&access_token),
            SessionRecord {
                email: user.email.clone(),
                user_id: user.id,
                expires_at,
            },
        );
        Ok(Session {
            access_token,
            user,
            expires_at,
        })
    }

    /// Live session for a token, dropping it if it has expired.
    fn lookup(&self, access_token: &str) -> Option<Session> {
        let digest = token_digest(access_token);
        let (email, expires_at) = {
            let record = self.sessions.get(&digest)?;
            (record.email.clone(), record.expires_at)
        };
        if Utc::now() >= expires_at {
            self.sessions.remove(&digest);
            debug!("expired session removed");
            return None;
        }
        let user = self.accounts.get(&email)?.user.clone();
        Some(Session {
            access_token: access_token.to_string(),
            user,
            expires_at,
        })
    }

    fn require(&self, access_token: &str) -> Result<Session> {
        self.lookup(access_token)
            .ok_or_else(|| AppError::unauthorized("session expired or unknown"))
    }

    fn notify(&self, event: AuthEvent, user_id: Uuid, session: Option<Session>) {
        let change = AuthChange {
            event,
            user_id,
            session,
        };
        // snapshot so no map guard is held while listeners run
        let listeners: Vec<AuthListener> = self
            .listeners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for listener in listeners {
            listener(&change);
        }
    }
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
        && !email.contains(char::is_whitespace);
    if !valid {
        return Err(AppError::validation("a valid email is required"));
    }
    Ok(email)
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn remove_listener(listeners: &Weak<ListenerMap>, id: u64) {
    if let Some(map) = listeners.upgrade() {
        map.remove(&id);
    }
}

#[async_trait]
impl IdentityProvider for SimpleIdentityProvider {
    async fn get_session(&self, access_token: &str) -> Result<Option<Session>> {
        Ok(self.lookup(access_token))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email).map_err(|_| AppError::unauthorized(BAD_CREDENTIALS))?;
        let (user, hash) = {
            let account = self
                .accounts
                .get(&email)
                .ok_or_else(|| AppError::unauthorized(BAD_CREDENTIALS))?;
            (account.user.clone(), account.password_hash.clone())
        };
        if !self.verify_password(password, &hash) {
            return Err(AppError::unauthorized(BAD_CREDENTIALS));
        }

        let session = self.issue_session(user)?;
        info!(user_id = %session.user_id(), "signed in");
        self.notify(AuthEvent::SignedIn, session.user_id(), Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<Session> {
        let email = normalize_email(email)?;
        self.check_password_strength(password)?;
        let password_hash = self.hash_password(password)?;

        let full_name = full_name.trim();
        let user = User {
            id: Uuid::now_v7(),
            email: email.clone(),
            full_name: (!full_name.is_empty()).then(|| full_name.to_string()),
            created_at: Utc::now(),
        };

        match self.accounts.entry(email) {
            Entry::Occupied(_) => {
                return Err(AppError::Conflict("email already registered".into()));
            }
            Entry::Vacant(slot) => {
                slot.insert(Account {
                    user: user.clone(),
                    password_hash,
                });
            }
        }

        let session = self.issue_session(user)?;
        info!(user_id = %session.user_id(), "account created");
        self.notify(AuthEvent::SignedIn, session.user_id(), Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let Some(session) = self.lookup(access_token) else {
            // nothing to end
            return Ok(());
        };
        let user_id = session.user_id();
        self.sessions.retain(|_, record| record.user_id != user_id);
        info!(%user_id, "signed out");
        self.notify(AuthEvent::SignedOut, user_id, None);
        Ok(())
    }

    async fn update_profile(&self, access_token: &str, full_name: &str) -> Result<User> {
        let session = self.require(access_token)?;
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(AppError::validation("full name must not be empty"));
        }

        let user = {
            let mut account = self
                .accounts
                .get_mut(&session.user.email)
                .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;
            account.user.full_name = Some(full_name.to_string());
            account.user.clone()
        };

        let updated = Session {
            user: user.clone(),
            ..session
        };
        self.notify(AuthEvent::UserUpdated, user.id, Some(updated));
        Ok(user)
    }

    async fn update_password(
        &self,
        access_token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let session = self.require(access_token)?;
        self.check_password_strength(new_password)?;

        let current_hash = self
            .accounts
            .get(&session.user.email)
            .map(|account| account.password_hash.clone())
            .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;
        if !self.verify_password(current_password, &current_hash) {
            return Err(AppError::unauthorized("current password is incorrect"));
        }

        let new_hash = self.hash_password(new_password)?;
        if let Some(mut account) = self.accounts.get_mut(&session.user.email) {
            account.password_hash = new_hash;
        }
        info!(user_id = %session.user_id(), "password changed");
        self.notify(AuthEvent::UserUpdated, session.user_id(), Some(session));
        Ok(())
    }

    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, listener);
        let listeners = Arc::downgrade(&self.listeners);
        Subscription::new(move || remove_listener(&listeners, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::{Algorithm, Params, Version};
    use std::sync::Mutex;

    /// Minimal Argon2 cost keeps the tests fast.
    fn provider() -> SimpleIdentityProvider {
        let params = Params::new(8, 1, 1, None).expect("argon2 params");
        SimpleIdentityProvider::new(Duration::hours(1), 6)
            .with_hasher(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn recorder(provider: &SimpleIdentityProvider) -> (Arc<Mutex<Vec<AuthEvent>>>, Subscription) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let sub = provider.on_auth_state_change(Arc::new(move |change: &AuthChange| {
            sink.lock().unwrap().push(change.event);
        }));
        (events, sub)
    }

    #[tokio::test]
    async fn test_sign_up_then_resolve_session() {
        let auth = provider();
        let session = auth
            .sign_up(" Ada@Example.com ", "secret1", "Ada")
            .await
            .unwrap();

        assert_eq!(session.user.email, "ada@example.com");
        assert_eq!(session.user.full_name.as_deref(), Some("Ada"));

        let resolved = auth.get_session(&session.access_token).await.unwrap();
        assert_eq!(resolved.map(|s| s.user.id), Some(session.user.id));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let auth = provider();
        auth.sign_up("ada@example.com", "secret1", "").await.unwrap();
        let err = auth
            .sign_up("ADA@example.com", "secret2", "")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_sign_up_validates_input() {
        let auth = provider();
        assert!(matches!(
            auth.sign_up("not-an-email", "secret1", "").await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            auth.sign_up("ada@example.com", "short", "").await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_in_checks_password() {
        let auth = provider();
        auth.sign_up("ada@example.com", "secret1", "").await.unwrap();

        let err = auth.sign_in("ada@example.com", "wrong!!").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        let err = auth.sign_in("bob@example.com", "secret1").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        assert!(auth.sign_in("ada@example.com", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_out_ends_every_session_and_notifies() {
        let auth = provider();
        let (events, _sub) = recorder(&auth);
        let first = auth.sign_up("ada@example.com", "secret1", "").await.unwrap();
        let second = auth.sign_in("ada@example.com", "secret1").await.unwrap();

        auth.sign_out(&first.access_token).await.unwrap();

        assert!(auth.get_session(&first.access_token).await.unwrap().is_none());
        assert!(auth.get_session(&second.access_token).await.unwrap().is_none());
        assert_eq!(
            *events.lock().unwrap(),
            [AuthEvent::SignedIn, AuthEvent::SignedIn, AuthEvent::SignedOut]
        );
    }

    #[tokio::test]
    async fn test_dropped_subscription_stops_notifications() {
        let auth = provider();
        let (events, sub) = recorder(&auth);
        drop(sub);
        auth.sign_up("ada@example.com", "secret1", "").await.unwrap();
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_session_is_unknown() {
        let params = Params::new(8, 1, 1, None).unwrap();
        let auth = SimpleIdentityProvider::new(Duration::zero(), 6)
            .with_hasher(Argon2::new(Algorithm::Argon2id, Version::V0x13, params));
        let session = auth.sign_up("ada@example.com", "secret1", "").await.unwrap();
        assert!(auth.get_session(&session.access_token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_purged_on_new_sign_in() {
        let params = Params::new(8, 1, 1, None).unwrap();
        let auth = SimpleIdentityProvider::new(Duration::zero(), 6)
            .with_hasher(Argon2::new(Algorithm::Argon2id, Version::V0x13, params));
        auth.sign_up("ada@example.com", "secret1", "").await.unwrap();
        for _ in 0..50 {
            auth.sign_in("ada@example.com", "secret1").await.unwrap();
        }
        assert_eq!(auth.sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_live_sessions_survive_the_purge() {
        let auth = provider();
        let first = auth.sign_up("ada@example.com", "secret1", "").await.unwrap();
        auth.sign_in("ada@example.com", "secret1").await.unwrap();
        assert_eq!(auth.sessions.len(), 2);
        assert!(auth.get_session(&first.access_token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_profile_update_is_visible_in_new_lookups() {
        let auth = provider();
        let (events, _sub) = recorder(&auth);
        let session = auth.sign_up("ada@example.com", "secret1", "").await.unwrap();

        assert!(auth.update_profile(&session.access_token, "  ").await.is_err());
        let user = auth
            .update_profile(&session.access_token, "Ada Lovelace")
            .await
            .unwrap();
        assert_eq!(user.full_name.as_deref(), Some("Ada Lovelace"));

        let resolved = auth.get_session(&session.access_token).await.unwrap().unwrap();
        assert_eq!(resolved.user.full_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(events.lock().unwrap().last(), Some(&AuthEvent::UserUpdated));
    }

    #[tokio::test]
    async fn test_password_change_requires_current_password() {
        let auth = provider();
        let session = auth.sign_up("ada@example.com", "secret1", "").await.unwrap();
        let token = session.access_token.as_str();

        assert!(matches!(
            auth.update_password(token, "nope!!", "secret2").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.update_password(token, "secret1", "abc").await,
            Err(AppError::ValidationError(_))
        ));
        auth.update_password(token, "secret1", "secret2").await.unwrap();

        assert!(auth.sign_in("ada@example.com", "secret1").await.is_err());
        assert!(auth.sign_in("ada@example.com", "secret2").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthorized() {
        let auth = provider();
        assert!(matches!(
            auth.update_profile("bogus", "Ada").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(auth.sign_out("bogus").await.is_ok());
    }
}
