//! # Session Context
//!
//! A view-scoped holder of the current session. `mount` resolves the stored
//! token and subscribes to auth-state changes; `unmount` (or drop) releases the
//! subscription. Only events about the tracked user are applied.

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Result;
use crate::models::{AuthChange, AuthEvent, Session, User};
use crate::traits::{IdentityProvider, Subscription};

pub struct SessionContext {
    identity: Arc<dyn IdentityProvider>,
    current: Arc<RwLock<Option<Session>>>,
    subscription: Option<Subscription>,
}

impl SessionContext {
    pub async fn mount(
        identity: Arc<dyn IdentityProvider>,
        access_token: Option<&str>,
    ) -> Result<Self> {
        let session = match access_token {
            Some(token) => identity.get_session(token).await?,
            None => None,
        };
        let current = Arc::new(RwLock::new(session));

        let tracked = Arc::clone(&current);
        let subscription = identity.on_auth_state_change(Arc::new(move |change: &AuthChange| {
            apply_change(&tracked, change);
        }));

        Ok(Self {
            identity,
            current,
            subscription: Some(subscription),
        })
    }

    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn user(&self) -> Option<User> {
        self.current().map(|s| s.user)
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self.identity.sign_in(email, password).await?;
        self.replace(Some(session.clone()));
        Ok(session)
    }

    pub async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<Session> {
        let session = self.identity.sign_up(email, password, full_name).await?;
        self.replace(Some(session.clone()));
        Ok(session)
    }

    /// Clears local state first, then ends the remote session.
    pub async fn sign_out(&self) -> Result<()> {
        let previous = self.current();
        self.replace(None);
        match previous {
            Some(session) => self.identity.sign_out(&session.access_token).await,
            None => Ok(()),
        }
    }

    pub fn unmount(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }

    fn replace(&self, session: Option<Session>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = session;
    }
}

fn apply_change(current: &RwLock<Option<Session>>, change: &AuthChange) {
    let mut guard = current.write().unwrap_or_else(PoisonError::into_inner);
    if guard.as_ref().map(|s| s.user.id) != Some(change.user_id) {
        return;
    }
    match change.event {
        AuthEvent::SignedOut => *guard = None,
        AuthEvent::UserUpdated | AuthEvent::SignedIn => {
            if let (Some(session), Some(updated)) = (guard.as_mut(), &change.session) {
                session.user = updated.user.clone();
            }
        }
    }
}
