//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.
//! Each port stands in for an external collaborator: the identity provider,
//! the record store and the object store.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AuthChange, NewPost, Post, Session, StoredObject, User};

/// Callback invoked on every auth-state change.
pub type AuthListener = Arc<dyn Fn(&AuthChange) + Send + Sync>;

/// Identity contract: accounts, sessions and auth-state notifications.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves an access token. Unknown and expired tokens yield `None`.
    async fn get_session(&self, access_token: &str) -> Result<Option<Session>>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// Registers an account and signs it in.
    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<Session>;

    /// Ends every session of the token's user.
    async fn sign_out(&self, access_token: &str) -> Result<()>;

    async fn update_profile(&self, access_token: &str, full_name: &str) -> Result<User>;

    /// Re-verifies `current_password` before storing the new one.
    async fn update_password(
        &self,
        access_token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()>;

    /// Registers a listener until the returned subscription is dropped.
    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription;
}

/// Data persistence contract for posts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Lists an owner's posts, newest first.
    async fn list_posts_by_owner(&self, owner_id: Uuid) -> Result<Vec<Post>>;

    /// Stores an already validated payload and returns the created record.
    async fn insert_post(&self, owner_id: Uuid, post: NewPost) -> Result<Post>;

    async fn get_post(&self, owner_id: Uuid, post_id: Uuid) -> Result<Option<Post>>;
}

/// Media storage contract for uploads.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Saves bytes under a relative object path and returns its public URL.
    async fn upload_object(&self, path: &str, data: Vec<u8>) -> Result<StoredObject>;
}

/// Handle for an auth-state listener. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to release.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
