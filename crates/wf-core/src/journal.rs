//! # Journal Service
//!
//! Coordinates the flow between a signed-in user and the record/object store
//! ports. Every operation takes the caller's `Session` explicitly; the owner of
//! a post is always the session's user.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::filter::{filter_posts, map_markers, FilterCriteria};
use crate::models::{MapMarker, MediaItem, MediaKind, NewPost, Post, Session};
use crate::traits::{ObjectStore, PostStore};

#[derive(Clone)]
pub struct Journal {
    posts: Arc<dyn PostStore>,
    objects: Arc<dyn ObjectStore>,
}

impl Journal {
    pub fn new(posts: Arc<dyn PostStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self { posts, objects }
    }

    /// Validates and stores a new entry for the session's user.
    pub async fn add_post(&self, session: &Session, post: NewPost) -> Result<Post> {
        let post = post.into_validated()?;
        let created = self.posts.insert_post(session.user_id(), post).await?;
        info!(owner_id = %created.owner_id, post_id = %created.id, "post created");
        Ok(created)
    }

    /// The user's posts, newest first.
    pub async fn list_posts(&self, session: &Session) -> Result<Vec<Post>> {
        self.posts.list_posts_by_owner(session.user_id()).await
    }

    /// The user's posts run through the filter/sort pipeline.
    pub async fn browse(&self, session: &Session, criteria: &FilterCriteria) -> Result<Vec<Post>> {
        let posts = self.list_posts(session).await?;
        let visible = filter_posts(&posts, criteria);
        debug!(
            owner_id = %session.user_id(),
            total = posts.len(),
            visible = visible.len(),
            "posts filtered"
        );
        Ok(visible)
    }

    pub async fn get_post(&self, session: &Session, post_id: Uuid) -> Result<Post> {
        self.posts
            .get_post(session.user_id(), post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post".into(), post_id.to_string()))
    }

    pub async fn map(&self, session: &Session) -> Result<Vec<MapMarker>> {
        let posts = self.list_posts(session).await?;
        Ok(map_markers(&posts))
    }

    /// Uploads an attachment and returns the media item to reference from a post.
    pub async fn attach_media(
        &self,
        session: &Session,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<MediaItem> {
        if data.is_empty() {
            return Err(AppError::validation("uploaded file is empty"));
        }
        let kind = media_kind_for(filename).ok_or_else(|| {
            AppError::ValidationError(format!("unsupported media type for {filename}"))
        })?;

        let path = object_path(session.user_id(), filename, Utc::now());
        let size = data.len();
        let stored = self.objects.upload_object(&path, data).await?;
        info!(owner_id = %session.user_id(), %path, size, "media uploaded");

        Ok(MediaItem {
            kind,
            url: stored.public_url,
            filename: Some(filename.to_string()),
            thumbnail_url: stored.thumbnail_url,
        })
    }
}

/// Image or video, guessed from the file extension.
pub fn media_kind_for(filename: &str) -> Option<MediaKind> {
    let mime = mime_guess::from_path(filename).first()?;
    match mime.type_() {
        mime::IMAGE => Some(MediaKind::Image),
        mime::VIDEO => Some(MediaKind::Video),
        _ => None,
    }
}

/// `<owner>/<unix millis>_<sanitized filename>`
pub fn object_path(owner_id: Uuid, filename: &str, now: DateTime<Utc>) -> String {
    format!(
        "{owner_id}/{}_{}",
        now.timestamp_millis(),
        sanitize_filename(filename)
    )
}

fn sanitize_filename(filename: &str) -> String {
    // browsers may send a full client path
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
