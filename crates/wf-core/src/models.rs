//! # Domain Models
//!
//! These structs represent the core entities of Wayfarer.
//! We use UUID v7 for time-ordered, globally unique identification.
//!
//! Every field besides `title` is optional on a post and is modelled as
//! `Option`, so a missing value is never confused with an empty one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Inclusive bounds of the effort scales.
pub const EFFORT_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// An uploaded attachment, as referenced from a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Small preview generated by the object store, images only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// A single journaled trip entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    /// The user that created the entry
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    pub location_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub mood: Option<String>,
    /// `None` when the entry was stored without a tag list at all
    pub tags: Option<Vec<String>>,
    pub positive_reflection: Option<String>,
    pub negative_reflection: Option<String>,
    pub physical_effort: Option<u8>,
    pub economic_effort: Option<u8>,
    pub spent: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Materializes a validated payload into a stored record.
    pub fn from_new(owner_id: Uuid, new: NewPost, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            owner_id,
            title: new.title,
            description: new.description,
            media: new.media,
            location_name: new.location_name,
            latitude: new.latitude,
            longitude: new.longitude,
            mood: new.mood,
            tags: new.tags,
            positive_reflection: new.positive_reflection,
            negative_reflection: new.negative_reflection,
            physical_effort: new.physical_effort,
            economic_effort: new.economic_effort,
            spent: new.spent,
            created_at,
        }
    }

    /// Both coordinates, when the entry has a full place reference.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// The add-post payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub positive_reflection: Option<String>,
    #[serde(default)]
    pub negative_reflection: Option<String>,
    #[serde(default)]
    pub physical_effort: Option<u8>,
    #[serde(default)]
    pub economic_effort: Option<u8>,
    #[serde(default)]
    pub spent: Option<f64>,
}

impl NewPost {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Trims text fields and turns blank ones into `None`.
    /// Tags are trimmed individually and blank labels dropped.
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: clean(self.description),
            media: self.media,
            location_name: clean(self.location_name),
            latitude: self.latitude,
            longitude: self.longitude,
            mood: clean(self.mood),
            tags: self.tags.map(|tags| {
                tags.into_iter()
                    .filter_map(|tag| clean(Some(tag)))
                    .collect()
            }),
            positive_reflection: clean(self.positive_reflection),
            negative_reflection: clean(self.negative_reflection),
            physical_effort: self.physical_effort,
            economic_effort: self.economic_effort,
            // -0.0 is stored as 0.0
            spent: self.spent.map(|spent| spent + 0.0),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::validation("title must not be empty"));
        }
        check_effort("physical_effort", self.physical_effort)?;
        check_effort("economic_effort", self.economic_effort)?;

        if let Some(spent) = self.spent {
            if !spent.is_finite() || spent < 0.0 {
                return Err(AppError::validation("spent must be a non-negative amount"));
            }
        }
        if let Some(lat) = self.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(AppError::validation("latitude must be within [-90, 90]"));
            }
        }
        if let Some(lon) = self.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(AppError::validation("longitude must be within [-180, 180]"));
            }
        }
        if self.media.iter().any(|m| m.url.trim().is_empty()) {
            return Err(AppError::validation("media url must not be empty"));
        }
        Ok(())
    }

    /// Normalizes, then validates.
    pub fn into_validated(self) -> Result<Self> {
        let post = self.normalized();
        post.validate()?;
        Ok(post)
    }
}

fn clean(text: Option<String>) -> Option<String> {
    text.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn check_effort(field: &str, value: Option<u8>) -> Result<()> {
    match value {
        Some(v) if !EFFORT_RANGE.contains(&v) => Err(AppError::ValidationError(format!(
            "{field} must be between {} and {}",
            EFFORT_RANGE.start(),
            EFFORT_RANGE.end()
        ))),
        _ => Ok(()),
    }
}

/// An account known to the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An authenticated session. Passed explicitly to every operation that
/// needs an owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    UserUpdated,
}

/// Payload delivered to auth-state listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub user_id: Uuid,
    /// The session after the change; `None` on sign-out.
    pub session: Option<Session>,
}

/// Result of an object-store upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub public_url: String,
    pub thumbnail_url: Option<String>,
}

/// A point on the travel map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub post_id: Uuid,
    pub title: String,
    pub location_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}
