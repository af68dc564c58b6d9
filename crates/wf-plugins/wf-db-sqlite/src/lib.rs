//! # wf-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `wf-core` domain models. List-valued fields (media, tags) are stored
//! as JSON text; a NULL `tags` column keeps "no tag list" distinct from "[]".

use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;
use wf_core::error::Result;
use wf_core::models::{MediaItem, NewPost, Post};
use wf_core::traits::PostStore;

const CREATE_POSTS: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    id                  BLOB PRIMARY KEY,
    owner_id            BLOB NOT NULL,
    title               TEXT NOT NULL,
    description         TEXT,
    media               TEXT NOT NULL DEFAULT '[]',
    location_name       TEXT,
    latitude            REAL,
    longitude           REAL,
    mood                TEXT,
    tags                TEXT,
    positive_reflection TEXT,
    negative_reflection TEXT,
    physical_effort     INTEGER,
    economic_effort     INTEGER,
    spent               REAL,
    created_at          TEXT NOT NULL
)
"#;

const CREATE_OWNER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_posts_owner_created ON posts (owner_id, created_at DESC)";

const SELECT_COLUMNS: &str = "SELECT id, owner_id, title, description, media, location_name, \
     latitude, longitude, mood, tags, positive_reflection, negative_reflection, \
     physical_effort, economic_effort, spent, created_at FROM posts";

pub struct SqlitePostStore {
    pool: SqlitePool,
}

// Helper for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> anyhow::Result<Uuid> {
    Uuid::from_slice(blob).context("malformed uuid column")
}

impl SqlitePostStore {
    /// Connects and creates the schema when missing.
    ///
    /// In-memory databases get a single long-lived connection, since every
    /// new SQLite connection would otherwise see its own empty database.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| "invalid sqlite url")?
            .create_if_missing(true);

        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(CREATE_POSTS).execute(&self.pool).await?;
        sqlx::query(CREATE_OWNER_INDEX).execute(&self.pool).await?;
        debug!("sqlite schema ready");
        Ok(())
    }

    async fn fetch_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE owner_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(uuid_to_blob(owner_id))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_post).collect()
    }

    async fn fetch_one(&self, owner_id: Uuid, post_id: Uuid) -> anyhow::Result<Option<Post>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ? AND owner_id = ?"))
            .bind(uuid_to_blob(post_id))
            .bind(uuid_to_blob(owner_id))
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_post).transpose()
    }

    async fn insert(&self, post: &Post) -> anyhow::Result<()> {
        let tags = post.tags.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            "INSERT INTO posts (id, owner_id, title, description, media, location_name, \
             latitude, longitude, mood, tags, positive_reflection, negative_reflection, \
             physical_effort, economic_effort, spent, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(post.id))
        .bind(uuid_to_blob(post.owner_id))
        .bind(&post.title)
        .bind(&post.description)
        .bind(serde_json::to_string(&post.media)?)
        .bind(&post.location_name)
        .bind(post.latitude)
        .bind(post.longitude)
        .bind(&post.mood)
        .bind(tags)
        .bind(&post.positive_reflection)
        .bind(&post.negative_reflection)
        .bind(post.physical_effort.map(i64::from))
        .bind(post.economic_effort.map(i64::from))
        .bind(post.spent)
        .bind(post.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_post(row: &SqliteRow) -> anyhow::Result<Post> {
    let media: Vec<MediaItem> = serde_json::from_str(&row.try_get::<String, _>("media")?)
        .context("malformed media column")?;
    let tags = row
        .try_get::<Option<String>, _>("tags")?
        .map(|raw| serde_json::from_str::<Vec<String>>(&raw))
        .transpose()
        .context("malformed tags column")?;

    Ok(Post {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?)?,
        owner_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("owner_id")?)?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        media,
        location_name: row.try_get("location_name")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        mood: row.try_get("mood")?,
        tags,
        positive_reflection: row.try_get("positive_reflection")?,
        negative_reflection: row.try_get("negative_reflection")?,
        physical_effort: effort(row, "physical_effort")?,
        economic_effort: effort(row, "economic_effort")?,
        spent: row.try_get("spent")?,
        created_at: row.try_get("created_at")?,
    })
}

fn effort(row: &SqliteRow, column: &str) -> anyhow::Result<Option<u8>> {
    row.try_get::<Option<i64>, _>(column)?
        .map(u8::try_from)
        .transpose()
        .with_context(|| format!("{column} out of range"))
}

#[async_trait]
impl PostStore for SqlitePostStore {
    /// Newest first; ties broken by the time-ordered id.
    async fn list_posts_by_owner(&self, owner_id: Uuid) -> Result<Vec<Post>> {
        Ok(self.fetch_by_owner(owner_id).await?)
    }

    async fn insert_post(&self, owner_id: Uuid, post: NewPost) -> Result<Post> {
        let post = Post::from_new(owner_id, post, Utc::now());
        self.insert(&post).await?;
        debug!(post_id = %post.id, %owner_id, "post row inserted");
        Ok(post)
    }

    async fn get_post(&self, owner_id: Uuid, post_id: Uuid) -> Result<Option<Post>> {
        Ok(self.fetch_one(owner_id, post_id).await?)
    }
}
