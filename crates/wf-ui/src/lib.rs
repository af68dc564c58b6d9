//! # wf-ui
//!
//! Askama views for the journal pages. Handlers build the view structs from
//! domain values so templates only deal with ready-to-print strings.

use askama::Template;
use wf_core::filter::{FilterCriteria, SortBy, SortOrder};
use wf_core::models::{MapMarker, MediaKind, Post, User};

const DATE_FORMAT: &str = "%d %b %Y";

/// One tile of the post grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PostCard {
    pub id: String,
    pub title: String,
    pub date: String,
    /// Empty when the post has nothing to show
    pub cover_url: String,
    pub first_tag: String,
}

impl From<&Post> for PostCard {
    fn from(post: &Post) -> Self {
        let cover_url = post.media.first().map(|media| match media.kind {
            MediaKind::Image => media.thumbnail_url.clone().unwrap_or_else(|| media.url.clone()),
            MediaKind::Video => media.thumbnail_url.clone().unwrap_or_default(),
        });
        Self {
            id: post.id.to_string(),
            title: post.title.clone(),
            date: post.created_at.format(DATE_FORMAT).to_string(),
            cover_url: cover_url.unwrap_or_default(),
            first_tag: post
                .tags
                .as_ref()
                .and_then(|tags| tags.first().cloned())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaView {
    pub url: String,
    pub is_video: bool,
}

/// The detail page of a single post. Only fields the post actually carries
/// end up in `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDetail {
    pub title: String,
    pub media: Vec<MediaView>,
    pub fields: Vec<(&'static str, String)>,
    pub created: String,
}

impl From<&Post> for PostDetail {
    fn from(post: &Post) -> Self {
        let mut fields = Vec::new();
        let mut push = |label: &'static str, value: Option<String>| {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                fields.push((label, value));
            }
        };

        push("Description", post.description.clone());
        push("Location", post.location_name.clone());
        push("Mood", post.mood.clone());
        push(
            "Tags",
            post.tags.as_ref().map(|tags| {
                tags.iter()
                    .map(|t| format!("#{t}"))
                    .collect::<Vec<_>>()
                    .join(" ")
            }),
        );
        push("What went well", post.positive_reflection.clone());
        push("What could be better", post.negative_reflection.clone());
        push(
            "Physical effort",
            post.physical_effort.map(|e| format!("{e}/5")),
        );
        push(
            "Economic effort",
            post.economic_effort.map(|e| format!("{e}/5")),
        );
        push("Spent", post.spent.map(|s| format!("{s:.2}")));

        Self {
            title: post.title.clone(),
            media: post
                .media
                .iter()
                .map(|m| MediaView {
                    url: m.url.clone(),
                    is_video: m.kind == MediaKind::Video,
                })
                .collect(),
            fields,
            created: post.created_at.format(DATE_FORMAT).to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub title: &'a str,
    pub user_name: &'a str,
    pub search: &'a str,
    pub mood: &'a str,
    pub tags: &'a str,
    pub location: &'a str,
    pub sort_by_spent: bool,
    pub order_asc: bool,
    pub cards: Vec<PostCard>,
    pub markers: &'a [MapMarker],
}

impl<'a> IndexTemplate<'a> {
    /// Builds the grid page for an already filtered list of posts.
    pub fn new(
        user_name: &'a str,
        criteria: &'a FilterCriteria,
        posts: &[&Post],
        markers: &'a [MapMarker],
    ) -> Self {
        Self {
            title: "My trips",
            user_name,
            search: &criteria.search_text,
            mood: &criteria.mood_filter,
            tags: &criteria.tags_filter,
            location: &criteria.location_filter,
            sort_by_spent: criteria.sort_by == SortBy::Spent,
            order_asc: criteria.sort_order == SortOrder::Asc,
            cards: posts.iter().map(|post| PostCard::from(*post)).collect(),
            markers,
        }
    }
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate<'a> {
    pub title: &'a str,
    pub user_name: &'a str,
    pub post: PostDetail,
}

impl<'a> PostTemplate<'a> {
    pub fn new(user_name: &'a str, post: &'a Post) -> Self {
        Self {
            title: &post.title,
            user_name,
            post: PostDetail::from(post),
        }
    }
}

#[derive(Template)]
#[template(path = "signin.html")]
pub struct SignInTemplate<'a> {
    pub title: &'a str,
    pub user_name: &'a str,
    pub email: &'a str,
    pub error: &'a str,
}

impl<'a> SignInTemplate<'a> {
    pub fn new(email: &'a str, error: &'a str) -> Self {
        Self {
            title: "Sign in",
            user_name: "",
            email,
            error,
        }
    }
}

/// Raw values of the new-trip form, echoed back when a submission is rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostForm {
    pub title: String,
    pub description: String,
    pub location_name: String,
    pub latitude: String,
    pub longitude: String,
    pub mood: String,
    pub tags: String,
    pub positive_reflection: String,
    pub negative_reflection: String,
    pub physical_effort: String,
    pub economic_effort: String,
    pub spent: String,
}

impl PostForm {
    /// Stores a text field by its form name. Unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "title" => &mut self.title,
            "description" => &mut self.description,
            "location_name" => &mut self.location_name,
            "latitude" => &mut self.latitude,
            "longitude" => &mut self.longitude,
            "mood" => &mut self.mood,
            "tags" => &mut self.tags,
            "positive_reflection" => &mut self.positive_reflection,
            "negative_reflection" => &mut self.negative_reflection,
            "physical_effort" => &mut self.physical_effort,
            "economic_effort" => &mut self.economic_effort,
            "spent" => &mut self.spent,
            _ => return,
        };
        *slot = value;
    }
}

#[derive(Template)]
#[template(path = "new_post.html")]
pub struct NewPostTemplate<'a> {
    pub title: &'a str,
    pub user_name: &'a str,
    pub form: &'a PostForm,
    pub error: &'a str,
}

impl<'a> NewPostTemplate<'a> {
    pub fn new(user_name: &'a str, form: &'a PostForm, error: &'a str) -> Self {
        Self {
            title: "New trip",
            user_name,
            form,
            error,
        }
    }
}

#[derive(Template)]
#[template(path = "settings.html")]
pub struct SettingsTemplate<'a> {
    pub title: &'a str,
    pub user_name: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
    pub notice: &'a str,
    pub error: &'a str,
}

impl<'a> SettingsTemplate<'a> {
    pub fn new(user: &'a User, user_name: &'a str, notice: &'a str, error: &'a str) -> Self {
        Self {
            title: "Settings",
            user_name,
            email: &user.email,
            full_name: user.full_name.as_deref().unwrap_or(""),
            notice,
            error,
        }
    }
}
