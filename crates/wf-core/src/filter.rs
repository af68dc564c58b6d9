//! # Filter/Sort Pipeline
//!
//! Derives the list of posts to display from the full list of a user's posts
//! and the current criteria. The stages always run in the same order:
//!
//! 1. text search over title and description
//! 2. mood substring
//! 3. tag tokens (comma separated, any token in any tag)
//! 4. location substring
//! 5. stable sort by creation time or spend
//!
//! An empty criterion never excludes anything. A non-empty criterion excludes
//! posts whose field is missing, except for the text search where a missing
//! description reads as empty. Matching is case-insensitive throughout.
//!
//! The pipeline is a pure function: it never mutates its input and has no
//! error conditions.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{MapMarker, Post};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    CreatedAt,
    Spent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// User-supplied filter and sort parameters.
///
/// Deserializes from a query string where every key is optional:
/// `?search=paris&tags=food,city&sort_by=spent&sort_order=asc`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    #[serde(rename = "search")]
    pub search_text: String,
    #[serde(rename = "mood")]
    pub mood_filter: String,
    #[serde(rename = "tags")]
    pub tags_filter: String,
    #[serde(rename = "location")]
    pub location_filter: String,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl FilterCriteria {
    /// True when no filter stage can exclude a post.
    pub fn is_unfiltered(&self) -> bool {
        Compiled::new(self).is_unfiltered()
    }
}

/// Criteria normalized once per invocation.
struct Compiled {
    search: String,
    mood: String,
    tags: Vec<String>,
    location: String,
    sort_by: SortBy,
    sort_order: SortOrder,
}

impl Compiled {
    fn new(criteria: &FilterCriteria) -> Self {
        Self {
            search: needle(&criteria.search_text),
            mood: needle(&criteria.mood_filter),
            tags: criteria
                .tags_filter
                .split(',')
                .map(needle)
                .filter(|token| !token.is_empty())
                .collect(),
            location: needle(&criteria.location_filter),
            sort_by: criteria.sort_by,
            sort_order: criteria.sort_order,
        }
    }

    fn is_unfiltered(&self) -> bool {
        self.search.is_empty()
            && self.mood.is_empty()
            && self.tags.is_empty()
            && self.location.is_empty()
    }

    fn matches(&self, post: &Post) -> bool {
        self.matches_search(post)
            && self.matches_mood(post)
            && self.matches_tags(post)
            && self.matches_location(post)
    }

    fn matches_search(&self, post: &Post) -> bool {
        if self.search.is_empty() {
            return true;
        }
        contains(&post.title, &self.search)
            || contains(post.description.as_deref().unwrap_or(""), &self.search)
    }

    fn matches_mood(&self, post: &Post) -> bool {
        self.mood.is_empty()
            || post
                .mood
                .as_deref()
                .is_some_and(|mood| contains(mood, &self.mood))
    }

    fn matches_tags(&self, post: &Post) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        let Some(tags) = post.tags.as_deref() else {
            return false;
        };
        tags.iter().any(|tag| {
            let tag = tag.to_lowercase();
            self.tags.iter().any(|token| tag.contains(token.as_str()))
        })
    }

    fn matches_location(&self, post: &Post) -> bool {
        self.location.is_empty()
            || post
                .location_name
                .as_deref()
                .is_some_and(|name| contains(name, &self.location))
    }

    fn compare(&self, a: &Post, b: &Post) -> Ordering {
        let ordering = match self.sort_by {
            SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
            SortBy::Spent => spend_key(a).total_cmp(&spend_key(b)),
        };
        match self.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Missing spend reads as zero. `+ 0.0` folds `-0.0` into `0.0` so both are
/// the same key under `total_cmp`.
fn spend_key(post: &Post) -> f64 {
    post.spent.unwrap_or(0.0) + 0.0
}

fn needle(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// `needle` must already be lower-cased.
fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Filters and sorts borrowed posts. The input slice is left untouched.
pub fn filter_refs<'a>(posts: &'a [Post], criteria: &FilterCriteria) -> Vec<&'a Post> {
    let compiled = Compiled::new(criteria);
    let mut kept: Vec<&Post> = posts.iter().filter(|p| compiled.matches(p)).collect();
    // slice::sort_by is stable, equal keys keep their input order
    kept.sort_by(|a, b| compiled.compare(a, b));
    kept
}

/// Filters and sorts posts into a new vector.
pub fn filter_posts(posts: &[Post], criteria: &FilterCriteria) -> Vec<Post> {
    filter_refs(posts, criteria).into_iter().cloned().collect()
}

/// Markers for posts that carry both coordinates, in input order.
pub fn map_markers(posts: &[Post]) -> Vec<MapMarker> {
    posts
        .iter()
        .filter_map(|post| {
            let (latitude, longitude) = post.coordinates()?;
            Some(MapMarker {
                post_id: post.id,
                title: post.title.clone(),
                location_name: post.location_name.clone(),
                latitude,
                longitude,
            })
        })
        .collect()
}
