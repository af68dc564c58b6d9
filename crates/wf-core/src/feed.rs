//! # Feed Controller
//!
//! Owns the state a post list view needs and decides when the pipeline runs.
//! Free-text criteria are debounced: a keystroke only arms a deadline, and the
//! pending text is promoted once `poll` observes the quiescence period has
//! passed since the last keystroke. Sort changes and new post lists apply
//! immediately.
//!
//! Time is passed in by the caller, which keeps the controller synchronous
//! and deterministic.

use std::time::{Duration, Instant};

use crate::filter::{filter_posts, FilterCriteria, SortBy, SortOrder};
use crate::models::Post;

/// Quiescence period applied to free-text criteria.
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(300);

/// The debounced text inputs of the filter bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Search,
    Mood,
    Tags,
    Location,
}

#[derive(Debug, Clone)]
pub struct FeedController {
    posts: Vec<Post>,
    applied: FilterCriteria,
    pending: FilterCriteria,
    deadline: Option<Instant>,
    quiescence: Duration,
    visible: Vec<Post>,
}

impl Default for FeedController {
    fn default() -> Self {
        Self::new(DEFAULT_QUIESCENCE)
    }
}

impl FeedController {
    pub fn new(quiescence: Duration) -> Self {
        Self {
            posts: Vec::new(),
            applied: FilterCriteria::default(),
            pending: FilterCriteria::default(),
            deadline: None,
            quiescence,
            visible: Vec::new(),
        }
    }

    /// Replaces the post list, e.g. after a fetch from the record store.
    pub fn set_posts(&mut self, posts: Vec<Post>) {
        self.posts = posts;
        self.recompute();
    }

    /// Puts a freshly created post in front of the list.
    pub fn prepend_post(&mut self, post: Post) {
        self.posts.insert(0, post);
        self.recompute();
    }

    /// Drops every post, e.g. on sign-out.
    pub fn clear(&mut self) {
        self.posts.clear();
        self.recompute();
    }

    /// Records a keystroke. The value is applied by a later `poll`.
    pub fn input_text(&mut self, field: TextField, value: impl Into<String>, now: Instant) {
        let value = value.into();
        match field {
            TextField::Search => self.pending.search_text = value,
            TextField::Mood => self.pending.mood_filter = value,
            TextField::Tags => self.pending.tags_filter = value,
            TextField::Location => self.pending.location_filter = value,
        }
        self.deadline = Some(now + self.quiescence);
    }

    /// Applies a sort change right away. Pending text keeps waiting.
    pub fn set_sort(&mut self, sort_by: SortBy, sort_order: SortOrder) {
        self.pending.sort_by = sort_by;
        self.pending.sort_order = sort_order;
        if self.applied.sort_by != sort_by || self.applied.sort_order != sort_order {
            self.applied.sort_by = sort_by;
            self.applied.sort_order = sort_order;
            self.recompute();
        }
    }

    /// Promotes pending text once the deadline has passed.
    /// Returns whether the visible list was recomputed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                if self.pending == self.applied {
                    return false;
                }
                self.applied = self.pending.clone();
                self.recompute();
                true
            }
            _ => false,
        }
    }

    /// Back to default criteria, e.g. on navigation.
    pub fn reset(&mut self) {
        self.applied = FilterCriteria::default();
        self.pending = FilterCriteria::default();
        self.deadline = None;
        self.recompute();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn visible(&self) -> &[Post] {
        &self.visible
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Criteria the visible list was computed with.
    pub fn criteria(&self) -> &FilterCriteria {
        &self.applied
    }

    /// Criteria as typed, including text not yet applied.
    pub fn pending(&self) -> &FilterCriteria {
        &self.pending
    }

    fn recompute(&mut self) {
        self.visible = filter_posts(&self.posts, &self.applied);
    }
}
