//! # Domain Models
//!
//! These structs represent the core entities of the forum.
//! Records reference each other by id only; tree shapes are assembled on
//! demand into the projection types at the bottom of this file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A post or a comment. Comments carry a `parent_id`, posts do not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub text: String,
    pub author_id: Uuid,
    pub community_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub parent_id: Option<Uuid>,
    /// Direct replies in the order they were attached.
    pub children: Vec<Uuid>,
}

impl Thread {
    pub fn is_post(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Fields supplied by the caller when inserting a Thread.
/// The store assigns `id` and defaults `created_at` to now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThread {
    pub text: String,
    pub author_id: Uuid,
    pub community_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

impl NewThread {
    pub fn post(text: impl Into<String>, author_id: Uuid, community_id: Option<Uuid>) -> Self {
        Self {
            text: text.into(),
            author_id,
            community_id,
            parent_id: None,
            created_at: None,
        }
    }

    pub fn comment(text: impl Into<String>, author_id: Uuid, parent_id: Uuid) -> Self {
        Self {
            text: text.into(),
            author_id,
            community_id: None,
            parent_id: Some(parent_id),
            created_at: None,
        }
    }

    /// Pins the creation timestamp instead of letting the store pick it.
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Materialises the record the way every store does on `create`.
    pub fn into_thread(self, id: Uuid) -> Thread {
        Thread {
            id,
            text: self.text,
            author_id: self.author_id,
            community_id: self.community_id,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            parent_id: self.parent_id,
            children: Vec::new(),
        }
    }
}

/// An author. `threads` is the back-reference list of authored posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub threads: Vec<Uuid>,
}

/// A grouping of posts. `slug` is the external identifier callers use;
/// `id` is the storage id threads point at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub image: Option<String>,
    pub threads: Vec<Uuid>,
}

// ── Projections ─────────────────────────────────────────────────────────────

/// How deep a fetch resolves `children`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// One level of replies. Used by feeds and profile pages.
    Summary,
    /// Replies and replies-to-replies. Used by the thread page.
    Detail,
}

impl Projection {
    pub fn depth(self) -> usize {
        match self {
            Projection::Summary => 1,
            Projection::Detail => 2,
        }
    }
}

/// A reference that may or may not have been resolved by a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Populated<T> {
    Resolved(T),
    Ref(Uuid),
}

impl<T> Populated<T> {
    pub fn resolved(&self) -> Option<&T> {
        match self {
            Populated::Resolved(value) => Some(value),
            Populated::Ref(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Populated::Resolved(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            image: user.image.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunitySummary {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub image: Option<String>,
}

impl From<&Community> for CommunitySummary {
    fn from(community: &Community) -> Self {
        Self {
            id: community.id,
            slug: community.slug.clone(),
            name: community.name.clone(),
            image: community.image.clone(),
        }
    }
}

/// A Thread with some of its references resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadNode {
    pub id: Uuid,
    pub text: String,
    pub author: Populated<AuthorSummary>,
    pub community: Option<Populated<CommunitySummary>>,
    pub created_at: DateTime<Utc>,
    pub parent_id: Option<Uuid>,
    pub children: Vec<Populated<Box<ThreadNode>>>,
}

impl ThreadNode {
    /// Resolved direct replies, skipping unresolved references.
    pub fn replies(&self) -> impl Iterator<Item = &ThreadNode> {
        self.children
            .iter()
            .filter_map(|child| child.resolved().map(|node| node.as_ref()))
    }
}

/// One window of the top-level feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPage {
    pub posts: Vec<ThreadNode>,
    pub has_next: bool,
}

/// Result of a cascade delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedThreads {
    /// Target first, then descendants in discovery order.
    pub ids: Vec<Uuid>,
    /// Rows the store reported removed.
    pub removed: u64,
}

/// A user's posts for their profile page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserThreads {
    pub user: AuthorSummary,
    pub threads: Vec<ThreadNode>,
}
