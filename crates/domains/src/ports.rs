//! # Core Traits (Ports)
//!
//! Any storage adapter must implement these traits to back the service.
//! Each method is one round-trip to the underlying document store.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Community, NewThread, Thread, User};

/// Persistence contract for the Thread collection.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ThreadRepo: Send + Sync {
    /// Inserts a Thread; the store assigns the id and defaults `created_at`.
    async fn create_thread(&self, new: NewThread) -> anyhow::Result<Thread>;
    async fn get_thread(&self, id: Uuid) -> anyhow::Result<Option<Thread>>;
    /// Batch lookup. Missing ids are skipped; order is unspecified.
    async fn get_threads(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Thread>>;
    /// Threads whose `parent_id` equals `parent_id`.
    async fn find_children(&self, parent_id: Uuid) -> anyhow::Result<Vec<Thread>>;
    /// Top-level Threads, newest first.
    async fn list_top_level(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Thread>>;
    async fn count_top_level(&self) -> anyhow::Result<i64>;
    /// Appends `child_id` to the parent's `children`.
    async fn push_child(&self, parent_id: Uuid, child_id: Uuid) -> anyhow::Result<()>;
    /// Removes `child_id` from the parent's `children`.
    async fn pull_child(&self, parent_id: Uuid, child_id: Uuid) -> anyhow::Result<()>;
    /// Deletes every listed Thread, returning how many existed.
    async fn delete_threads(&self, ids: &[Uuid]) -> anyhow::Result<u64>;
}

/// Persistence contract for the User collection.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn upsert_user(&self, user: User) -> anyhow::Result<()>;
    async fn get_user(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn get_users(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>>;
    /// Appends `thread_id` to the user's `threads`.
    async fn push_thread(&self, user_id: Uuid, thread_id: Uuid) -> anyhow::Result<()>;
    /// For every listed user, removes every listed thread id from `threads`.
    async fn pull_threads(&self, user_ids: &[Uuid], thread_ids: &[Uuid]) -> anyhow::Result<()>;
}

/// Persistence contract for the Community collection.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommunityRepo: Send + Sync {
    async fn upsert_community(&self, community: Community) -> anyhow::Result<()>;
    async fn get_community_by_slug(&self, slug: &str) -> anyhow::Result<Option<Community>>;
    async fn get_communities(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Community>>;
    async fn push_thread(&self, community_id: Uuid, thread_id: Uuid) -> anyhow::Result<()>;
    async fn pull_threads(
        &self,
        community_ids: &[Uuid],
        thread_ids: &[Uuid],
    ) -> anyhow::Result<()>;
}

/// Cache/view invalidation hook fired after a mutation touches a page.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait PathRevalidator: Send + Sync {
    fn revalidate(&self, path: &str);
}
