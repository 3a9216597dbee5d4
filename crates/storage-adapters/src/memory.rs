//! # In-memory store
//!
//! An arena of records keyed by id, one `DashMap` per collection. Implements
//! every domain port, so one `Arc<MemoryStore>` can back the whole service.

use async_trait::async_trait;
use dashmap::DashMap;
use domains::models::{Community, NewThread, Thread, User};
use domains::ports::{CommunityRepo, ThreadRepo, UserRepo};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    threads: DashMap<Uuid, Thread>,
    users: DashMap<Uuid, User>,
    communities: DashMap<Uuid, Community>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }
}

fn newest_first(a: &Thread, b: &Thread) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
}

#[async_trait]
impl ThreadRepo for MemoryStore {
    async fn create_thread(&self, new: NewThread) -> anyhow::Result<Thread> {
        let thread = new.into_thread(Uuid::now_v7());
        self.threads.insert(thread.id, thread.clone());
        Ok(thread)
    }

    async fn get_thread(&self, id: Uuid) -> anyhow::Result<Option<Thread>> {
        Ok(self.threads.get(&id).map(|t| t.value().clone()))
    }

    async fn get_threads(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Thread>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.threads.get(id).map(|t| t.value().clone()))
            .collect())
    }

    async fn find_children(&self, parent_id: Uuid) -> anyhow::Result<Vec<Thread>> {
        let mut children: Vec<Thread> = self
            .threads
            .iter()
            .filter(|t| t.parent_id == Some(parent_id))
            .map(|t| t.value().clone())
            .collect();
        children.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(children)
    }

    async fn list_top_level(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Thread>> {
        let mut posts: Vec<Thread> = self
            .threads
            .iter()
            .filter(|t| t.parent_id.is_none())
            .map(|t| t.value().clone())
            .collect();
        posts.sort_by(newest_first);
        Ok(posts
            .into_iter()
            .skip(usize::try_from(offset)?)
            .take(usize::try_from(limit)?)
            .collect())
    }

    async fn count_top_level(&self) -> anyhow::Result<i64> {
        let count = self.threads.iter().filter(|t| t.parent_id.is_none()).count();
        Ok(i64::try_from(count)?)
    }

    async fn push_child(&self, parent_id: Uuid, child_id: Uuid) -> anyhow::Result<()> {
        // Matches an update on a missing document: nothing to modify.
        if let Some(mut parent) = self.threads.get_mut(&parent_id) {
            parent.children.push(child_id);
        }
        Ok(())
    }

    async fn pull_child(&self, parent_id: Uuid, child_id: Uuid) -> anyhow::Result<()> {
        if let Some(mut parent) = self.threads.get_mut(&parent_id) {
            parent.children.retain(|id| *id != child_id);
        }
        Ok(())
    }

    async fn delete_threads(&self, ids: &[Uuid]) -> anyhow::Result<u64> {
        let removed = ids.iter().filter(|id| self.threads.remove(*id).is_some()).count();
        Ok(removed as u64)
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn upsert_user(&self, user: User) -> anyhow::Result<()> {
        self.users.insert(user.id, user);
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn get_users(&self, ids: &[Uuid]) -> anyhow::Result<Vec<User>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|u| u.value().clone()))
            .collect())
    }

    async fn push_thread(&self, user_id: Uuid, thread_id: Uuid) -> anyhow::Result<()> {
        if let Some(mut user) = self.users.get_mut(&user_id) {
            user.threads.push(thread_id);
        }
        Ok(())
    }

    async fn pull_threads(&self, user_ids: &[Uuid], thread_ids: &[Uuid]) -> anyhow::Result<()> {
        for user_id in user_ids {
            if let Some(mut user) = self.users.get_mut(user_id) {
                user.threads.retain(|id| !thread_ids.contains(id));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CommunityRepo for MemoryStore {
    async fn upsert_community(&self, community: Community) -> anyhow::Result<()> {
        self.communities.insert(community.id, community);
        Ok(())
    }

    async fn get_community_by_slug(&self, slug: &str) -> anyhow::Result<Option<Community>> {
        Ok(self
            .communities
            .iter()
            .find(|c| c.slug == slug)
            .map(|c| c.value().clone()))
    }

    async fn get_communities(&self, ids: &[Uuid]) -> anyhow::Result<Vec<Community>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.communities.get(id).map(|c| c.value().clone()))
            .collect())
    }

    async fn push_thread(&self, community_id: Uuid, thread_id: Uuid) -> anyhow::Result<()> {
        if let Some(mut community) = self.communities.get_mut(&community_id) {
            community.threads.push(thread_id);
        }
        Ok(())
    }

    async fn pull_threads(
        &self,
        community_ids: &[Uuid],
        thread_ids: &[Uuid],
    ) -> anyhow::Result<()> {
        for community_id in community_ids {
            if let Some(mut community) = self.communities.get_mut(community_id) {
                community.threads.retain(|id| !thread_ids.contains(id));
            }
        }
        Ok(())
    }
}
