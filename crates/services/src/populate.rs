//! Reference population.
//!
//! Resolves author, community and child references of a set of root Threads
//! into [`ThreadNode`] trees. Child levels are fetched one batch per level,
//! authors and communities in one batch each, then the trees are assembled
//! from the in-memory lookups.

use std::collections::{HashMap, HashSet};

use domains::models::{AuthorSummary, CommunitySummary, Populated, Thread, ThreadNode};
use domains::ports::{CommunityRepo, ThreadRepo, UserRepo};
use tracing::debug;
use uuid::Uuid;

pub(crate) struct Populator<'a> {
    pub threads: &'a dyn ThreadRepo,
    pub users: &'a dyn UserRepo,
    pub communities: &'a dyn CommunityRepo,
}

impl Populator<'_> {
    /// Resolves `depth` levels of children below each root. Children at
    /// `depth + 1` stay as bare ids. Communities are resolved on roots only.
    pub async fn populate(&self, roots: Vec<Thread>, depth: usize) -> anyhow::Result<Vec<ThreadNode>> {
        let mut arena: HashMap<Uuid, Thread> = HashMap::new();
        let mut frontier: Vec<Uuid> = roots.iter().flat_map(|t| t.children.iter().copied()).collect();

        for level in 1..=depth {
            let mut queued = HashSet::new();
            frontier.retain(|id| !arena.contains_key(id) && queued.insert(*id));
            if frontier.is_empty() {
                break;
            }
            let fetched = self.threads.get_threads(&frontier).await?;
            debug!(level, requested = frontier.len(), found = fetched.len(), "resolved child level");
            frontier = fetched.iter().flat_map(|t| t.children.iter().copied()).collect();
            arena.extend(fetched.into_iter().map(|t| (t.id, t)));
        }

        let author_ids = distinct(roots.iter().chain(arena.values()).map(|t| t.author_id));
        let authors: HashMap<Uuid, AuthorSummary> = self
            .users
            .get_users(&author_ids)
            .await?
            .iter()
            .map(|u| (u.id, AuthorSummary::from(u)))
            .collect();

        let community_ids = distinct(roots.iter().filter_map(|t| t.community_id));
        let communities: HashMap<Uuid, CommunitySummary> = if community_ids.is_empty() {
            HashMap::new()
        } else {
            self.communities
                .get_communities(&community_ids)
                .await?
                .iter()
                .map(|c| (c.id, CommunitySummary::from(c)))
                .collect()
        };

        let lookup = Lookup { arena, authors, communities };
        Ok(roots.iter().map(|root| lookup.build(root, depth, true)).collect())
    }
}

struct Lookup {
    arena: HashMap<Uuid, Thread>,
    authors: HashMap<Uuid, AuthorSummary>,
    communities: HashMap<Uuid, CommunitySummary>,
}

impl Lookup {
    fn build(&self, thread: &Thread, remaining: usize, is_root: bool) -> ThreadNode {
        let author = match self.authors.get(&thread.author_id) {
            Some(summary) => Populated::Resolved(summary.clone()),
            None => Populated::Ref(thread.author_id),
        };

        let community = thread.community_id.map(|id| match self.communities.get(&id) {
            Some(summary) if is_root => Populated::Resolved(summary.clone()),
            _ => Populated::Ref(id),
        });

        let children = if remaining == 0 {
            thread.children.iter().map(|id| Populated::Ref(*id)).collect()
        } else {
            // Ids whose Thread no longer exists are dropped from resolved levels.
            thread
                .children
                .iter()
                .filter_map(|id| self.arena.get(id))
                .map(|child| Populated::Resolved(Box::new(self.build(child, remaining - 1, false))))
                .collect()
        };

        ThreadNode {
            id: thread.id,
            text: thread.text.clone(),
            author,
            community,
            created_at: thread.created_at,
            parent_id: thread.parent_id,
            children,
        }
    }
}

/// Deduplicates while keeping first-seen order.
pub(crate) fn distinct(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
