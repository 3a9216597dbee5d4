//! # ThreadTreeService
//!
//! Creates, fetches and cascade-deletes threaded posts while keeping the
//! author and community back-reference lists in step.
//!
//! Multi-step mutations are plain sequences of store calls. There is no
//! transaction and no rollback: a failure part-way through is reported as
//! [`AppError::PartialFailure`] inside the operation's wrapper error.

use std::collections::HashSet;
use std::sync::Arc;

use domains::error::{AppError, Result};
use domains::models::{
    AuthorSummary, DeletedThreads, FeedPage, NewThread, Projection, Thread, ThreadNode, UserThreads,
};
use domains::ports::{CommunityRepo, PathRevalidator, ThreadRepo, UserRepo};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::populate::{distinct, Populator};

/// Behaviour switches that change observable store state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceOptions {
    /// When deleting a comment whose parent survives, also pull the comment id
    /// from the parent's `children`. Off by default: the parent keeps a
    /// dangling id.
    pub detach_from_surviving_parent: bool,
}

pub struct ThreadTreeService {
    threads: Arc<dyn ThreadRepo>,
    users: Arc<dyn UserRepo>,
    communities: Arc<dyn CommunityRepo>,
    revalidator: Arc<dyn PathRevalidator>,
    options: ServiceOptions,
}

impl ThreadTreeService {
    pub fn new(
        threads: Arc<dyn ThreadRepo>,
        users: Arc<dyn UserRepo>,
        communities: Arc<dyn CommunityRepo>,
        revalidator: Arc<dyn PathRevalidator>,
    ) -> Self {
        Self {
            threads,
            users,
            communities,
            revalidator,
            options: ServiceOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    fn populator(&self) -> Populator<'_> {
        Populator {
            threads: self.threads.as_ref(),
            users: self.users.as_ref(),
            communities: self.communities.as_ref(),
        }
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    /// Returns one page of top-level posts, newest first, with one level of
    /// replies resolved.
    #[instrument(skip(self))]
    pub async fn fetch_posts(&self, page: u32, page_size: u32) -> Result<FeedPage> {
        if page < 1 {
            return Err(AppError::ValidationError("page must be at least 1".into()));
        }
        if page_size == 0 {
            return Err(AppError::ValidationError("page size must be positive".into()));
        }
        let Some(skip) = i64::from(page - 1).checked_mul(i64::from(page_size)) else {
            // No store can hold that many posts.
            debug!(page, page_size, "feed window beyond addressable range");
            return Ok(FeedPage { posts: Vec::new(), has_next: false });
        };

        self.fetch_posts_window(skip, i64::from(page_size))
            .await
            .map_err(wrap_with(AppError::FetchError))
    }

    async fn fetch_posts_window(&self, skip: i64, limit: i64) -> Result<FeedPage> {
        let posts = self
            .threads
            .list_top_level(limit, skip)
            .await
            .map_err(AppError::store)?;
        let total = self.threads.count_top_level().await.map_err(AppError::store)?;
        let has_next = total > skip + posts.len() as i64;

        let posts = self
            .populator()
            .populate(posts, Projection::Summary.depth())
            .await
            .map_err(AppError::store)?;
        Ok(FeedPage { posts, has_next })
    }

    /// Returns a Thread with replies and replies-to-replies resolved. Deeper
    /// replies are left as id references.
    #[instrument(skip(self))]
    pub async fn fetch_thread_by_id(&self, id: Uuid) -> Result<ThreadNode> {
        self.fetch_projected(id, Projection::Detail)
            .await
            .map_err(wrap_with(AppError::FetchError))
    }

    async fn fetch_projected(&self, id: Uuid, projection: Projection) -> Result<ThreadNode> {
        let thread = self
            .threads
            .get_thread(id)
            .await
            .map_err(AppError::store)?
            .ok_or_else(|| AppError::not_found("Thread", id))?;

        let mut nodes = self
            .populator()
            .populate(vec![thread], projection.depth())
            .await
            .map_err(AppError::store)?;
        nodes
            .pop()
            .ok_or_else(|| AppError::StoreError(format!("population dropped thread {id}")))
    }

    /// Every transitive descendant of `id`, each parent before its children.
    #[instrument(skip(self))]
    pub async fn fetch_all_child_threads(&self, id: Uuid) -> Result<Vec<Thread>> {
        self.collect_descendants(id)
            .await
            .map_err(|e| AppError::FetchError(Box::new(AppError::store(e))))
    }

    /// Depth-first walk issuing one `find_children` per visited Thread.
    async fn collect_descendants(&self, root: Uuid) -> anyhow::Result<Vec<Thread>> {
        let mut seen = HashSet::from([root]);
        let mut found = Vec::new();
        let mut stack: Vec<Thread> = Vec::new();

        let roots = self.threads.find_children(root).await?;
        stack.extend(roots.into_iter().filter(|c| seen.insert(c.id)).rev());

        while let Some(thread) = stack.pop() {
            let children = self.threads.find_children(thread.id).await?;
            found.push(thread);
            stack.extend(children.into_iter().filter(|c| seen.insert(c.id)).rev());
        }

        debug!(%root, descendants = found.len(), "collected descendants");
        Ok(found)
    }

    /// The user's posts, newest first, with one level of replies resolved.
    #[instrument(skip(self))]
    pub async fn fetch_user_threads(&self, user_id: Uuid) -> Result<UserThreads> {
        self.fetch_user_threads_inner(user_id)
            .await
            .map_err(wrap_with(AppError::FetchError))
    }

    async fn fetch_user_threads_inner(&self, user_id: Uuid) -> Result<UserThreads> {
        let user = self
            .users
            .get_user(user_id)
            .await
            .map_err(AppError::store)?
            .ok_or_else(|| AppError::not_found("User", user_id))?;

        let mut posts = self
            .threads
            .get_threads(&user.threads)
            .await
            .map_err(AppError::store)?;
        sort_newest_first(&mut posts);

        let threads = self
            .populator()
            .populate(posts, Projection::Summary.depth())
            .await
            .map_err(AppError::store)?;
        Ok(UserThreads {
            user: AuthorSummary::from(&user),
            threads,
        })
    }

    /// Replies written by other people to the user's posts, newest first.
    #[instrument(skip(self))]
    pub async fn fetch_activity(&self, user_id: Uuid) -> Result<Vec<ThreadNode>> {
        self.fetch_activity_inner(user_id)
            .await
            .map_err(wrap_with(AppError::FetchError))
    }

    async fn fetch_activity_inner(&self, user_id: Uuid) -> Result<Vec<ThreadNode>> {
        let user = self
            .users
            .get_user(user_id)
            .await
            .map_err(AppError::store)?
            .ok_or_else(|| AppError::not_found("User", user_id))?;

        let posts = self
            .threads
            .get_threads(&user.threads)
            .await
            .map_err(AppError::store)?;
        let reply_ids = distinct(posts.iter().flat_map(|t| t.children.iter().copied()));
        if reply_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut replies: Vec<Thread> = self
            .threads
            .get_threads(&reply_ids)
            .await
            .map_err(AppError::store)?
            .into_iter()
            .filter(|t| t.author_id != user_id)
            .collect();
        sort_newest_first(&mut replies);

        self.populator()
            .populate(replies, 0)
            .await
            .map_err(AppError::store)
    }

    // ── Writes ──────────────────────────────────────────────────────────────

    /// Creates a top-level post and records it on its author and, when the
    /// slug resolves, its community.
    #[instrument(skip(self, text))]
    pub async fn create_thread(
        &self,
        text: &str,
        author_id: Uuid,
        community_slug: Option<&str>,
        path: &str,
    ) -> Result<Thread> {
        self.create_thread_inner(text, author_id, community_slug, path)
            .await
            .map_err(wrap_with(AppError::CreateError))
    }

    async fn create_thread_inner(
        &self,
        text: &str,
        author_id: Uuid,
        community_slug: Option<&str>,
        path: &str,
    ) -> Result<Thread> {
        validate_text(text)?;
        let author = self
            .users
            .get_user(author_id)
            .await
            .map_err(AppError::store)?
            .ok_or_else(|| AppError::not_found("User", author_id))?;

        let community_id = match community_slug {
            Some(slug) => {
                let community = self
                    .communities
                    .get_community_by_slug(slug)
                    .await
                    .map_err(AppError::store)?;
                if community.is_none() {
                    warn!(slug, "unknown community, creating a personal post");
                }
                community.map(|c| c.id)
            }
            None => None,
        };

        let mut progress = WriteProgress::new(if community_id.is_some() { 3 } else { 2 });
        let thread = progress.step(
            self.threads
                .create_thread(NewThread::post(text, author.id, community_id))
                .await,
        )?;
        progress.step(self.users.push_thread(author.id, thread.id).await)?;
        if let Some(community_id) = community_id {
            progress.step(self.communities.push_thread(community_id, thread.id).await)?;
        }

        self.revalidator.revalidate(path);
        info!(thread_id = %thread.id, author_id = %author.id, ?community_id, "created post");
        Ok(thread)
    }

    /// Creates a reply to `parent_id` and appends it to the parent's children.
    #[instrument(skip(self, text))]
    pub async fn add_comment_to_thread(
        &self,
        parent_id: Uuid,
        text: &str,
        author_id: Uuid,
        path: &str,
    ) -> Result<Thread> {
        self.add_comment_inner(parent_id, text, author_id, path)
            .await
            .map_err(wrap_with(AppError::CommentError))
    }

    async fn add_comment_inner(
        &self,
        parent_id: Uuid,
        text: &str,
        author_id: Uuid,
        path: &str,
    ) -> Result<Thread> {
        validate_text(text)?;
        let parent = self
            .threads
            .get_thread(parent_id)
            .await
            .map_err(AppError::store)?
            .ok_or_else(|| AppError::not_found("Thread", parent_id))?;
        self.users
            .get_user(author_id)
            .await
            .map_err(AppError::store)?
            .ok_or_else(|| AppError::not_found("User", author_id))?;

        let mut progress = WriteProgress::new(2);
        let comment = progress.step(
            self.threads
                .create_thread(NewThread::comment(text, author_id, parent.id))
                .await,
        )?;
        progress.step(self.threads.push_child(parent.id, comment.id).await)?;

        self.revalidator.revalidate(path);
        info!(comment_id = %comment.id, parent_id = %parent.id, "added comment");
        Ok(comment)
    }

    /// Deletes a Thread with its whole subtree and scrubs every deleted id
    /// from the affected users' and communities' `threads` lists.
    #[instrument(skip(self))]
    pub async fn delete_thread(&self, id: Uuid, path: &str) -> Result<DeletedThreads> {
        self.delete_thread_inner(id, path)
            .await
            .map_err(wrap_with(AppError::DeleteError))
    }

    async fn delete_thread_inner(&self, id: Uuid, path: &str) -> Result<DeletedThreads> {
        let main_thread = self
            .threads
            .get_thread(id)
            .await
            .map_err(AppError::store)?
            .ok_or_else(|| AppError::not_found("Thread", id))?;

        let descendants = self.collect_descendants(id).await.map_err(AppError::store)?;
        let family = || std::iter::once(&main_thread).chain(descendants.iter());

        let ids: Vec<Uuid> = family().map(|t| t.id).collect();
        let author_ids = distinct(family().map(|t| t.author_id));
        let community_ids = distinct(family().filter_map(|t| t.community_id));

        let surviving_parent = main_thread.parent_id.filter(|p| !ids.contains(p));
        let detach_parent = surviving_parent.filter(|_| self.options.detach_from_surviving_parent);

        let total = 2 + usize::from(!community_ids.is_empty()) + usize::from(detach_parent.is_some());
        let mut progress = WriteProgress::new(total);

        let removed = progress.step(self.threads.delete_threads(&ids).await)?;
        progress.step(self.users.pull_threads(&author_ids, &ids).await)?;
        if !community_ids.is_empty() {
            progress.step(self.communities.pull_threads(&community_ids, &ids).await)?;
        }
        match (detach_parent, surviving_parent) {
            (Some(parent_id), _) => {
                progress.step(self.threads.pull_child(parent_id, id).await)?;
            }
            (None, Some(parent_id)) => {
                debug!(%parent_id, child_id = %id, "surviving parent keeps the deleted child id");
            }
            (None, None) => {}
        }

        self.revalidator.revalidate(path);
        info!(thread_id = %id, removed, authors = author_ids.len(), communities = community_ids.len(), "deleted thread subtree");
        Ok(DeletedThreads { ids, removed })
    }
}

/// Counts committed writes so a mid-sequence failure can say how far it got.
struct WriteProgress {
    completed: usize,
    total: usize,
}

impl WriteProgress {
    fn new(total: usize) -> Self {
        Self { completed: 0, total }
    }

    fn step<T>(&mut self, result: anyhow::Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.completed += 1;
                Ok(value)
            }
            Err(err) if self.completed == 0 => Err(AppError::store(err)),
            Err(err) => {
                warn!(completed = self.completed, total = self.total, error = %err, "mutation left partially applied");
                Err(AppError::PartialFailure {
                    completed: self.completed,
                    total: self.total,
                    cause: format!("{err:#}"),
                })
            }
        }
    }
}

/// Wraps store-level failures in the operation's error. Lookups and input
/// errors are returned as they are.
fn wrap_with(wrapper: fn(Box<AppError>) -> AppError) -> impl FnOnce(AppError) -> AppError {
    move |err| match err {
        AppError::NotFound(..) | AppError::ValidationError(..) => err,
        other => wrapper(Box::new(other)),
    }
}

fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(AppError::ValidationError("thread text must not be empty".into()));
    }
    Ok(())
}

fn sort_newest_first(threads: &mut [Thread]) {
    threads.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}
