//! Shared fixtures: a service wired to a real store plus helpers to seed it.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use domains::models::{Community, NewThread, Thread, User};
use domains::ports::{CommunityRepo, ThreadRepo, UserRepo};
use fake::faker::lorem::en::Sentence;
use fake::faker::name::en::Name;
use fake::Fake;
use services::{ServiceOptions, ThreadTreeService};
use storage_adapters::{MemoryStore, RecordingRevalidator, SqliteStore};
use uuid::Uuid;

pub struct Forum {
    pub service: ThreadTreeService,
    pub threads: Arc<dyn ThreadRepo>,
    pub users: Arc<dyn UserRepo>,
    pub communities: Arc<dyn CommunityRepo>,
    pub revalidator: Arc<RecordingRevalidator>,
}

impl Forum {
    pub fn with_store<S>(store: Arc<S>, options: ServiceOptions) -> Self
    where
        S: ThreadRepo + UserRepo + CommunityRepo + 'static,
    {
        let threads: Arc<dyn ThreadRepo> = store.clone();
        let users: Arc<dyn UserRepo> = store.clone();
        let communities: Arc<dyn CommunityRepo> = store;
        let revalidator = Arc::new(RecordingRevalidator::default());
        let service = ThreadTreeService::new(
            threads.clone(),
            users.clone(),
            communities.clone(),
            revalidator.clone(),
        )
        .with_options(options);
        Self {
            service,
            threads,
            users,
            communities,
            revalidator,
        }
    }

    pub fn memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), ServiceOptions::default())
    }

    pub async fn sqlite() -> Self {
        let store = SqliteStore::new("sqlite::memory:", 1)
            .await
            .expect("in-memory SQLite store");
        Self::with_store(Arc::new(store), ServiceOptions::default())
    }

    pub async fn user(&self) -> User {
        let user = User {
            id: Uuid::now_v7(),
            name: Name().fake(),
            image: None,
            threads: Vec::new(),
        };
        self.users.upsert_user(user.clone()).await.unwrap();
        user
    }

    pub async fn community(&self, slug: &str) -> Community {
        let community = Community {
            id: Uuid::now_v7(),
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            image: Some(format!("/communities/{slug}.png")),
            threads: Vec::new(),
        };
        self.communities.upsert_community(community.clone()).await.unwrap();
        community
    }

    pub async fn post(&self, author: &User, community: Option<&str>) -> Thread {
        self.service
            .create_thread(&text(), author.id, community, "/")
            .await
            .unwrap()
    }

    pub async fn reply(&self, parent: &Thread, author: &User) -> Thread {
        self.service
            .add_comment_to_thread(parent.id, &text(), author.id, &format!("/thread/{}", parent.id))
            .await
            .unwrap()
    }

    /// Inserts a post straight into the store with a fixed timestamp.
    pub async fn post_at(&self, author: &User, text: &str, created_at: DateTime<Utc>) -> Thread {
        let post = self
            .threads
            .create_thread(NewThread::post(text, author.id, None).at(created_at))
            .await
            .unwrap();
        self.users.push_thread(author.id, post.id).await.unwrap();
        post
    }

    pub async fn reload_user(&self, id: Uuid) -> User {
        self.users.get_user(id).await.unwrap().expect("user exists")
    }

    pub async fn reload_community(&self, slug: &str) -> Community {
        self.communities
            .get_community_by_slug(slug)
            .await
            .unwrap()
            .expect("community exists")
    }

    pub async fn reload(&self, id: Uuid) -> Option<Thread> {
        self.threads.get_thread(id).await.unwrap()
    }
}

pub fn text() -> String {
    Sentence(3..8).fake()
}

/// A fixed base so seeded timestamps are strictly ordered.
pub fn base_time() -> DateTime<Utc> {
    Utc::now() - Duration::days(1)
}

/// A family used by several scenarios: A has children [B, C], B has child [D].
pub struct Family {
    pub a: Thread,
    pub b: Thread,
    pub c: Thread,
    pub d: Thread,
}

pub async fn family(forum: &Forum, alice: &User, bob: &User, community: Option<&str>) -> Family {
    let a = forum.post(alice, community).await;
    let b = forum.reply(&a, bob).await;
    let c = forum.reply(&a, alice).await;
    let d = forum.reply(&b, bob).await;
    Family { a, b, c, d }
}
