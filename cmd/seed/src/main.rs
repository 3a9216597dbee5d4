//! # seed
//!
//! Populates the configured store with a small demo forum, then prints the
//! first feed page and the demo thread tree as JSON.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use configs::{Backend, Settings};
use domains::models::{Community, User};
use domains::ports::{CommunityRepo, ThreadRepo, UserRepo};
use services::{ServiceOptions, ThreadTreeService};
use storage_adapters::{MemoryStore, TracingRevalidator};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

struct Stores {
    threads: Arc<dyn ThreadRepo>,
    users: Arc<dyn UserRepo>,
    communities: Arc<dyn CommunityRepo>,
}

impl Stores {
    fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: ThreadRepo + UserRepo + CommunityRepo + 'static,
    {
        Self {
            threads: store.clone(),
            users: store.clone(),
            communities: store,
        }
    }
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn open_stores(settings: &Settings) -> Result<Stores> {
    match settings.database.backend {
        Backend::Memory => Ok(Stores::from_shared(Arc::new(MemoryStore::new()))),
        #[cfg(feature = "db-sqlite")]
        Backend::Sqlite => {
            use secrecy::ExposeSecret;
            let store = storage_adapters::SqliteStore::new(
                settings.database.url.expose_secret(),
                settings.database.max_connections,
            )
            .await?;
            Ok(Stores::from_shared(Arc::new(store)))
        }
        #[cfg(not(feature = "db-sqlite"))]
        Backend::Sqlite => bail!("this build was compiled without the db-sqlite feature"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;
    init_tracing(&settings);

    let stores = open_stores(&settings).await?;
    let users = stores.users.clone();
    let communities = stores.communities.clone();
    let service = ThreadTreeService::new(
        stores.threads,
        stores.users,
        stores.communities,
        Arc::new(TracingRevalidator),
    )
    .with_options(ServiceOptions {
        detach_from_surviving_parent: settings.service.detach_from_surviving_parent,
    });

    let alice = User {
        id: Uuid::now_v7(),
        name: "alice".into(),
        image: Some("/avatars/alice.png".into()),
        threads: Vec::new(),
    };
    let bob = User {
        id: Uuid::now_v7(),
        name: "bob".into(),
        image: None,
        threads: Vec::new(),
    };
    users.upsert_user(alice.clone()).await?;
    users.upsert_user(bob.clone()).await?;
    communities
        .upsert_community(Community {
            id: Uuid::now_v7(),
            slug: "rustaceans".into(),
            name: "Rustaceans".into(),
            image: None,
            threads: Vec::new(),
        })
        .await?;

    let post = service
        .create_thread("What are you building this week?", alice.id, Some("rustaceans"), "/")
        .await?;
    let reply = service
        .add_comment_to_thread(post.id, "A thread tree on top of sqlx.", bob.id, "/")
        .await?;
    service
        .add_comment_to_thread(reply.id, "Nice, does it cascade deletes?", alice.id, "/")
        .await?;
    service
        .create_thread("Personal note: remember to write tests.", bob.id, None, "/")
        .await?;

    let feed = service.fetch_posts(1, 20).await?;
    if feed.posts.is_empty() {
        bail!("seeded feed came back empty");
    }
    info!(posts = feed.posts.len(), has_next = feed.has_next, "seeded demo forum");

    println!("{}", serde_json::to_string_pretty(&feed)?);
    println!("{}", serde_json::to_string_pretty(&service.fetch_thread_by_id(post.id).await?)?);
    Ok(())
}
