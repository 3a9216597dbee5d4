//! # SQLite store
//!
//! Maps the document-shaped domain records onto SQLite. Ordered id lists
//! (`Thread.children`, `User.threads`, `Community.threads`) live in link
//! tables with an explicit position so push/pull behave like array updates.
//!
//! Like the document store it stands in for, there are no foreign keys:
//! dangling ids are possible and the service is responsible for scrubbing them.

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::models::{Community, NewThread, Thread, User};
use domains::ports::{CommunityRepo, ThreadRepo, UserRepo};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::info;
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id    BLOB PRIMARY KEY,
    name  TEXT NOT NULL,
    image TEXT
);

CREATE TABLE IF NOT EXISTS communities (
    id    BLOB PRIMARY KEY,
    slug  TEXT NOT NULL UNIQUE,
    name  TEXT NOT NULL,
    image TEXT
);

CREATE TABLE IF NOT EXISTS threads (
    id           BLOB PRIMARY KEY,
    text         TEXT NOT NULL,
    author_id    BLOB NOT NULL,
    community_id BLOB,
    parent_id    BLOB,
    created_at   INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_threads_parent ON threads(parent_id);
CREATE INDEX IF NOT EXISTS idx_threads_feed ON threads(created_at DESC, id DESC) WHERE parent_id IS NULL;

CREATE TABLE IF NOT EXISTS thread_children (
    parent_id BLOB NOT NULL,
    child_id  BLOB NOT NULL,
    position  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_thread_children ON thread_children(parent_id, position);

CREATE TABLE IF NOT EXISTS user_threads (
    user_id   BLOB NOT NULL,
    thread_id BLOB NOT NULL,
    position  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_user_threads ON user_threads(user_id, position);

CREATE TABLE IF NOT EXISTS community_threads (
    community_id BLOB NOT NULL,
    thread_id    BLOB NOT NULL,
    position     INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_community_threads ON community_threads(community_id, position);
"#;

const THREAD_COLUMNS: &str = "id, text, author_id, community_id, parent_id, created_at";

/// Ids bound per statement. SQLite rejects statements with more than 32766
/// parameters, and `pull_ids` binds two lists at once.
const MAX_BIND_IDS: usize = 10_000;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (or creates) the database at `url` and applies the schema.
    ///
    /// In-memory URLs (`sqlite::memory:`, `file:...?mode=memory`) are pinned
    /// to a single long-lived connection, since every SQLite connection gets
    /// its own private in-memory database.
    pub async fn new(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid SQLite URL {url}"))?
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
        if is_in_memory_url(url) {
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .context("Failed to apply SQLite schema")?;
        info!(url, "SQLite store ready");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Loads the ordered `children` lists of the given threads.
    async fn children_of(&self, parent_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Uuid>>> {
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        if parent_ids.is_empty() {
            return Ok(children);
        }
        for chunk in parent_ids.chunks(MAX_BIND_IDS) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT parent_id, child_id FROM thread_children WHERE parent_id IN ",
            );
            push_id_list(&mut qb, chunk);
            qb.push(" ORDER BY parent_id, position");

            for row in qb.build().fetch_all(&self.pool).await? {
                let parent: Uuid = row.try_get("parent_id")?;
                children.entry(parent).or_default().push(row.try_get("child_id")?);
            }
        }
        Ok(children)
    }

    /// Turns `threads` rows into records with their `children` attached.
    async fn hydrate(&self, rows: Vec<SqliteRow>) -> Result<Vec<Thread>> {
        let mut threads = rows.iter().map(thread_from_row).collect::<Result<Vec<_>>>()?;
        let ids: Vec<Uuid> = threads.iter().map(|t| t.id).collect();
        let mut children = self.children_of(&ids).await?;
        for thread in &mut threads {
            thread.children = children.remove(&thread.id).unwrap_or_default();
        }
        Ok(threads)
    }

    async fn id_lists(&self, table: &str, owner_column: &str, owner_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Uuid>>> {
        let mut lists: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        if owner_ids.is_empty() {
            return Ok(lists);
        }
        for chunk in owner_ids.chunks(MAX_BIND_IDS) {
            let mut qb = QueryBuilder::<Sqlite>::new(format!(
                "SELECT {owner_column} AS owner, thread_id FROM {table} WHERE {owner_column} IN "
            ));
            push_id_list(&mut qb, chunk);
            qb.push(format!(" ORDER BY {owner_column}, position"));

            for row in qb.build().fetch_all(&self.pool).await? {
                let owner: Uuid = row.try_get("owner")?;
                lists.entry(owner).or_default().push(row.try_get("thread_id")?);
            }
        }
        Ok(lists)
    }

    /// Replaces an owner's whole id list, as a document overwrite would.
    async fn replace_id_list(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        table: &str,
        owner_column: &str,
        owner_id: Uuid,
        thread_ids: &[Uuid],
    ) -> Result<()> {
        sqlx::query(&format!("DELETE FROM {table} WHERE {owner_column} = ?"))
            .bind(owner_id)
            .execute(&mut **tx)
            .await?;
        for (position, thread_id) in thread_ids.iter().enumerate() {
            sqlx::query(&format!(
                "INSERT INTO {table} ({owner_column}, thread_id, position) VALUES (?, ?, ?)"
            ))
            .bind(owner_id)
            .bind(*thread_id)
            .bind(position as i64)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Appends to an owner's list; a missing owner is left untouched.
    async fn push_id(&self, table: &str, owner_column: &str, owner_table: &str, owner_id: Uuid, thread_id: Uuid) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO {table} ({owner_column}, thread_id, position) \
             SELECT o.id, ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM {table} WHERE {owner_column} = o.id) \
             FROM {owner_table} o WHERE o.id = ?"
        ))
        .bind(thread_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pull_ids(&self, table: &str, owner_column: &str, owner_ids: &[Uuid], thread_ids: &[Uuid]) -> Result<()> {
        if owner_ids.is_empty() || thread_ids.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for owners in owner_ids.chunks(MAX_BIND_IDS) {
            for threads in thread_ids.chunks(MAX_BIND_IDS) {
                let mut qb = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {table} WHERE {owner_column} IN "));
                push_id_list(&mut qb, owners);
                qb.push(" AND thread_id IN ");
                push_id_list(&mut qb, threads);
                qb.build().execute(&mut *tx).await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[Uuid]) {
    qb.push("(");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

fn is_in_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

fn thread_from_row(row: &SqliteRow) -> Result<Thread> {
    let micros: i64 = row.try_get("created_at")?;
    Ok(Thread {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        author_id: row.try_get("author_id")?,
        community_id: row.try_get("community_id")?,
        created_at: DateTime::<Utc>::from_timestamp_micros(micros)
            .with_context(|| format!("created_at out of range: {micros}"))?,
        parent_id: row.try_get("parent_id")?,
        children: Vec::new(),
    })
}

#[async_trait]
impl ThreadRepo for SqliteStore {
    async fn create_thread(&self, new: NewThread) -> Result<Thread> {
        let thread = new.into_thread(Uuid::now_v7());
        sqlx::query(
            "INSERT INTO threads (id, text, author_id, community_id, parent_id, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(thread.id)
        .bind(&thread.text)
        .bind(thread.author_id)
        .bind(thread.community_id)
        .bind(thread.parent_id)
        .bind(thread.created_at.timestamp_micros())
        .execute(&self.pool)
        .await
        .context("insert thread")?;
        Ok(thread)
    }

    async fn get_thread(&self, id: Uuid) -> Result<Option<Thread>> {
        let row = sqlx::query(&format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn get_threads(&self, ids: &[Uuid]) -> Result<Vec<Thread>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut rows = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_BIND_IDS) {
            let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id IN "));
            push_id_list(&mut qb, chunk);
            rows.extend(qb.build().fetch_all(&self.pool).await?);
        }
        self.hydrate(rows).await
    }

    async fn find_children(&self, parent_id: Uuid) -> Result<Vec<Thread>> {
        let rows = sqlx::query(&format!(
            "SELECT {THREAD_COLUMNS} FROM threads WHERE parent_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;
        self.hydrate(rows).await
    }

    async fn list_top_level(&self, limit: i64, offset: i64) -> Result<Vec<Thread>> {
        let rows = sqlx::query(&format!(
            "SELECT {THREAD_COLUMNS} FROM threads WHERE parent_id IS NULL \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        self.hydrate(rows).await
    }

    async fn count_top_level(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM threads WHERE parent_id IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn push_child(&self, parent_id: Uuid, child_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO thread_children (parent_id, child_id, position) \
             SELECT t.id, ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM thread_children WHERE parent_id = t.id) \
             FROM threads t WHERE t.id = ?",
        )
        .bind(child_id)
        .bind(parent_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pull_child(&self, parent_id: Uuid, child_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM thread_children WHERE parent_id = ? AND child_id = ?")
            .bind(parent_id)
            .bind(child_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_threads(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        // One bulk delete: the documents and the child lists embedded in them.
        let mut tx = self.pool.begin().await?;

        let mut removed = 0;
        for chunk in ids.chunks(MAX_BIND_IDS) {
            let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM threads WHERE id IN ");
            push_id_list(&mut qb, chunk);
            removed += qb.build().execute(&mut *tx).await?.rows_affected();

            let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM thread_children WHERE parent_id IN ");
            push_id_list(&mut qb, chunk);
            qb.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(removed)
    }
}

#[async_trait]
impl UserRepo for SqliteStore {
    async fn upsert_user(&self, user: User) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO users (id, name, image) VALUES (?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, image = excluded.image",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.image)
        .execute(&mut *tx)
        .await?;
        Self::replace_id_list(&mut tx, "user_threads", "user_id", user.id, &user.threads).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.get_users(&[id]).await?.pop())
    }

    async fn get_users(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut rows = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_BIND_IDS) {
            let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, name, image FROM users WHERE id IN ");
            push_id_list(&mut qb, chunk);
            rows.extend(qb.build().fetch_all(&self.pool).await?);
        }

        let mut lists = self.id_lists("user_threads", "user_id", ids).await?;
        rows.iter()
            .map(|row| -> Result<User> {
                let id: Uuid = row.try_get("id")?;
                Ok(User {
                    id,
                    name: row.try_get("name")?,
                    image: row.try_get("image")?,
                    threads: lists.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn push_thread(&self, user_id: Uuid, thread_id: Uuid) -> Result<()> {
        self.push_id("user_threads", "user_id", "users", user_id, thread_id).await
    }

    async fn pull_threads(&self, user_ids: &[Uuid], thread_ids: &[Uuid]) -> Result<()> {
        self.pull_ids("user_threads", "user_id", user_ids, thread_ids).await
    }
}

#[async_trait]
impl CommunityRepo for SqliteStore {
    async fn upsert_community(&self, community: Community) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO communities (id, slug, name, image) VALUES (?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET slug = excluded.slug, name = excluded.name, image = excluded.image",
        )
        .bind(community.id)
        .bind(&community.slug)
        .bind(&community.name)
        .bind(&community.image)
        .execute(&mut *tx)
        .await?;
        Self::replace_id_list(&mut tx, "community_threads", "community_id", community.id, &community.threads).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_community_by_slug(&self, slug: &str) -> Result<Option<Community>> {
        let id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM communities WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        match id {
            Some(id) => Ok(self.get_communities(&[id]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn get_communities(&self, ids: &[Uuid]) -> Result<Vec<Community>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut rows = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_BIND_IDS) {
            let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, slug, name, image FROM communities WHERE id IN ");
            push_id_list(&mut qb, chunk);
            rows.extend(qb.build().fetch_all(&self.pool).await?);
        }

        let mut lists = self.id_lists("community_threads", "community_id", ids).await?;
        rows.iter()
            .map(|row| -> Result<Community> {
                let id: Uuid = row.try_get("id")?;
                Ok(Community {
                    id,
                    slug: row.try_get("slug")?,
                    name: row.try_get("name")?,
                    image: row.try_get("image")?,
                    threads: lists.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn push_thread(&self, community_id: Uuid, thread_id: Uuid) -> Result<()> {
        self.push_id("community_threads", "community_id", "communities", community_id, thread_id)
            .await
    }

    async fn pull_threads(&self, community_ids: &[Uuid], thread_ids: &[Uuid]) -> Result<()> {
        self.pull_ids("community_threads", "community_id", community_ids, thread_ids)
            .await
    }
}
