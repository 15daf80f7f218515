//! Draft persistence.
//!
//! The autosave controller only ever talks to the [`DraftStore`] trait; the
//! host picks the backend. Two implementations ship here:
//! - [`MemoryDraftStore`] for tests and embedding hosts
//! - [`SqliteDraftStore`] storing drafts as JSON rows

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::RwLock;

use crate::domain::{Draft, DraftId};

/// Storage seam for draft persistence.
///
/// Implementations must tolerate being called with the same draft id
/// repeatedly; `save_draft` is an upsert.
#[async_trait::async_trait]
pub trait DraftStore: Send + Sync {
    /// Persists the draft, replacing any previous version with the same id.
    async fn save_draft(&self, draft: &Draft) -> Result<()>;

    /// Loads a draft by id, or None if it was never saved or was deleted.
    async fn load_draft(&self, id: &DraftId) -> Result<Option<Draft>>;

    /// Deletes a draft by id; deleting a missing draft is not an error.
    async fn delete_draft(&self, id: &DraftId) -> Result<()>;

    /// Lists all stored drafts, most recently saved first.
    async fn list_drafts(&self) -> Result<Vec<Draft>>;
}

/// In-memory draft store.
#[derive(Default)]
pub struct MemoryDraftStore {
    drafts: RwLock<HashMap<DraftId, Draft>>,
}

impl MemoryDraftStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored drafts.
    pub async fn len(&self) -> usize {
        self.drafts.read().await.len()
    }

    /// Whether the store holds no drafts.
    pub async fn is_empty(&self) -> bool {
        self.drafts.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl DraftStore for MemoryDraftStore {
    async fn save_draft(&self, draft: &Draft) -> Result<()> {
        let mut drafts = self.drafts.write().await;
        drafts.insert(draft.id.clone(), draft.clone());
        Ok(())
    }

    async fn load_draft(&self, id: &DraftId) -> Result<Option<Draft>> {
        let drafts = self.drafts.read().await;
        Ok(drafts.get(id).cloned())
    }

    async fn delete_draft(&self, id: &DraftId) -> Result<()> {
        let mut drafts = self.drafts.write().await;
        drafts.remove(id);
        Ok(())
    }

    async fn list_drafts(&self) -> Result<Vec<Draft>> {
        let drafts = self.drafts.read().await;
        let mut all: Vec<Draft> = drafts.values().cloned().collect();
        all.sort_by(|a, b| b.last_saved_at.cmp(&a.last_saved_at));
        Ok(all)
    }
}

/// SQLite-backed draft store.
///
/// Drafts are serialized to JSON and upserted into a single table keyed by
/// draft id. The connection is blocking, so every call hops onto the
/// blocking thread pool.
pub struct SqliteDraftStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDraftStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("opening draft db at {}", path.as_ref().display()))?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS drafts (
                id            TEXT PRIMARY KEY,
                payload       TEXT NOT NULL,
                last_saved_at TEXT
            );",
        )
        .context("creating drafts table")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait::async_trait]
impl DraftStore for SqliteDraftStore {
    async fn save_draft(&self, draft: &Draft) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let draft = draft.clone();
        tokio::task::spawn_blocking(move || {
            let payload = serde_json::to_string(&draft).context("serializing draft")?;
            let last_saved = draft.last_saved_at.map(|t| t.to_rfc3339());
            let conn = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("draft db connection poisoned"))?;
            conn.execute(
                "INSERT INTO drafts (id, payload, last_saved_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET payload = ?2, last_saved_at = ?3",
                params![draft.id.as_str(), payload, last_saved],
            )
            .context("upserting draft")?;
            Ok(())
        })
        .await?
    }

    async fn load_draft(&self, id: &DraftId) -> Result<Option<Draft>> {
        let conn = Arc::clone(&self.conn);
        let id = id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("draft db connection poisoned"))?;
            let payload: Option<String> = conn
                .query_row(
                    "SELECT payload FROM drafts WHERE id = ?1",
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .context("loading draft")?;
            match payload {
                Some(json) => Ok(Some(
                    serde_json::from_str(&json).context("deserializing draft")?,
                )),
                None => Ok(None),
            }
        })
        .await?
    }

    async fn delete_draft(&self, id: &DraftId) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let id = id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("draft db connection poisoned"))?;
            conn.execute("DELETE FROM drafts WHERE id = ?1", params![id.as_str()])
                .context("deleting draft")?;
            Ok(())
        })
        .await?
    }

    async fn list_drafts(&self) -> Result<Vec<Draft>> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("draft db connection poisoned"))?;
            let mut stmt = conn
                .prepare("SELECT payload FROM drafts ORDER BY last_saved_at DESC")
                .context("preparing draft listing")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .context("listing drafts")?;

            let mut drafts = Vec::new();
            for row in rows {
                let json = row.context("reading draft row")?;
                drafts.push(serde_json::from_str(&json).context("deserializing draft")?);
            }
            Ok(drafts)
        })
        .await?
    }
}
