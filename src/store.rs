//! Single point of access to the versioned, multi-partition store.
//!
//! The manager hides the pool and migration protocol behind per-entity
//! operations. The pool is opened lazily under an async mutex, so
//! concurrent first callers share one in-flight open instead of racing
//! to create the database twice, and any operation issued after
//! [`StoreManager::close`] transparently re-initializes.
//!
//! All mutations are a single statement or a single transaction; a
//! failure never leaves a partial write visible. Committed mutations are
//! broadcast as [`StoreEvent`]s so the UI can react without polling.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    now_ms, ArtifactRecord, HistoryEntry, NoteRecord, Partition, TranslationRecord,
};
use crate::{db, migrate};

/// Rows visited per DELETE batch during a sweep, bounding memory on
/// large partitions.
const SWEEP_BATCH: u32 = 500;

/// Change notification published after a mutation commits.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Added { partition: Partition, id: String },
    Updated { partition: Partition, id: String },
    Deleted { partition: Partition, id: String },
    Swept { partition: Partition, count: u64 },
}

pub struct StoreManager {
    db_path: PathBuf,
    max_size_bytes: Option<u64>,
    pool: Mutex<Option<SqlitePool>>,
    events: broadcast::Sender<StoreEvent>,
}

impl StoreManager {
    /// Construct without touching the filesystem; the database is
    /// opened on first use.
    pub fn new(config: &Config) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            db_path: config.db.path.clone(),
            max_size_bytes: config.db.max_size_bytes,
            pool: Mutex::new(None),
            events,
        }
    }

    /// Open the database (creating it if absent) and run migrations.
    /// Idempotent; concurrent callers share the one in-flight open.
    pub async fn initialize(&self) -> StoreResult<()> {
        self.pool().await.map(|_| ())
    }

    /// Close the pool. Subsequent operations re-initialize.
    pub async fn close(&self) {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.take() {
            pool.close().await;
        }
    }

    /// Subscribe to the change feed. A lagging or dropped receiver
    /// never blocks or fails a write.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    async fn pool(&self) -> StoreResult<SqlitePool> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            if !pool.is_closed() {
                return Ok(pool.clone());
            }
        }
        let pool = db::connect(&self.db_path, self.max_size_bytes)
            .await
            .map_err(|e| StoreError::storage("database", "open", e))?;
        migrate::run_migrations(&pool)
            .await
            .map_err(|e| StoreError::storage("database", "migrate", e))?;
        *guard = Some(pool.clone());
        Ok(pool)
    }

    fn publish(&self, event: StoreEvent) {
        // No subscribers is fine; the feed is best-effort by design.
        let _ = self.events.send(event);
    }

    // --- translations ---

    pub async fn add_translation(&self, record: &TranslationRecord) -> StoreResult<()> {
        let partition = Partition::Translations;
        let pool = self.pool().await?;
        sqlx::query(
            "INSERT INTO translations (translation_id, document_url, block_id, source_text, \
             translated_text, source_language, target_language, provider, model, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.translation_id)
        .bind(&record.document_url)
        .bind(&record.block_id)
        .bind(&record.source_text)
        .bind(&record.translated_text)
        .bind(&record.source_language)
        .bind(&record.target_language)
        .bind(&record.provider)
        .bind(&record.model)
        .bind(record.created_at)
        .execute(&pool)
        .await
        .map_err(|e| StoreError::from_write(partition.table(), "add", &record.translation_id, e))?;

        debug!(partition = %partition, id = %record.translation_id, "record added");
        self.publish(StoreEvent::Added {
            partition,
            id: record.translation_id.clone(),
        });
        Ok(())
    }

    pub async fn translations_for_document(
        &self,
        document_url: &str,
    ) -> StoreResult<Vec<TranslationRecord>> {
        let pool = self.pool().await?;
        let rows = sqlx::query("SELECT * FROM translations WHERE document_url = ?")
            .bind(document_url)
            .fetch_all(&pool)
            .await
            .map_err(|e| StoreError::storage("translations", "get_by_index", e))?;
        Ok(rows.iter().map(translation_from_row).collect())
    }

    // --- history ---

    pub async fn add_history_entry(&self, entry: &HistoryEntry) -> StoreResult<()> {
        let partition = Partition::History;
        let pool = self.pool().await?;
        sqlx::query(
            "INSERT INTO history (history_id, document_url, title, visited_at, language_pair, \
             content_preview, metadata) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.history_id)
        .bind(&entry.document_url)
        .bind(&entry.title)
        .bind(entry.visited_at)
        .bind(&entry.language_pair)
        .bind(&entry.content_preview)
        .bind(entry.metadata.to_string())
        .execute(&pool)
        .await
        .map_err(|e| StoreError::from_write(partition.table(), "add", &entry.history_id, e))?;

        debug!(partition = %partition, id = %entry.history_id, "record added");
        self.publish(StoreEvent::Added {
            partition,
            id: entry.history_id.clone(),
        });
        Ok(())
    }

    pub async fn history_for_document(&self, document_url: &str) -> StoreResult<Vec<HistoryEntry>> {
        let pool = self.pool().await?;
        let rows = sqlx::query("SELECT * FROM history WHERE document_url = ?")
            .bind(document_url)
            .fetch_all(&pool)
            .await
            .map_err(|e| StoreError::storage("history", "get_by_index", e))?;
        Ok(rows.iter().map(history_from_row).collect())
    }

    /// Newest-first listing for the history panel.
    pub async fn recent_history(&self, limit: u32) -> StoreResult<Vec<HistoryEntry>> {
        let pool = self.pool().await?;
        let rows = sqlx::query("SELECT * FROM history ORDER BY visited_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&pool)
            .await
            .map_err(|e| StoreError::storage("history", "recent", e))?;
        Ok(rows.iter().map(history_from_row).collect())
    }

    /// Wholesale purge of the history partition. Returns the number of
    /// entries removed.
    pub async fn clear_history(&self) -> StoreResult<u64> {
        let partition = Partition::History;
        let pool = self.pool().await?;
        let result = sqlx::query("DELETE FROM history")
            .execute(&pool)
            .await
            .map_err(|e| StoreError::storage(partition.table(), "clear", e))?;
        let count = result.rows_affected();
        if count > 0 {
            self.publish(StoreEvent::Swept { partition, count });
        }
        Ok(count)
    }

    // --- notes ---

    pub async fn add_note(&self, note: &NoteRecord) -> StoreResult<()> {
        let partition = Partition::Notes;
        let pool = self.pool().await?;
        let tags = serde_json::to_string(&note.tags).unwrap_or_else(|_| "[]".to_string());
        sqlx::query(
            "INSERT INTO notes (note_id, document_url, block_id, note_type, content, \
             created_at, updated_at, tags) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&note.note_id)
        .bind(&note.document_url)
        .bind(&note.block_id)
        .bind(note.note_type.as_str())
        .bind(&note.content)
        .bind(note.created_at)
        .bind(note.updated_at)
        .bind(tags)
        .execute(&pool)
        .await
        .map_err(|e| StoreError::from_write(partition.table(), "add", &note.note_id, e))?;

        debug!(partition = %partition, id = %note.note_id, "record added");
        self.publish(StoreEvent::Added {
            partition,
            id: note.note_id.clone(),
        });
        Ok(())
    }

    /// Rows whose stored `note_type` falls outside the closed set (a
    /// future schema, a hand-edited database) are skipped and logged
    /// rather than failing the whole read.
    pub async fn notes_for_document(&self, document_url: &str) -> StoreResult<Vec<NoteRecord>> {
        let pool = self.pool().await?;
        let rows = sqlx::query("SELECT * FROM notes WHERE document_url = ?")
            .bind(document_url)
            .fetch_all(&pool)
            .await
            .map_err(|e| StoreError::storage("notes", "get_by_index", e))?;
        Ok(rows.iter().filter_map(note_from_row).collect())
    }

    /// Edit a note in place, replacing content and/or tags and stamping
    /// `updated_at`. Returns the updated record, or `None` for an
    /// unknown id.
    pub async fn update_note(
        &self,
        note_id: &str,
        content: Option<&str>,
        tags: Option<&[String]>,
    ) -> StoreResult<Option<NoteRecord>> {
        let partition = Partition::Notes;
        let pool = self.pool().await?;

        let row = sqlx::query("SELECT * FROM notes WHERE note_id = ?")
            .bind(note_id)
            .fetch_optional(&pool)
            .await
            .map_err(|e| StoreError::storage(partition.table(), "update", e))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let created_at: i64 = row.get("created_at");

        let content = match content {
            Some(c) => c.to_string(),
            None => row.get("content"),
        };
        let tags_json = match tags {
            Some(t) => serde_json::to_string(t).unwrap_or_else(|_| "[]".to_string()),
            None => row.get("tags"),
        };
        // updated_at must never precede created_at, even if the clock
        // regressed between process runs.
        let updated_at = now_ms().max(created_at);

        sqlx::query("UPDATE notes SET content = ?, tags = ?, updated_at = ? WHERE note_id = ?")
            .bind(&content)
            .bind(&tags_json)
            .bind(updated_at)
            .bind(note_id)
            .execute(&pool)
            .await
            .map_err(|e| StoreError::storage(partition.table(), "update", e))?;

        self.publish(StoreEvent::Updated {
            partition,
            id: note_id.to_string(),
        });

        let updated = sqlx::query("SELECT * FROM notes WHERE note_id = ?")
            .bind(note_id)
            .fetch_one(&pool)
            .await
            .map_err(|e| StoreError::storage(partition.table(), "update", e))?;
        Ok(note_from_row(&updated))
    }

    // --- artifacts ---

    pub async fn add_artifact(&self, artifact: &ArtifactRecord) -> StoreResult<()> {
        let partition = Partition::Artifacts;
        let pool = self.pool().await?;
        sqlx::query(
            "INSERT INTO artifacts (artifact_id, document_url, job_id, artifact_type, content, \
             provider, model, prompt_version, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&artifact.artifact_id)
        .bind(&artifact.document_url)
        .bind(&artifact.job_id)
        .bind(&artifact.artifact_type)
        .bind(artifact.content.to_string())
        .bind(&artifact.provider)
        .bind(&artifact.model)
        .bind(&artifact.prompt_version)
        .bind(artifact.created_at)
        .execute(&pool)
        .await
        .map_err(|e| StoreError::from_write(partition.table(), "add", &artifact.artifact_id, e))?;

        debug!(partition = %partition, id = %artifact.artifact_id, "record added");
        self.publish(StoreEvent::Added {
            partition,
            id: artifact.artifact_id.clone(),
        });
        Ok(())
    }

    pub async fn artifacts_for_document(
        &self,
        document_url: &str,
    ) -> StoreResult<Vec<ArtifactRecord>> {
        self.artifacts_by("document_url", document_url).await
    }

    pub async fn artifacts_for_job(&self, job_id: &str) -> StoreResult<Vec<ArtifactRecord>> {
        self.artifacts_by("job_id", job_id).await
    }

    async fn artifacts_by(
        &self,
        column: &'static str,
        value: &str,
    ) -> StoreResult<Vec<ArtifactRecord>> {
        let pool = self.pool().await?;
        let rows = sqlx::query(&format!("SELECT * FROM artifacts WHERE {column} = ?"))
            .bind(value)
            .fetch_all(&pool)
            .await
            .map_err(|e| StoreError::storage("artifacts", "get_by_index", e))?;
        Ok(rows.iter().map(artifact_from_row).collect())
    }

    // --- generic partition operations ---

    /// Delete one record by primary key. Idempotent: returns `false`
    /// when the id was already absent.
    pub async fn delete_by_id(&self, partition: Partition, id: &str) -> StoreResult<bool> {
        let pool = self.pool().await?;
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE {} = ?",
            partition.table(),
            partition.primary_key()
        ))
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| StoreError::storage(partition.table(), "delete", e))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.publish(StoreEvent::Deleted {
                partition,
                id: id.to_string(),
            });
        }
        Ok(deleted)
    }

    /// Delete every record whose time index is at or before `cutoff_ms`,
    /// inside one transaction. Rows are visited in bounded batches so a
    /// large partition is never loaded into memory. Returns the count.
    pub async fn sweep_older_than(&self, partition: Partition, cutoff_ms: i64) -> StoreResult<u64> {
        let pool = self.pool().await?;
        let table = partition.table();
        let column = partition.time_index();
        let statement = format!(
            "DELETE FROM {table} WHERE rowid IN \
             (SELECT rowid FROM {table} WHERE {column} <= ? LIMIT {SWEEP_BATCH})"
        );

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| StoreError::storage(table, "sweep", e))?;
        let mut total: u64 = 0;
        loop {
            let result = sqlx::query(&statement)
                .bind(cutoff_ms)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::storage(table, "sweep", e))?;
            let batch = result.rows_affected();
            total += batch;
            if batch < SWEEP_BATCH as u64 {
                break;
            }
        }
        tx.commit()
            .await
            .map_err(|e| StoreError::storage(table, "sweep", e))?;

        if total > 0 {
            warn!(partition = %partition, count = total, cutoff_ms, "swept expired records");
            self.publish(StoreEvent::Swept {
                partition,
                count: total,
            });
        }
        Ok(total)
    }

    pub async fn count(&self, partition: Partition) -> StoreResult<u64> {
        let pool = self.pool().await?;
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", partition.table()))
            .fetch_one(&pool)
            .await
            .map_err(|e| StoreError::storage(partition.table(), "count", e))?;
        Ok(count as u64)
    }
}

fn translation_from_row(row: &SqliteRow) -> TranslationRecord {
    TranslationRecord {
        translation_id: row.get("translation_id"),
        document_url: row.get("document_url"),
        block_id: row.get("block_id"),
        source_text: row.get("source_text"),
        translated_text: row.get("translated_text"),
        source_language: row.get("source_language"),
        target_language: row.get("target_language"),
        provider: row.get("provider"),
        model: row.get("model"),
        created_at: row.get("created_at"),
    }
}

fn history_from_row(row: &SqliteRow) -> HistoryEntry {
    let metadata: String = row.get("metadata");
    HistoryEntry {
        history_id: row.get("history_id"),
        document_url: row.get("document_url"),
        title: row.get("title"),
        visited_at: row.get("visited_at"),
        language_pair: row.get("language_pair"),
        content_preview: row.get("content_preview"),
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::json!({})),
    }
}

fn note_from_row(row: &SqliteRow) -> Option<NoteRecord> {
    let note_id: String = row.get("note_id");
    let raw_type: String = row.get("note_type");
    let note_type = match raw_type.parse() {
        Ok(kind) => kind,
        Err(()) => {
            warn!(note_id = %note_id, note_type = %raw_type, "skipping note with unknown type");
            return None;
        }
    };
    let tags: String = row.get("tags");
    Some(NoteRecord {
        note_id,
        document_url: row.get("document_url"),
        block_id: row.get("block_id"),
        note_type,
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        tags: serde_json::from_str(&tags).unwrap_or_default(),
    })
}

fn artifact_from_row(row: &SqliteRow) -> ArtifactRecord {
    let content: String = row.get("content");
    ArtifactRecord {
        artifact_id: row.get("artifact_id"),
        document_url: row.get("document_url"),
        job_id: row.get("job_id"),
        artifact_type: row.get("artifact_type"),
        content: serde_json::from_str(&content).unwrap_or(serde_json::json!({})),
        provider: row.get("provider"),
        model: row.get("model"),
        prompt_version: row.get("prompt_version"),
        created_at: row.get("created_at"),
    }
}
