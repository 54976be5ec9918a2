//! Versioned, additive schema migrations.
//!
//! Migrations form an ordered ladder keyed by version. Opening a
//! database runs every step whose version exceeds the highest version
//! recorded in the `schema_migrations` journal. Every statement is
//! idempotent and additive; version 1 defines the four partitions and
//! their secondary indexes.

use sqlx::SqlitePool;
use tracing::info;

use crate::models::now_ms;

struct Migration {
    version: i64,
    name: &'static str,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "create_partitions",
    statements: &[
        r#"
        CREATE TABLE IF NOT EXISTS translations (
            translation_id TEXT PRIMARY KEY,
            document_url TEXT NOT NULL,
            block_id TEXT NOT NULL,
            source_text TEXT NOT NULL,
            translated_text TEXT NOT NULL,
            source_language TEXT NOT NULL,
            target_language TEXT NOT NULL,
            provider TEXT NOT NULL,
            model TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_translations_document_url ON translations(document_url)",
        "CREATE INDEX IF NOT EXISTS idx_translations_created_at ON translations(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_translations_block_id ON translations(block_id)",
        r#"
        CREATE TABLE IF NOT EXISTS history (
            history_id TEXT PRIMARY KEY,
            document_url TEXT NOT NULL,
            title TEXT NOT NULL,
            visited_at INTEGER NOT NULL,
            language_pair TEXT NOT NULL,
            content_preview TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}'
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_history_document_url ON history(document_url)",
        "CREATE INDEX IF NOT EXISTS idx_history_visited_at ON history(visited_at)",
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            note_id TEXT PRIMARY KEY,
            document_url TEXT NOT NULL,
            block_id TEXT NOT NULL,
            note_type TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]'
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_notes_document_url ON notes(document_url)",
        "CREATE INDEX IF NOT EXISTS idx_notes_created_at ON notes(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_notes_block_id ON notes(block_id)",
        r#"
        CREATE TABLE IF NOT EXISTS artifacts (
            artifact_id TEXT PRIMARY KEY,
            document_url TEXT NOT NULL,
            job_id TEXT NOT NULL,
            artifact_type TEXT NOT NULL,
            content TEXT NOT NULL,
            provider TEXT NOT NULL,
            model TEXT NOT NULL,
            prompt_version TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_artifacts_document_url ON artifacts(document_url)",
        "CREATE INDEX IF NOT EXISTS idx_artifacts_job_id ON artifacts(job_id)",
        "CREATE INDEX IF NOT EXISTS idx_artifacts_created_at ON artifacts(created_at)",
    ],
}];

/// Run every migration newer than the journal's high-water mark.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    let applied: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
        .fetch_one(pool)
        .await?;
    let applied = applied.unwrap_or(0);

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        let mut tx = pool.begin().await?;
        for statement in migration.statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .bind(now_ms())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(version = migration.version, name = migration.name, "applied migration");
    }

    Ok(())
}
