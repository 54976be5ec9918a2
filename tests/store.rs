use std::sync::Arc;

use tempfile::TempDir;

use luminote_store::config::{Config, DbConfig, RetentionConfig, SettingsConfig};
use luminote_store::models::{
    NewArtifact, NewHistoryEntry, NewNote, NewTranslation, NoteKind,
};
use luminote_store::{
    retention, ArtifactRecord, HistoryEntry, NoteRecord, Partition, StoreError, StoreEvent,
    StoreManager, TranslationRecord,
};

fn test_config(tmp: &TempDir) -> Config {
    Config {
        db: DbConfig {
            path: tmp.path().join("data/luminote.sqlite"),
            max_size_bytes: None,
        },
        settings: SettingsConfig {
            path: tmp.path().join("data/settings.json"),
        },
        retention: RetentionConfig::default(),
    }
}

fn sample_translation(document_url: &str, block_id: &str) -> TranslationRecord {
    TranslationRecord::new(NewTranslation {
        document_url: document_url.to_string(),
        block_id: block_id.to_string(),
        source_text: "Bonjour le monde".to_string(),
        translated_text: "Hello world".to_string(),
        source_language: "fr".to_string(),
        target_language: "en".to_string(),
        provider: "openai".to_string(),
        model: "gpt-4o-mini".to_string(),
    })
}

fn sample_history(document_url: &str) -> HistoryEntry {
    HistoryEntry::new(NewHistoryEntry {
        document_url: document_url.to_string(),
        title: "An Article".to_string(),
        source_language: "fr".to_string(),
        target_language: "en".to_string(),
        content_preview: "Bonjour le monde, ceci est un article.".to_string(),
        metadata: serde_json::json!({ "word_count": 420 }),
    })
}

fn sample_note(document_url: &str) -> NoteRecord {
    NoteRecord::new(NewNote {
        document_url: document_url.to_string(),
        block_id: "b1".to_string(),
        note_type: NoteKind::Definition,
        content: "monde = world".to_string(),
        tags: vec!["vocab".to_string()],
    })
}

#[tokio::test]
async fn test_translation_round_trip() {
    let tmp = TempDir::new().unwrap();
    let store = StoreManager::new(&test_config(&tmp));

    let record = sample_translation("https://example.com/a", "b1");
    store.add_translation(&record).await.unwrap();

    let found = store
        .translations_for_document("https://example.com/a")
        .await
        .unwrap();
    assert_eq!(found, vec![record]);

    let other = store
        .translations_for_document("https://example.com/other")
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn test_duplicate_add_fails_with_duplicate_key() {
    let tmp = TempDir::new().unwrap();
    let store = StoreManager::new(&test_config(&tmp));

    let record = sample_translation("https://example.com/a", "b1");
    store.add_translation(&record).await.unwrap();

    let err = store.add_translation(&record).await.unwrap_err();
    match err {
        StoreError::DuplicateKey { partition, id } => {
            assert_eq!(partition, "translations");
            assert_eq!(id, record.translation_id);
        }
        other => panic!("expected DuplicateKey, got {other:?}"),
    }

    // the original record is untouched
    let found = store
        .translations_for_document("https://example.com/a")
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn test_delete_by_id_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let store = StoreManager::new(&test_config(&tmp));

    let note = sample_note("https://example.com/a");
    store.add_note(&note).await.unwrap();

    assert!(store
        .delete_by_id(Partition::Notes, &note.note_id)
        .await
        .unwrap());
    assert!(!store
        .delete_by_id(Partition::Notes, &note.note_id)
        .await
        .unwrap());
    assert!(!store
        .delete_by_id(Partition::Notes, "never-existed")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_sweep_removes_exactly_expired_records() {
    let tmp = TempDir::new().unwrap();
    let store = StoreManager::new(&test_config(&tmp));

    let cutoff = 1_000_000;
    let stamps = [cutoff - 500, cutoff - 1, cutoff, cutoff + 1, cutoff + 500];
    for (i, stamp) in stamps.iter().enumerate() {
        let mut entry = sample_history(&format!("https://example.com/{i}"));
        entry.visited_at = *stamp;
        store.add_history_entry(&entry).await.unwrap();
    }

    let removed = store
        .sweep_older_than(Partition::History, cutoff)
        .await
        .unwrap();
    assert_eq!(removed, 3);

    let remaining = store.recent_history(10).await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|e| e.visited_at > cutoff));

    // a second sweep at the same cutoff finds nothing
    let removed = store
        .sweep_older_than(Partition::History, cutoff)
        .await
        .unwrap();
    assert_eq!(removed, 0);
}

#[tokio::test]
async fn test_retention_sweep_history_by_horizon() {
    let tmp = TempDir::new().unwrap();
    let store = StoreManager::new(&test_config(&tmp));

    let day_ms: i64 = 86_400_000;
    let now = chrono::Utc::now().timestamp_millis();

    let mut old = sample_history("https://example.com/old");
    old.visited_at = now - 40 * day_ms;
    store.add_history_entry(&old).await.unwrap();

    let fresh = sample_history("https://example.com/fresh");
    store.add_history_entry(&fresh).await.unwrap();

    let removed = retention::sweep_history(&store, 30).await.unwrap();
    assert_eq!(removed, 1);

    let remaining = store.recent_history(10).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].document_url, "https://example.com/fresh");
}

#[tokio::test]
async fn test_recent_history_newest_first_with_limit() {
    let tmp = TempDir::new().unwrap();
    let store = StoreManager::new(&test_config(&tmp));

    for i in 0..5 {
        let entry = sample_history(&format!("https://example.com/{i}"));
        store.add_history_entry(&entry).await.unwrap();
    }

    let recent = store.recent_history(3).await.unwrap();
    assert_eq!(recent.len(), 3);
    assert!(recent.windows(2).all(|w| w[0].visited_at > w[1].visited_at));
    assert_eq!(recent[0].document_url, "https://example.com/4");
}

#[tokio::test]
async fn test_clear_history() {
    let tmp = TempDir::new().unwrap();
    let store = StoreManager::new(&test_config(&tmp));

    for i in 0..3 {
        store
            .add_history_entry(&sample_history(&format!("https://example.com/{i}")))
            .await
            .unwrap();
    }
    assert_eq!(store.clear_history().await.unwrap(), 3);
    assert_eq!(store.count(Partition::History).await.unwrap(), 0);
    assert_eq!(store.clear_history().await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_note_in_place() {
    let tmp = TempDir::new().unwrap();
    let store = StoreManager::new(&test_config(&tmp));

    let note = sample_note("https://example.com/a");
    store.add_note(&note).await.unwrap();

    let updated = store
        .update_note(
            &note.note_id,
            Some("monde = world (fr)"),
            Some(&["vocab".to_string(), "reviewed".to_string()]),
        )
        .await
        .unwrap()
        .expect("note should exist");

    assert_eq!(updated.note_id, note.note_id);
    assert_eq!(updated.content, "monde = world (fr)");
    assert_eq!(updated.tags, vec!["vocab", "reviewed"]);
    assert_eq!(updated.created_at, note.created_at);
    assert!(updated.updated_at >= updated.created_at);

    // unknown ids are reported, not fabricated
    let missing = store.update_note("no-such-note", Some("x"), None).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_note_with_unknown_type_is_skipped_on_read() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = StoreManager::new(&config);

    let note = sample_note("https://example.com/a");
    store.add_note(&note).await.unwrap();

    // a row from a future schema, written behind the manager's back
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite:{}", config.db.path.display()))
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO notes (note_id, document_url, block_id, note_type, content, created_at, updated_at, tags) \
         VALUES ('n-future', 'https://example.com/a', 'b2', 'mindmap', 'x', 1, 1, '[]')",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let notes = store
        .notes_for_document("https://example.com/a")
        .await
        .unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].note_id, note.note_id);
}

#[tokio::test]
async fn test_artifact_round_trip_and_job_index() {
    let tmp = TempDir::new().unwrap();
    let store = StoreManager::new(&test_config(&tmp));

    let artifact = ArtifactRecord::new(NewArtifact {
        document_url: "https://example.com/a".to_string(),
        job_id: "job-42".to_string(),
        artifact_type: "link-summary".to_string(),
        content: serde_json::json!({ "summary": "short", "links": ["https://example.com/b"] }),
        provider: "anthropic".to_string(),
        model: "claude-sonnet".to_string(),
        prompt_version: "v3".to_string(),
    });
    store.add_artifact(&artifact).await.unwrap();

    let by_doc = store
        .artifacts_for_document("https://example.com/a")
        .await
        .unwrap();
    assert_eq!(by_doc, vec![artifact.clone()]);

    let by_job = store.artifacts_for_job("job-42").await.unwrap();
    assert_eq!(by_job, vec![artifact]);
    assert!(store.artifacts_for_job("job-404").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_quota_exceeded_is_distinguished() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(&tmp);
    config.db.max_size_bytes = Some(256 * 1024);
    let store = StoreManager::new(&config);

    let payload = "x".repeat(8 * 1024);
    let mut hit_quota = false;
    let mut written = 0usize;
    for i in 0..500 {
        let mut record = sample_translation("https://example.com/big", &format!("b{i}"));
        record.source_text = payload.clone();
        record.translated_text = payload.clone();
        match store.add_translation(&record).await {
            Ok(()) => written += 1,
            Err(StoreError::QuotaExceeded { partition }) => {
                assert_eq!(partition, "translations");
                hit_quota = true;
                break;
            }
            Err(other) => panic!("expected QuotaExceeded, got {other:?}"),
        }
    }
    assert!(hit_quota, "budget of 256 KiB never filled up");
    assert!(written > 0);

    // the partition stays readable and holds only complete records
    let found = store
        .translations_for_document("https://example.com/big")
        .await
        .unwrap();
    assert_eq!(found.len(), written);
}

#[tokio::test]
async fn test_concurrent_first_calls_share_one_initialization() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = Arc::new(StoreManager::new(&config));

    let a = {
        let store = store.clone();
        tokio::spawn(async move { store.count(Partition::History).await })
    };
    let b = {
        let store = store.clone();
        tokio::spawn(async move { store.count(Partition::Translations).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    // exactly one migration run is journaled
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite:{}", config.db.path.display()))
        .await
        .unwrap();
    let runs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(&pool)
        .await
        .unwrap();
    pool.close().await;
    assert_eq!(runs, 1);
}

#[tokio::test]
async fn test_operations_reinitialize_after_close() {
    let tmp = TempDir::new().unwrap();
    let store = StoreManager::new(&test_config(&tmp));

    let record = sample_translation("https://example.com/a", "b1");
    store.add_translation(&record).await.unwrap();

    store.close().await;

    let found = store
        .translations_for_document("https://example.com/a")
        .await
        .unwrap();
    assert_eq!(found, vec![record]);
}

#[tokio::test]
async fn test_events_published_after_commit() {
    let tmp = TempDir::new().unwrap();
    let store = StoreManager::new(&test_config(&tmp));
    let mut rx = store.subscribe();

    let record = sample_translation("https://example.com/a", "b1");
    store.add_translation(&record).await.unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(
        event,
        StoreEvent::Added {
            partition: Partition::Translations,
            id: record.translation_id.clone(),
        }
    );

    store
        .delete_by_id(Partition::Translations, &record.translation_id)
        .await
        .unwrap();
    let event = rx.recv().await.unwrap();
    assert_eq!(
        event,
        StoreEvent::Deleted {
            partition: Partition::Translations,
            id: record.translation_id,
        }
    );
}

#[tokio::test]
async fn test_counts_per_partition() {
    let tmp = TempDir::new().unwrap();
    let store = StoreManager::new(&test_config(&tmp));

    store
        .add_translation(&sample_translation("https://example.com/a", "b1"))
        .await
        .unwrap();
    store
        .add_history_entry(&sample_history("https://example.com/a"))
        .await
        .unwrap();

    assert_eq!(store.count(Partition::Translations).await.unwrap(), 1);
    assert_eq!(store.count(Partition::History).await.unwrap(), 1);
    assert_eq!(store.count(Partition::Notes).await.unwrap(), 0);
    assert_eq!(store.count(Partition::Artifacts).await.unwrap(), 0);
}
