//! Core record types stored by the Luminote persistence layer.
//!
//! Each entity type lives in its own partition of the SQLite database.
//! Records are plain data: constructors stamp identifiers and timestamps,
//! the [`crate::store::StoreManager`] owns all I/O.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of a history entry's `content_preview`, in characters.
pub const CONTENT_PREVIEW_MAX_CHARS: usize = 200;

/// Named partitions of the durable store, one per entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Translations,
    History,
    Notes,
    Artifacts,
}

impl Partition {
    /// SQL table backing this partition.
    pub fn table(&self) -> &'static str {
        match self {
            Partition::Translations => "translations",
            Partition::History => "history",
            Partition::Notes => "notes",
            Partition::Artifacts => "artifacts",
        }
    }

    /// Primary key column of this partition.
    pub fn primary_key(&self) -> &'static str {
        match self {
            Partition::Translations => "translation_id",
            Partition::History => "history_id",
            Partition::Notes => "note_id",
            Partition::Artifacts => "artifact_id",
        }
    }

    /// Indexed timestamp column used by retention sweeps.
    pub fn time_index(&self) -> &'static str {
        match self {
            Partition::History => "visited_at",
            _ => "created_at",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Current wall-clock time in milliseconds, forced strictly increasing.
///
/// Sequentially created records must never share a timestamp: the block
/// mapper and re-translation policy both order records by `created_at`.
pub fn now_ms() -> i64 {
    static LAST: AtomicI64 = AtomicI64::new(0);
    let wall = Utc::now().timestamp_millis();
    LAST.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(wall.max(last + 1))
    })
    .map(|last| wall.max(last + 1))
    .unwrap_or(wall)
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Input fields for a translation, supplied by the backend integration
/// after a translation completes.
#[derive(Debug, Clone)]
pub struct NewTranslation {
    pub document_url: String,
    pub block_id: String,
    pub source_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub provider: String,
    pub model: String,
}

/// One translated block. Immutable once written: re-translation inserts
/// a new record rather than mutating an old one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRecord {
    pub translation_id: String,
    pub document_url: String,
    pub block_id: String,
    pub source_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub provider: String,
    pub model: String,
    pub created_at: i64,
}

impl TranslationRecord {
    pub fn new(input: NewTranslation) -> Self {
        Self {
            translation_id: new_id(),
            document_url: input.document_url,
            block_id: input.block_id,
            source_text: input.source_text,
            translated_text: input.translated_text,
            source_language: input.source_language,
            target_language: input.target_language,
            provider: input.provider,
            model: input.model,
            created_at: now_ms(),
        }
    }
}

/// Input fields for a history entry, supplied after a successful
/// extraction + translation cycle.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub document_url: String,
    pub title: String,
    pub source_language: String,
    pub target_language: String,
    pub content_preview: String,
    pub metadata: serde_json::Value,
}

/// One visit to a document. Swept by the retention engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub history_id: String,
    pub document_url: String,
    pub title: String,
    pub visited_at: i64,
    /// Derived composite, `"{source}|{target}"` (e.g. `"zh-CN|en"`).
    pub language_pair: String,
    /// Bounded excerpt, capped at [`CONTENT_PREVIEW_MAX_CHARS`].
    pub content_preview: String,
    pub metadata: serde_json::Value,
}

impl HistoryEntry {
    pub fn new(input: NewHistoryEntry) -> Self {
        Self {
            history_id: new_id(),
            document_url: input.document_url,
            title: input.title,
            visited_at: now_ms(),
            language_pair: format!("{}|{}", input.source_language, input.target_language),
            content_preview: truncate_chars(&input.content_preview, CONTENT_PREVIEW_MAX_CHARS),
            metadata: input.metadata,
        }
    }
}

/// Truncate on a character boundary so multi-byte text stays valid UTF-8.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Closed set of note types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    Explanation,
    Definition,
    Summary,
    Highlight,
}

impl NoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteKind::Explanation => "explanation",
            NoteKind::Definition => "definition",
            NoteKind::Summary => "summary",
            NoteKind::Highlight => "highlight",
        }
    }
}

impl FromStr for NoteKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explanation" => Ok(NoteKind::Explanation),
            "definition" => Ok(NoteKind::Definition),
            "summary" => Ok(NoteKind::Summary),
            "highlight" => Ok(NoteKind::Highlight),
            _ => Err(()),
        }
    }
}

impl fmt::Display for NoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input fields for a note, from a user command or an AI-command save.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub document_url: String,
    pub block_id: String,
    pub note_type: NoteKind,
    pub content: String,
    pub tags: Vec<String>,
}

/// A user- or AI-generated annotation. Unlike translations, notes are
/// edited in place; `updated_at` never precedes `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub note_id: String,
    pub document_url: String,
    pub block_id: String,
    pub note_type: NoteKind,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub tags: Vec<String>,
}

impl NoteRecord {
    pub fn new(input: NewNote) -> Self {
        let now = now_ms();
        Self {
            note_id: new_id(),
            document_url: input.document_url,
            block_id: input.block_id,
            note_type: input.note_type,
            content: input.content,
            created_at: now,
            updated_at: now,
            tags: input.tags,
        }
    }
}

/// Input fields for an artifact, supplied when an AI job's result is
/// explicitly saved.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub document_url: String,
    pub job_id: String,
    pub artifact_type: String,
    pub content: serde_json::Value,
    pub provider: String,
    pub model: String,
    pub prompt_version: String,
}

/// Saved output of an AI invocation, kept with enough provenance to be
/// replayed or audited. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub artifact_id: String,
    pub document_url: String,
    pub job_id: String,
    pub artifact_type: String,
    pub content: serde_json::Value,
    pub provider: String,
    pub model: String,
    pub prompt_version: String,
    pub created_at: i64,
}

impl ArtifactRecord {
    pub fn new(input: NewArtifact) -> Self {
        Self {
            artifact_id: new_id(),
            document_url: input.document_url,
            job_id: input.job_id,
            artifact_type: input.artifact_type,
            content: input.content,
            provider: input.provider,
            model: input.model,
            prompt_version: input.prompt_version,
            created_at: now_ms(),
        }
    }
}
