//! Bidirectional block identity lookup for the active document.
//!
//! The dual-pane UI asks for the translation block behind a hovered
//! source block (and the reverse) on every hover, click, and keyboard
//! move, so both directions are O(1) hash lookups. A missing
//! counterpart is an expected steady state while a document streams in
//! progressively; lookups return `None` rather than failing.
//!
//! When several translations exist for one block (re-translation
//! history), only the most recently created record is the active
//! mapping.

use std::collections::HashMap;

use crate::models::TranslationRecord;

#[derive(Debug, Clone)]
struct ActiveMapping {
    translation_id: String,
    created_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct BlockMap {
    forward: HashMap<String, ActiveMapping>,
    reverse: HashMap<String, String>,
}

impl BlockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map wholesale from the translation records of one
    /// document. Replaces any previous contents.
    pub fn rebuild(records: &[TranslationRecord]) -> Self {
        let mut map = Self::new();
        for record in records {
            map.insert(record);
        }
        map
    }

    /// Observe one record as it streams in. Returns whether it became
    /// the active mapping for its block; a record older than the
    /// current mapping never wins, while an equal timestamp favors the
    /// later-observed record.
    pub fn insert(&mut self, record: &TranslationRecord) -> bool {
        if let Some(existing) = self.forward.get(&record.block_id) {
            if record.created_at < existing.created_at {
                return false;
            }
            self.reverse.remove(&existing.translation_id);
        }
        self.reverse
            .insert(record.translation_id.clone(), record.block_id.clone());
        self.forward.insert(
            record.block_id.clone(),
            ActiveMapping {
                translation_id: record.translation_id.clone(),
                created_at: record.created_at,
            },
        );
        true
    }

    pub fn source_to_translation(&self, block_id: &str) -> Option<&str> {
        self.forward
            .get(block_id)
            .map(|m| m.translation_id.as_str())
    }

    pub fn translation_to_source(&self, translation_id: &str) -> Option<&str> {
        self.reverse.get(translation_id).map(|s| s.as_str())
    }

    /// Number of blocks with an active mapping.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
