//! Reactive user settings with a never-persisted secret.
//!
//! The store splits its state in two: durable, non-secret fields
//! (provider, model, target language) snapshotted to a JSON file, and
//! the volatile API key, which lives only in memory. The in-memory
//! state is the authority for the session; the snapshot is advisory,
//! so a failed write is logged and never rolls anything back.
//!
//! A snapshot read from disk is untrusted input. Each field is
//! validated on its own and falls back to the compiled-in default
//! alone, preserving as much valid configuration as possible.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::warn;

use crate::error::{StoreError, StoreResult};

/// Closed set of AI providers. `mock` stays available for offline
/// development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Mock,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Mock => "mock",
        }
    }
}

impl FromStr for Provider {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "mock" => Ok(Provider::Mock),
            other => Err(StoreError::Validation {
                field: "provider",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full settings state. `api_key` is excluded from every durable
/// write; see [`DurableSettings`].
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub provider: Provider,
    pub model: String,
    /// ISO 639-1 code: exactly two ASCII lowercase letters.
    pub target_language: String,
    pub api_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: "gpt-4o-mini".to_string(),
            target_language: "en".to_string(),
            api_key: String::new(),
        }
    }
}

/// The non-secret subset written to the snapshot file. Structurally
/// incapable of carrying the API key.
#[derive(Debug, Serialize)]
struct DurableSettings<'a> {
    provider: &'a str,
    model: &'a str,
    target_language: &'a str,
}

/// Snapshot as read back from disk: every field optional, every field
/// validated independently.
#[derive(Debug, Default, Deserialize)]
struct SnapshotFields {
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    target_language: Option<String>,
}

fn validate(settings: &Settings) -> StoreResult<()> {
    if settings.model.trim().is_empty() {
        return Err(StoreError::Validation {
            field: "model",
            value: settings.model.clone(),
        });
    }
    let lang = &settings.target_language;
    if lang.len() != 2 || !lang.bytes().all(|b| b.is_ascii_lowercase()) {
        return Err(StoreError::Validation {
            field: "target_language",
            value: lang.clone(),
        });
    }
    Ok(())
}

pub struct SettingsStore {
    state: Mutex<Settings>,
    tx: watch::Sender<Settings>,
    snapshot_path: Option<PathBuf>,
}

impl SettingsStore {
    /// Load the durable snapshot (if any) and start from defaults
    /// merged with its valid fields. The API key always starts empty.
    pub fn open(snapshot_path: impl Into<PathBuf>) -> Self {
        let snapshot_path = snapshot_path.into();
        let initial = load_snapshot(&snapshot_path);
        Self::with_state(initial, Some(snapshot_path))
    }

    /// A store with no durable snapshot at all (tests, incognito
    /// sessions). Mutations still notify subscribers.
    pub fn ephemeral() -> Self {
        Self::with_state(Settings::default(), None)
    }

    fn with_state(initial: Settings, snapshot_path: Option<PathBuf>) -> Self {
        let (tx, _) = watch::channel(initial.clone());
        Self {
            state: Mutex::new(initial),
            tx,
            snapshot_path,
        }
    }

    /// Current snapshot of the full state. Synchronous: the durable
    /// copy was loaded once at startup, so no I/O on the hot path.
    pub fn get(&self) -> Settings {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Subscribe to settings changes. Every accepted mutation publishes
    /// the new full state.
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    /// Replace the whole state. Validation runs on the full resulting
    /// state before anything is applied; on failure the in-memory state
    /// is untouched.
    pub fn set(&self, new_state: Settings) -> StoreResult<()> {
        validate(&new_state)?;
        self.commit(new_state);
        Ok(())
    }

    /// Mutate through a closure. The updater runs under the state lock
    /// and must not call back into this store.
    pub fn update(&self, f: impl FnOnce(&mut Settings)) -> StoreResult<()> {
        let next = {
            let guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let mut next = guard.clone();
            f(&mut next);
            next
        };
        validate(&next)?;
        self.commit(next);
        Ok(())
    }

    pub fn set_provider(&self, provider: Provider) -> StoreResult<()> {
        self.update(|s| s.provider = provider)
    }

    pub fn set_model(&self, model: &str) -> StoreResult<()> {
        let model = model.trim().to_string();
        self.update(|s| s.model = model)
    }

    pub fn set_target_language(&self, language: &str) -> StoreResult<()> {
        let language = language.to_string();
        self.update(|s| s.target_language = language)
    }

    /// Set the volatile API key. Unconditionally accepted (empty means
    /// "cleared") and guaranteed never to reach the durable write path.
    pub fn set_api_key(&self, key: &str) {
        let next = {
            let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
            guard.api_key = key.to_string();
            guard.clone()
        };
        self.tx.send_replace(next);
    }

    /// Restore compiled-in defaults and delete the durable snapshot.
    /// Deletion is idempotent: a missing file is not an error.
    pub fn reset(&self) {
        self.commit_volatile(Settings::default());
        if let Some(path) = &self.snapshot_path {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to delete settings snapshot");
                }
            }
        }
    }

    /// Apply an already-validated state: swap, notify, then best-effort
    /// persist the non-secret subset.
    fn commit(&self, next: Settings) {
        self.commit_volatile(next.clone());
        if let Some(path) = &self.snapshot_path {
            if let Err(e) = write_snapshot(path, &next) {
                warn!(path = %path.display(), error = %e, "failed to persist settings snapshot");
            }
        }
    }

    fn commit_volatile(&self, next: Settings) {
        {
            let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
            *guard = next.clone();
        }
        self.tx.send_replace(next);
    }
}

fn write_snapshot(path: &Path, settings: &Settings) -> std::io::Result<()> {
    let durable = DurableSettings {
        provider: settings.provider.as_str(),
        model: &settings.model,
        target_language: &settings.target_language,
    };
    let json = serde_json::to_string_pretty(&durable)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
}

/// Read the snapshot, falling back per field. An unreadable or
/// malformed file degrades to full defaults with a warning.
fn load_snapshot(path: &Path) -> Settings {
    let mut settings = Settings::default();

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to read settings snapshot");
            }
            return settings;
        }
    };

    let fields: SnapshotFields = match serde_json::from_str(&content) {
        Ok(fields) => fields,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed settings snapshot, using defaults");
            return settings;
        }
    };

    if let Some(raw) = fields.provider {
        match raw.parse() {
            Ok(provider) => settings.provider = provider,
            Err(_) => warn!(value = %raw, "invalid provider in snapshot, keeping default"),
        }
    }
    if let Some(model) = fields.model {
        let candidate = Settings {
            model: model.clone(),
            ..settings.clone()
        };
        if validate(&candidate).is_ok() {
            settings.model = model;
        } else {
            warn!("invalid model in snapshot, keeping default");
        }
    }
    if let Some(lang) = fields.target_language {
        let candidate = Settings {
            target_language: lang.clone(),
            ..settings.clone()
        };
        if validate(&candidate).is_ok() {
            settings.target_language = lang;
        } else {
            warn!(value = %lang, "invalid target_language in snapshot, keeping default");
        }
    }

    settings
}
