//! # Luminote Store
//!
//! Client-resident persistence and synchronization layer for Luminote,
//! a dual-pane reading/translation tool.
//!
//! The crate owns the local data layer beneath the panes: a versioned
//! multi-partition SQLite store for translations, visit history, notes,
//! and AI artifacts; a reactive settings store whose API key never
//! touches durable storage; a retention engine that bounds history
//! growth; and a block identity map that keeps the source and
//! translation panes pointer-accurate while content streams in.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐
//! │ Backend  │──▶│ StoreManager │──▶│  SQLite   │
//! │ (writes) │   │ 4 partitions │   │ WAL+quota │
//! └──────────┘   └──────┬───────┘   └───────────┘
//!                       │ events
//!       ┌───────────────┼───────────────┐
//!       ▼               ▼               ▼
//! ┌──────────┐   ┌───────────┐   ┌─────────────┐
//! │ BlockMap │   │ Retention │   │ UI (reads,  │
//! │ (derived)│   │  sweep    │   │ subscribes) │
//! └──────────┘   └───────────┘   └─────────────┘
//! ```
//!
//! Translation, extraction, and rendering live outside this crate; it
//! only stores, retrieves, validates, and keeps addressable records
//! consistent.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Record types, partitions, constructors |
//! | [`error`] | Typed error taxonomy (`StoreError`) |
//! | [`config`] | Bootstrap TOML configuration |
//! | [`store`] | `StoreManager`: add/get/delete/sweep per partition |
//! | [`settings`] | Reactive settings with a volatile API key |
//! | [`retention`] | Horizon-based cleanup sweeps |
//! | [`blockmap`] | Source ↔ translation block lookup |

pub mod blockmap;
pub mod config;
mod db;
pub mod error;
mod migrate;
pub mod models;
pub mod retention;
pub mod settings;
pub mod store;

pub use blockmap::BlockMap;
pub use config::{load_config, Config};
pub use error::{StoreError, StoreResult};
pub use models::{
    ArtifactRecord, HistoryEntry, NoteKind, NoteRecord, Partition, TranslationRecord,
};
pub use settings::{Provider, Settings, SettingsStore};
pub use store::{StoreEvent, StoreManager};
