// crates/sync-engine/src/lib.rs
//! Reconciliation engine for externally-sourced work items
//!
//! This crate converges two independently-mutating collections (a remote
//! item feed and a local bookmark store) while tolerating network
//! failure, upstream rate limits, and conflicting concurrent edits:
//! - Diff computation keyed by URL
//! - Conflict detection with pluggable resolution strategies
//! - A sequential per-source orchestrator with failure isolation
//!
//! External concerns (provider clients, the bookmark store, settings,
//! notifications, checkpoints) are injected through the contracts in
//! [`traits`].
//!
//! # Example
//!
//! ```rust
//! use marksync_sync_engine::{compute_diff, ConflictResolver, ResolutionStrategy};
//! use marksync_core::{LocalBookmark, WorkItem};
//!
//! let local = vec![LocalBookmark::new("bm-1", "https://x/1", "#1 open")];
//! let remote = vec![
//!     WorkItem::new("github", "1", "#1 closed", "https://x/1"),
//!     WorkItem::new("github", "2", "#2 open", "https://x/2"),
//! ];
//!
//! let diff = compute_diff(&local, &remote);
//! assert_eq!(diff.to_add.len(), 1);
//! assert_eq!(diff.to_update.len(), 1);
//!
//! let resolver = ConflictResolver::with_default_strategy(ResolutionStrategy::RemoteWins);
//! assert_eq!(resolver.unresolved_count(), 0);
//! ```

mod conflict;
mod diff;
mod engine;
mod error;
pub mod traits;
mod types;

pub use conflict::ConflictResolver;
pub use diff::compute_diff;
pub use engine::{Collaborators, SyncConfig, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use traits::{
    BookmarkStore, CheckpointStore, ItemFilters, ItemProvider, Notification, NotificationKind,
    NotificationSettings, NotificationSink, SettingsStore, SourceSettings,
};
pub use types::{
    BookmarkUpdate, Conflict, ConflictKind, ConflictResolution, ConflictStats, ItemCheckpoint,
    ManualChoice, ResolutionStrategy, SourceConfig, SyncDiff, SyncPhase, SyncReport, SyncSummary,
};
