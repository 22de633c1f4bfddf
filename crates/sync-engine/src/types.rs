// crates/sync-engine/src/types.rs
//! Core sync types and data structures

use chrono::{DateTime, Utc};
use marksync_core::{LocalBookmark, WorkItem};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// The minimal set of operations needed to converge a folder's bookmarks
/// with a freshly fetched remote item set.
///
/// A URL appears in at most one of the three lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncDiff {
    /// Remote items with no local counterpart
    pub to_add: Vec<WorkItem>,
    /// Pairs present on both sides whose titles differ
    pub to_update: Vec<BookmarkUpdate>,
    /// Bookmark ids whose URLs are gone from the remote set
    pub to_delete: Vec<String>,
}

impl SyncDiff {
    /// Returns true when applying the diff would change nothing
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Total number of pending operations
    pub fn change_count(&self) -> usize {
        self.to_add.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// A single pending title update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkUpdate {
    /// Bookmark to rewrite
    pub bookmark_id: String,
    /// Local record as read this cycle
    pub old: LocalBookmark,
    /// Remote item that replaces it
    pub new: WorkItem,
}

/// Kind of disagreement between two representations of one logical item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Titles or other metadata differ
    Metadata,
    /// Titles match but URLs differ
    UrlMismatch,
}

/// A detected disagreement between the local and remote snapshot of an item.
///
/// Identity is stable per `(provider_id, item_id)`: repeated detection on
/// the same pair overwrites rather than duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    /// Stable id, `"{provider_id}-{item_id}"`
    pub id: String,
    /// Kind of disagreement
    pub kind: ConflictKind,
    /// Locally-known snapshot
    pub local: WorkItem,
    /// Freshly fetched snapshot
    pub remote: WorkItem,
    /// Source the item belongs to
    pub provider_id: String,
    /// When the conflict was detected
    pub detected_at: DateTime<Utc>,
}

impl Conflict {
    /// Builds the stable conflict id for an item
    pub fn make_id(provider_id: &str, item_id: &str) -> String {
        format!("{provider_id}-{item_id}")
    }
}

/// Policy used to pick (or merge) a winner for a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// The fetched snapshot wins
    RemoteWins,
    /// The local snapshot wins
    LocalWins,
    /// The snapshot with the larger `last_modified` wins; remote on ties
    NewestWins,
    /// Newest snapshot's scalars, missing fields filled from the loser
    Merge,
    /// Defer to the user
    Manual,
}

impl Default for ResolutionStrategy {
    fn default() -> Self {
        Self::RemoteWins
    }
}

/// Outcome of resolving a conflict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResolution {
    /// Strategy that produced this resolution
    pub strategy: ResolutionStrategy,
    /// Winning item, absent while user confirmation is pending
    pub resolved: Option<WorkItem>,
    /// True when the conflict must be resolved manually
    pub requires_user_confirmation: bool,
}

/// User decision for a manually-resolved conflict
#[derive(Debug, Clone)]
pub enum ManualChoice {
    /// Keep the local snapshot
    KeepLocal,
    /// Keep the fetched snapshot
    KeepRemote,
    /// Substitute a caller-supplied item
    Custom(WorkItem),
}

/// Detection counters, incremented as conflicts are found
#[derive(Debug, Clone, Default)]
pub struct ConflictStats {
    /// Conflicts detected since the last clear
    pub total: usize,
    /// Detections per source
    pub by_provider: HashMap<String, usize>,
    /// Detections per kind
    pub by_kind: HashMap<ConflictKind, usize>,
}

/// Phase of a source's sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// No cycle running
    Idle,
    /// Fetching items from the provider
    Fetching,
    /// Computing the diff
    Diffing,
    /// Applying changes to the bookmark store
    Applying,
    /// Writing checkpoints
    Persisting,
}

impl Default for SyncPhase {
    fn default() -> Self {
        Self::Idle
    }
}

/// Per-source registration handed to the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source identifier
    pub provider_id: String,
    /// Target folder in the bookmark store
    pub folder_id: Option<String>,
    /// Whether the source takes part in `sync_all`
    pub enabled: bool,
    /// Whether a usable credential exists
    pub authenticated: bool,
}

impl SourceConfig {
    /// Creates an enabled, authenticated source targeting a folder
    pub fn new(provider_id: impl Into<String>, folder_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            folder_id: Some(folder_id.into()),
            enabled: true,
            authenticated: true,
        }
    }

    /// Marks the source disabled
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Marks the source unauthenticated
    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }

    /// Creates a source with no folder configured
    pub fn without_folder(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            folder_id: None,
            enabled: true,
            authenticated: true,
        }
    }
}

/// Outcome of one source's sync cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Source the report describes
    pub provider_id: String,
    /// Whether the cycle completed
    pub success: bool,
    /// Bookmarks created
    pub items_added: usize,
    /// Bookmarks rewritten
    pub items_updated: usize,
    /// Bookmarks removed
    pub items_deleted: usize,
    /// Failure description when `success` is false
    pub error: Option<String>,
    /// Wall time of the cycle
    pub duration: Duration,
}

impl SyncReport {
    /// Creates a failed report carrying an error message
    pub fn failure(provider_id: impl Into<String>, error: String, duration: Duration) -> Self {
        Self {
            provider_id: provider_id.into(),
            success: false,
            items_added: 0,
            items_updated: 0,
            items_deleted: 0,
            error: Some(error),
            duration,
        }
    }
}

/// Collected outcome of a full `sync_all` pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSummary {
    /// One report per source that ran
    pub reports: Vec<SyncReport>,
    /// Number of reports with `success == true`
    pub succeeded: usize,
}

impl SyncSummary {
    /// Returns true when every source that ran succeeded
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.reports.len()
    }
}

/// Per-item linkage persisted across cycles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCheckpoint {
    /// Bookmark the item is mirrored into
    pub bookmark_id: String,
    /// When the linkage was first written
    pub created_at: DateTime<Utc>,
    /// When the linkage was last touched
    pub updated_at: DateTime<Utc>,
    /// Item's `last_modified` as of the last apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}
