// crates/sync-engine/src/traits.rs
//! Collaborator contracts
//!
//! The sync engine owns no I/O of its own. Provider clients, the bookmark
//! store, settings, notifications and checkpoints are all reached through
//! these narrow async contracts and injected as `Arc<dyn _>` service
//! objects.

use crate::error::SyncResult;
use crate::types::{BookmarkUpdate, ItemCheckpoint};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marksync_core::{BookmarkFolder, LocalBookmark, SortOrder, WorkItem};
use serde::{Deserialize, Serialize};

/// Fetches normalized work items for a source.
///
/// Implementations translate raw API responses into [`WorkItem`]s and tag
/// failures with the right `SyncError` variant at this boundary.
#[async_trait]
pub trait ItemProvider: Send + Sync {
    /// Fetches the source's current item set
    async fn fetch_items(&self, provider_id: &str) -> SyncResult<Vec<WorkItem>>;
}

/// Bookmark store primitives consumed by the engine
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Looks up a folder node; `None` when it no longer exists
    async fn get_folder(&self, folder_id: &str) -> SyncResult<Option<BookmarkFolder>>;

    /// Reads a folder's current bookmarks
    async fn get_folder_contents(&self, folder_id: &str) -> SyncResult<Vec<LocalBookmark>>;

    /// Creates bookmarks for the given items, returning their new ids in
    /// the same order
    async fn batch_create(
        &self,
        folder_id: &str,
        items: &[WorkItem],
        sort_order: SortOrder,
    ) -> SyncResult<Vec<String>>;

    /// Rewrites existing bookmarks
    async fn batch_update(&self, updates: &[BookmarkUpdate]) -> SyncResult<()>;

    /// Removes bookmarks by id
    async fn batch_delete(&self, bookmark_ids: &[String]) -> SyncResult<()>;

    /// Reorders a folder's bookmarks to match the given item order
    async fn reorder_folder(
        &self,
        folder_id: &str,
        items: &[WorkItem],
        sort_order: SortOrder,
    ) -> SyncResult<()>;

    /// Retitles a single bookmark node (folders included)
    async fn update_bookmark(&self, bookmark_id: &str, title: &str) -> SyncResult<()>;
}

/// User-facing notification toggles
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Master switch
    pub enabled: bool,
    /// Notify when a cycle completes
    pub notify_on_success: bool,
    /// Notify when a cycle fails
    pub notify_on_error: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            notify_on_success: true,
            notify_on_error: true,
        }
    }
}

/// Per-source item filters; empty lists match everything.
///
/// Filters are matched against the item metadata keys `state` and
/// `labels` the provider adapters populate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemFilters {
    /// Accepted item states (e.g. "open")
    #[serde(default)]
    pub states: Vec<String>,
    /// Required labels; an item matches if it carries any of them
    #[serde(default)]
    pub labels: Vec<String>,
}

impl ItemFilters {
    /// Returns true when the filters exclude nothing
    pub fn is_empty(&self) -> bool {
        self.states.is_empty() && self.labels.is_empty()
    }

    /// Returns true when the item passes every configured filter
    pub fn matches(&self, item: &WorkItem) -> bool {
        if !self.states.is_empty() {
            let state = item
                .metadata
                .get("state")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            if !self.states.iter().any(|s| s == state) {
                return false;
            }
        }
        if !self.labels.is_empty() {
            let has_label = item
                .metadata
                .get("labels")
                .and_then(|v| v.as_array())
                .map(|labels| {
                    labels
                        .iter()
                        .filter_map(|l| l.as_str())
                        .any(|l| self.labels.iter().any(|want| want == l))
                })
                .unwrap_or(false);
            if !has_label {
                return false;
            }
        }
        true
    }
}

/// Per-source presentation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Ordering applied after each cycle
    pub sort_order: SortOrder,
    /// Items excluded before diffing
    pub filters: ItemFilters,
}

/// Settings store consumed by the engine
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Reads the notification toggles
    async fn notification_settings(&self) -> NotificationSettings;

    /// Reads one source's presentation settings
    async fn source_settings(&self, provider_id: &str) -> SourceSettings;
}

/// Kind of user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Cycle completed
    Success,
    /// Cycle failed
    Failure,
}

/// A user-visible notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Success or failure
    pub kind: NotificationKind,
    /// Short headline
    pub title: String,
    /// Body text with counts or the error message
    pub message: String,
    /// Source the notification concerns
    pub provider_id: String,
}

/// Notification sink consumed by the engine
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers one notification
    async fn notify(&self, notification: Notification) -> SyncResult<()>;
}

/// Persisted sync checkpoints: the per-source last-sync timestamp plus the
/// per-item bookmark linkage map
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Reads a source's last successful sync time
    async fn last_sync(&self, provider_id: &str) -> SyncResult<Option<DateTime<Utc>>>;

    /// Writes a source's last successful sync time
    async fn set_last_sync(&self, provider_id: &str, at: DateTime<Utc>) -> SyncResult<()>;

    /// Reads one item's persisted linkage
    async fn item_checkpoint(
        &self,
        provider_id: &str,
        item_id: &str,
    ) -> SyncResult<Option<ItemCheckpoint>>;

    /// Writes one item's persisted linkage
    async fn set_item_checkpoint(
        &self,
        provider_id: &str,
        item_id: &str,
        checkpoint: ItemCheckpoint,
    ) -> SyncResult<()>;
}
