// crates/core/src/types/item.rs
//! Normalized work item model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An externally-sourced work item (pull request, issue) normalized by a
/// provider adapter.
///
/// Items are produced fresh on every fetch and treated as immutable
/// snapshots. Identity for reconciliation purposes is the `url`, not `id`:
/// local bookmarks carry no custom id field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Provider-assigned item identifier
    pub id: String,
    /// Source the item was fetched from
    pub provider_id: String,
    /// Display title
    pub title: String,
    /// Canonical URL; the reconciliation key
    pub url: String,
    /// Optional longer description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the item was created upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the item was last updated upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Last-modified timestamp used for conflict resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Provider-specific extra fields (state, labels, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl WorkItem {
    /// Creates a new work item with the required fields
    pub fn new(
        provider_id: impl Into<String>,
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            provider_id: provider_id.into(),
            title: title.into(),
            url: url.into(),
            description: None,
            created_at: None,
            updated_at: None,
            last_modified: None,
            metadata: HashMap::new(),
        }
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the upstream creation timestamp
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Sets the upstream update timestamp
    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Sets the last-modified timestamp
    pub fn with_last_modified(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = Some(at);
        self
    }

    /// Adds a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns true if this item's `last_modified` is strictly newer than
    /// the other's. An absent timestamp loses to a present one; two absent
    /// timestamps compare as not-newer.
    pub fn is_newer_than(&self, other: &WorkItem) -> bool {
        match (self.last_modified, other.last_modified) {
            (Some(a), Some(b)) => a > b,
            (Some(_), None) => true,
            _ => false,
        }
    }
}
