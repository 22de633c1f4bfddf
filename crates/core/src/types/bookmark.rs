// crates/core/src/types/bookmark.rs
//! Local bookmark records and folder primitives

use serde::{Deserialize, Serialize};

/// A bookmark as read back from the bookmark store.
///
/// Ephemeral: re-read at the start of every sync cycle, never cached
/// across cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalBookmark {
    /// Store-assigned bookmark id
    pub bookmark_id: String,
    /// Bookmarked URL
    pub url: String,
    /// Bookmark title
    pub title: String,
}

impl LocalBookmark {
    /// Creates a new local bookmark record
    pub fn new(
        bookmark_id: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            bookmark_id: bookmark_id.into(),
            url: url.into(),
            title: title.into(),
        }
    }
}

/// A bookmark folder node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkFolder {
    /// Store-assigned folder id
    pub id: String,
    /// Folder title
    pub title: String,
}

impl BookmarkFolder {
    /// Creates a new folder record
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Ordering applied to a folder's bookmarks after each sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Sort by title
    Alphabetical,
    /// Sort by upstream creation time
    CreatedAt,
    /// Sort by last upstream update
    UpdatedAt,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::Alphabetical
    }
}
