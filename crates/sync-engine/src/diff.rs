// crates/sync-engine/src/diff.rs
//! Reconciliation diffing
//!
//! Computes the minimal create/update/delete set that converges a folder's
//! bookmarks with a freshly fetched remote item set. Identity is the URL:
//! local bookmarks carry no item id, so a remote URL change on a stable
//! logical item surfaces as one delete plus one add.

use crate::types::{BookmarkUpdate, SyncDiff};
use marksync_core::{LocalBookmark, WorkItem};
use std::collections::HashMap;

/// Computes the diff between the folder's current bookmarks and the remote
/// item set.
///
/// Pure function over its inputs: no network or storage side effects, and
/// identical inputs always produce an identical diff. Each URL lands in at
/// most one of the three lists.
pub fn compute_diff(local: &[LocalBookmark], remote: &[WorkItem]) -> SyncDiff {
    let local_by_url: HashMap<&str, &LocalBookmark> =
        local.iter().map(|b| (b.url.as_str(), b)).collect();
    let remote_by_url: HashMap<&str, &WorkItem> =
        remote.iter().map(|i| (i.url.as_str(), i)).collect();

    let mut diff = SyncDiff::default();

    for item in remote {
        match local_by_url.get(item.url.as_str()) {
            None => diff.to_add.push(item.clone()),
            Some(bookmark) => {
                if bookmark.title != item.title {
                    diff.to_update.push(BookmarkUpdate {
                        bookmark_id: bookmark.bookmark_id.clone(),
                        old: (*bookmark).clone(),
                        new: item.clone(),
                    });
                }
            }
        }
    }

    for bookmark in local {
        if !remote_by_url.contains_key(bookmark.url.as_str()) {
            diff.to_delete.push(bookmark.bookmark_id.clone());
        }
    }

    diff
}
