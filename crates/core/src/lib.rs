// crates/core/src/lib.rs
//! Shared domain types for marksync
//!
//! This crate holds the data model every other marksync crate speaks:
//! normalized work items fetched from external providers, the local
//! bookmark records they are mirrored into, and folder/sort primitives.

pub mod types;

pub use types::{BookmarkFolder, LocalBookmark, SortOrder, WorkItem};
