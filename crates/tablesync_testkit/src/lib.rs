//! # tablesync Testkit
//!
//! Test utilities for tablesync.
//!
//! This crate provides:
//! - Record and timestamp fixtures
//! - Ready-made pull clients over in-memory and file stores
//! - A scripted remote source that replays queued pages
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tablesync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn pulls_one_record() {
//!     let remote = ScriptedRemote::new();
//!     remote.push_page(vec![record(1, at(10), false)]);
//!     let harness = Harness::memory(remote).await;
//!     harness.pull(Some("q")).await.unwrap();
//!     assert_eq!(harness.store.row_count(TODO_TABLE), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod scripted;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::scripted::*;
}

pub use fixtures::*;
pub use generators::*;
pub use scripted::*;
