//! Core type system and error handling for driftsync
//!
//! This crate provides the foundational types shared by every driftsync crate:
//!
//! - **Error handling**: structured error types with fatality classification
//! - **Entry model**: immutable directory-listing snapshots with
//!   clock-rounding tolerant comparison
//! - **Run statistics**: counters accumulated over one synchronization pass
//!
//! # Examples
//!
//! ```rust
//! use driftsync_types::{Entry, EntryComparison};
//!
//! let local = Entry::file("a.txt", "", 3, 1_388_577_600.0);
//! let remote = Entry::file("a.txt", "", 3, 1_388_577_600.05);
//! assert_eq!(local.compare_files(&remote), EntryComparison::Equal);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod entry;
pub mod error;
pub mod result;
pub mod stats;

// Re-export commonly used types
pub use entry::{Entry, EntryComparison, EPS_TIME};
pub use error::{Error, ErrorKind};
pub use result::Result;
pub use stats::{SyncReport, SyncStats};
