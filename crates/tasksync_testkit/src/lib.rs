//! # TaskSync Testkit
//!
//! Test utilities for TaskSync.
//!
//! This crate provides:
//! - Task fixtures for both sides of a scope
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tasksync_testkit::prelude::*;
//!
//! #[test]
//! fn matches_by_title() {
//!     let left = left_task("l1", "Buy milk");
//!     let right = right_task("r1", "buy milk");
//!     // ... reconcile
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
