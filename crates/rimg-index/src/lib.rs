//! Index subsystem for the random image service.
//!
//! Listing a large bucket on every request is expensive, so the collection
//! is folded once into a nested [`IndexTree`] of `segment -> subtree | timestamp`
//! and persisted back into the store as a snapshot. Requests then read the
//! snapshot through a TTL-bounded in-process cache and pick a leaf uniformly
//! at random, optionally under a category prefix.
//!
//! # Key Types
//!
//! - [`IndexBuilder`] -- walks the paginated listing and persists a snapshot
//! - [`IndexCache`] -- single-slot, TTL-bounded copy of the persisted snapshot
//! - [`IndexTree`] / [`TreeNode`] -- insertion-ordered leaf/branch tree
//! - [`selector`] -- scope resolution, flattening and uniform selection
//! - [`Clock`] -- injectable time source ([`SystemClock`], [`ManualClock`])

pub mod builder;
pub mod cache;
pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod selector;
pub mod snapshot;
pub mod tree;

pub use builder::{BuildStats, IndexBuilder, RefreshHandle};
pub use cache::{CachedIndex, IndexCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::IndexConfig;
pub use entry::{Eligibility, Ineligible, TimestampFormatter};
pub use error::{IndexError, IndexResult};
pub use selector::{flatten, leaves, pick, Leaves, Selection};
pub use tree::{Branch, IndexTree, TreeConflict, TreeNode};
