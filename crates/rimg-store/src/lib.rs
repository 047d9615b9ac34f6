//! Key-addressed object storage for the random image service.
//!
//! The store is a flat namespace of slash-delimited keys (`cats/orange/1.jpg`)
//! holding opaque bytes plus a little metadata. The index subsystem only ever
//! consumes the [`ObjectStore`] trait: paginated listing, get-by-key and
//! put-by-key.
//!
//! # Storage Backends
//!
//! - [`InMemoryObjectStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`LocalFsObjectStore`] -- a directory tree on local disk
//!
//! # Design Rules
//!
//! 1. Listing is key-ordered and cursor-continued; a page without a
//!    `next_cursor` is the final page.
//! 2. `put` replaces the whole object (last writer wins).
//! 3. The store never interprets object contents.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use fs::LocalFsObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{content_type_for_key, ListPage, ObjectMeta, StoredObject};
pub use traits::ObjectStore;

/// Path separator used by every key in the namespace.
pub const KEY_SEPARATOR: char = '/';

/// Default number of entries returned per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;
