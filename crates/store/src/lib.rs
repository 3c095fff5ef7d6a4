//! Durable-state contracts for the inlet platform.
//!
//! All reads and writes of run/document state go through explicit store
//! traits with read-modify-write semantics; nothing is framework-managed.
//! In-memory reference implementations live alongside each trait and back
//! the test suites (and local single-process mode).

mod error;

pub mod documents;
pub mod runs;
pub mod scopes;
pub mod storage;

pub use documents::{DocumentStore, MemoryDocumentStore, RunCounts};
pub use error::{Result, StoreError};
pub use runs::{MemoryRunStore, RunStore};
pub use scopes::{ScopeResolver, StaticScopeResolver};
pub use storage::{LocalStorage, MemoryStorage, ObjectEntry, ObjectStorage, content_hash};
