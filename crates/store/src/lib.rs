//! Persistence contract for canonical threads and their bound documents.
//!
//! [`ThreadStore`] is the repository boundary the dedup engine and the query
//! layer both depend on. [`InMemoryBackend`] is the default for tests and
//! single-process demos; [`RedbBackend`] is the production backend built on
//! the embedded `redb` key-value store.
//!
//! Mutating operations are not exposed directly on [`ThreadStore`]: a caller
//! that needs to perform more than one of them as a single unit of work
//! (the dedup engine's ingest pipeline is the only one) calls
//! [`ThreadStore::begin_write`] to open a [`WriteSession`], performs every
//! read/write it needs through that session, and calls [`WriteSession::commit`]
//! exactly once. Nothing the session touched is visible to other callers
//! until `commit` runs; dropping a session without committing discards
//! everything done through it, so a failure partway through an ingest never
//! leaves a `CanonicalThread` without its `Document` or vice versa.

mod error;
mod in_memory;
mod redb_backend;
mod types;

pub use error::StoreError;
pub use in_memory::InMemoryBackend;
pub use redb_backend::RedbBackend;
pub use types::{CanonicalThread, Document};

use uuid::Uuid;

/// Repository contract over canonical threads and the documents bound to
/// them. Read-only lookups (used by hierarchy queries and the HTTP surface)
/// are single-operation and live directly on this trait; anything that
/// mutates state goes through [`WriteSession`].
pub trait ThreadStore: Send + Sync {
    /// Open a new unit-of-work. Backed by one `redb::WriteTransaction` for
    /// [`RedbBackend`]; an equivalent staged-write session for
    /// [`InMemoryBackend`].
    fn begin_write(&self) -> Result<Box<dyn WriteSession + '_>, StoreError>;

    fn get_cano_id_by_file_name(&self, name: &str) -> Result<Option<Uuid>, StoreError>;

    fn get_file_names_by_cano_id(&self, id: Uuid) -> Result<Vec<String>, StoreError>;

    fn get_parent_id(&self, id: Uuid) -> Result<Option<Uuid>, StoreError>;

    fn get_children_ids(&self, id: Uuid) -> Result<Vec<Uuid>, StoreError>;
}

/// A single unit-of-work over the store: every method here is scoped to one
/// commit boundary. Reads made through a session see its own uncommitted
/// writes plus whatever was already committed by others; nothing it writes
/// is visible anywhere else until [`WriteSession::commit`] succeeds.
pub trait WriteSession {
    /// All canonical threads with the given reply-chain length.
    fn find_candidates_by_length(&self, length: u32) -> Result<Vec<CanonicalThread>, StoreError>;

    /// Canonical threads with the given length that have a known suffix
    /// fingerprint but no assigned parent yet.
    fn find_orphan_candidates_by_length(
        &self,
        length: u32,
    ) -> Result<Vec<CanonicalThread>, StoreError>;

    /// Insert a new canonical thread. Fails if `cano_id` already exists.
    fn insert_canonical_thread(&mut self, ct: CanonicalThread) -> Result<(), StoreError>;

    /// Insert a new document. Fails if `file_name` already exists.
    fn insert_document(&mut self, doc: Document) -> Result<(), StoreError>;

    /// Assign `parent_id` as the parent of `child_id`. Idempotent when the
    /// same parent is set again; fails if a different parent is already
    /// assigned.
    fn set_parent(&mut self, child_id: Uuid, parent_id: Uuid) -> Result<(), StoreError>;

    /// Make every write performed through this session durable and visible.
    /// Dropping the session without calling this discards them.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
