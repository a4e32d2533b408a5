//! # Storage Adapter
//!
//! Row-level primitives the registries are built on. The adapter owns no
//! business logic: it stores typed records keyed by a storage-assigned id and
//! hands them back in insertion order.
//!
//! ## Transactions
//!
//! Every registry mutation runs inside exactly one [`StoreWrite`]
//! transaction. Dropping a transaction without calling
//! [`StoreWrite::commit`] discards all of its writes, so validation failures
//! discovered mid-transaction leave no trace. Write transactions are
//! serialized by every backend, which is what keeps the per-project overlap
//! check race-free.
//!
//! ## Backends
//!
//! - [`MemoryStore`]: volatile, mutex-guarded tables
//! - [`RedbStore`]: disk-backed ACID storage using redb

mod memory;
mod redb_store;

pub use memory::{MemorySnapshot, MemoryStore, MemoryTransaction};
pub use redb_store::{RedbSnapshot, RedbStore, RedbTransaction};

use crate::RegistryError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

// =============================================================================
// TABLES & RECORDS
// =============================================================================

/// The tables managed by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    ParameterSets,
    TrainedModels,
}

impl Table {
    /// Every table, in a fixed order.
    pub const ALL: [Table; 2] = [Table::ParameterSets, Table::TrainedModels];

    /// Name of the table in the underlying store.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Table::ParameterSets => "parameter_sets",
            Table::TrainedModels => "trained_models",
        }
    }

    /// Key under which the last assigned id of this table is kept.
    pub(crate) fn sequence_key(&self) -> &'static str {
        match self {
            Table::ParameterSets => "parameter_sets.last_id",
            Table::TrainedModels => "trained_models.last_id",
        }
    }
}

/// A row type stored in one [`Table`].
pub trait Record: Serialize + DeserializeOwned {
    /// The table holding rows of this type.
    const TABLE: Table;

    /// The row id (0 until assigned by [`StoreWrite::insert`]).
    fn id(&self) -> u64;

    /// Store the id assigned on insertion.
    fn assign_id(&mut self, id: u64);
}

pub(crate) fn encode<R: Record>(record: &R) -> Result<Vec<u8>, RegistryError> {
    postcard::to_allocvec(record).map_err(|e| {
        RegistryError::Serialization(format!("encode {} row: {}", R::TABLE.name(), e))
    })
}

pub(crate) fn decode<R: Record>(bytes: &[u8]) -> Result<R, RegistryError> {
    postcard::from_bytes(bytes).map_err(|e| {
        RegistryError::Serialization(format!("decode {} row: {}", R::TABLE.name(), e))
    })
}

// =============================================================================
// ADAPTER TRAITS
// =============================================================================

/// Read access to a consistent view of the store.
pub trait StoreRead {
    /// Fetch one row by id.
    fn find_by_id<R: Record>(&self, id: u64) -> Result<Option<R>, RegistryError>;

    /// Fetch every row matching `predicate`, in ascending id (insertion) order.
    fn find_where<R, P>(&self, predicate: P) -> Result<Vec<R>, RegistryError>
    where
        R: Record,
        P: Fn(&R) -> bool;

    /// Number of rows in a table.
    fn count(&self, table: Table) -> Result<usize, RegistryError>;
}

/// A write transaction. Dropping it without `commit` rolls it back.
pub trait StoreWrite: StoreRead {
    /// Insert a new row, assigning and returning its id.
    fn insert<R: Record>(&mut self, record: &mut R) -> Result<u64, RegistryError>;

    /// Overwrite an existing row. Returns `None` if no row has that id.
    fn update<R: Record>(&mut self, record: &R) -> Result<Option<u64>, RegistryError>;

    /// Make every write of this transaction durable and visible.
    fn commit(self) -> Result<(), RegistryError>;
}

/// A store that can open read snapshots and write transactions.
pub trait Store: Send + Sync {
    type Snapshot<'a>: StoreRead
    where
        Self: 'a;
    type Transaction<'a>: StoreWrite
    where
        Self: 'a;

    /// Open a read-only snapshot.
    fn snapshot(&self) -> Result<Self::Snapshot<'_>, RegistryError>;

    /// Begin a write transaction.
    fn begin(&self) -> Result<Self::Transaction<'_>, RegistryError>;
}

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Runtime-selected store.
#[derive(Debug)]
pub enum StorageBackend {
    /// Mutex-guarded tables (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    /// A fresh volatile store.
    #[must_use]
    pub fn memory() -> Self {
        Self::default()
    }

    /// Open or create a redb database at `path`.
    pub fn redb(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, StorageBackend::Persistent(_))
    }
}

/// Snapshot of a [`StorageBackend`].
pub enum BackendSnapshot<'a> {
    InMemory(MemorySnapshot<'a>),
    Persistent(RedbSnapshot),
}

/// Write transaction of a [`StorageBackend`].
pub enum BackendTransaction<'a> {
    InMemory(MemoryTransaction<'a>),
    Persistent(RedbTransaction),
}

impl StoreRead for BackendSnapshot<'_> {
    fn find_by_id<R: Record>(&self, id: u64) -> Result<Option<R>, RegistryError> {
        match self {
            BackendSnapshot::InMemory(s) => s.find_by_id(id),
            BackendSnapshot::Persistent(s) => s.find_by_id(id),
        }
    }

    fn find_where<R, P>(&self, predicate: P) -> Result<Vec<R>, RegistryError>
    where
        R: Record,
        P: Fn(&R) -> bool,
    {
        match self {
            BackendSnapshot::InMemory(s) => s.find_where(predicate),
            BackendSnapshot::Persistent(s) => s.find_where(predicate),
        }
    }

    fn count(&self, table: Table) -> Result<usize, RegistryError> {
        match self {
            BackendSnapshot::InMemory(s) => s.count(table),
            BackendSnapshot::Persistent(s) => s.count(table),
        }
    }
}

impl StoreRead for BackendTransaction<'_> {
    fn find_by_id<R: Record>(&self, id: u64) -> Result<Option<R>, RegistryError> {
        match self {
            BackendTransaction::InMemory(t) => t.find_by_id(id),
            BackendTransaction::Persistent(t) => t.find_by_id(id),
        }
    }

    fn find_where<R, P>(&self, predicate: P) -> Result<Vec<R>, RegistryError>
    where
        R: Record,
        P: Fn(&R) -> bool,
    {
        match self {
            BackendTransaction::InMemory(t) => t.find_where(predicate),
            BackendTransaction::Persistent(t) => t.find_where(predicate),
        }
    }

    fn count(&self, table: Table) -> Result<usize, RegistryError> {
        match self {
            BackendTransaction::InMemory(t) => t.count(table),
            BackendTransaction::Persistent(t) => t.count(table),
        }
    }
}

impl StoreWrite for BackendTransaction<'_> {
    fn insert<R: Record>(&mut self, record: &mut R) -> Result<u64, RegistryError> {
        match self {
            BackendTransaction::InMemory(t) => t.insert(record),
            BackendTransaction::Persistent(t) => t.insert(record),
        }
    }

    fn update<R: Record>(&mut self, record: &R) -> Result<Option<u64>, RegistryError> {
        match self {
            BackendTransaction::InMemory(t) => t.update(record),
            BackendTransaction::Persistent(t) => t.update(record),
        }
    }

    fn commit(self) -> Result<(), RegistryError> {
        match self {
            BackendTransaction::InMemory(t) => t.commit(),
            BackendTransaction::Persistent(t) => t.commit(),
        }
    }
}

impl Store for StorageBackend {
    type Snapshot<'a> = BackendSnapshot<'a>;
    type Transaction<'a> = BackendTransaction<'a>;

    fn snapshot(&self) -> Result<Self::Snapshot<'_>, RegistryError> {
        match self {
            StorageBackend::InMemory(store) => Ok(BackendSnapshot::InMemory(store.snapshot()?)),
            StorageBackend::Persistent(store) => {
                Ok(BackendSnapshot::Persistent(store.snapshot()?))
            }
        }
    }

    fn begin(&self) -> Result<Self::Transaction<'_>, RegistryError> {
        match self {
            StorageBackend::InMemory(store) => Ok(BackendTransaction::InMemory(store.begin()?)),
            StorageBackend::Persistent(store) => {
                Ok(BackendTransaction::Persistent(store.begin()?))
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde::Deserialize;

    /// Minimal row type for exercising backends.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub(crate) struct Note {
        pub id: u64,
        pub project: u64,
        pub text: String,
    }

    impl Note {
        pub(crate) fn new(project: u64, text: &str) -> Self {
            Self {
                id: 0,
                project,
                text: text.to_string(),
            }
        }
    }

    impl Record for Note {
        const TABLE: Table = Table::ParameterSets;

        fn id(&self) -> u64 {
            self.id
        }

        fn assign_id(&mut self, id: u64) {
            self.id = id;
        }
    }

    /// Shared contract every backend must satisfy.
    pub(crate) fn exercise_store<S: Store>(store: &S) {
        let mut txn = store.begin().expect("begin");
        let mut first = Note::new(1, "first");
        let mut second = Note::new(2, "second");
        let mut third = Note::new(1, "third");
        assert_eq!(txn.insert(&mut first).expect("insert"), 1);
        assert_eq!(txn.insert(&mut second).expect("insert"), 2);
        assert_eq!(txn.insert(&mut third).expect("insert"), 3);
        assert_eq!(first.id, 1);
        txn.commit().expect("commit");

        let snapshot = store.snapshot().expect("snapshot");
        let found: Option<Note> = snapshot.find_by_id(2).expect("find");
        assert_eq!(found, Some(second));
        let missing: Option<Note> = snapshot.find_by_id(99).expect("find");
        assert!(missing.is_none());

        let project_one: Vec<Note> = snapshot.find_where(|n: &Note| n.project == 1).expect("where");
        let ids: Vec<u64> = project_one.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(snapshot.count(Table::ParameterSets).expect("count"), 3);
        assert_eq!(snapshot.count(Table::TrainedModels).expect("count"), 0);
        drop(snapshot);

        // Update an existing row and a missing one.
        let mut txn = store.begin().expect("begin");
        first.text = "edited".to_string();
        assert_eq!(txn.update(&first).expect("update"), Some(1));
        let ghost = Note {
            id: 42,
            project: 1,
            text: "ghost".to_string(),
        };
        assert_eq!(txn.update(&ghost).expect("update"), None);
        txn.commit().expect("commit");

        let snapshot = store.snapshot().expect("snapshot");
        let edited: Option<Note> = snapshot.find_by_id(1).expect("find");
        assert_eq!(edited.map(|n| n.text), Some("edited".to_string()));
        drop(snapshot);

        // Dropped transactions leave no trace.
        {
            let mut txn = store.begin().expect("begin");
            let mut discarded = Note::new(3, "discarded");
            txn.insert(&mut discarded).expect("insert");
            first.text = "discarded edit".to_string();
            txn.update(&first).expect("update");
            let inside: Vec<Note> = txn.find_where(|n: &Note| n.project == 3).expect("where");
            assert_eq!(inside.len(), 1);
        }
        let snapshot = store.snapshot().expect("snapshot");
        let after: Vec<Note> = snapshot.find_where(|_: &Note| true).expect("where");
        assert_eq!(after.len(), 3);
        assert_eq!(after[0].text, "edited");
    }

    #[test]
    fn backend_enum_dispatches_to_memory() {
        let backend = StorageBackend::memory();
        assert!(!backend.is_persistent());
        exercise_store(&backend);
    }

    #[test]
    fn backend_enum_dispatches_to_redb() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = StorageBackend::redb(dir.path().join("registry.redb")).expect("open");
        assert!(backend.is_persistent());
        exercise_store(&backend);
    }

    #[test]
    fn table_names_are_distinct() {
        assert_ne!(Table::ParameterSets.name(), Table::TrainedModels.name());
        assert_ne!(
            Table::ParameterSets.sequence_key(),
            Table::TrainedModels.sequence_key()
        );
    }
}
