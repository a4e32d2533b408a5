//! # redb-backed Store
//!
//! Disk-backed tables using the redb embedded database. Each [`Table`] is a
//! redb table `u64 -> postcard bytes`; the last id handed out per table lives
//! in a separate `sequences` table so ids survive restarts and are never
//! reused.
//!
//! redb allows a single write transaction at a time (`begin_write` blocks
//! until the previous one finishes) and any number of MVCC readers.

use super::{Record, Store, StoreRead, StoreWrite, Table, decode, encode};
use crate::RegistryError;
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, WriteTransaction,
};
use std::path::{Path, PathBuf};

/// Table for id sequences: sequence key -> last assigned id
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

fn rows(table: Table) -> TableDefinition<'static, u64, &'static [u8]> {
    TableDefinition::new(table.name())
}

fn storage_err(e: impl std::fmt::Display) -> RegistryError {
    RegistryError::Storage(e.to_string())
}

/// A disk-backed store using redb.
pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path).map_err(storage_err)?;

        // Create tables up front so read transactions never miss them
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            for table in Table::ALL {
                let _ = write_txn.open_table(rows(table)).map_err(storage_err)?;
            }
            let _ = write_txn.open_table(SEQUENCES).map_err(storage_err)?;
            write_txn.commit().map_err(storage_err)?;
        }

        tracing::debug!(path = %path.display(), "redb store opened");
        Ok(Self { db, path })
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// =============================================================================
// SHARED TABLE HELPERS
// =============================================================================

fn find_by_id_in<T, R>(table: &T, id: u64) -> Result<Option<R>, RegistryError>
where
    T: ReadableTable<u64, &'static [u8]>,
    R: Record,
{
    match table.get(id).map_err(storage_err)? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => Ok(None),
    }
}

fn find_where_in<T, R, P>(table: &T, predicate: P) -> Result<Vec<R>, RegistryError>
where
    T: ReadableTable<u64, &'static [u8]>,
    R: Record,
    P: Fn(&R) -> bool,
{
    let mut matches = Vec::new();
    for entry in table.iter().map_err(storage_err)? {
        let (_, value) = entry.map_err(storage_err)?;
        let record: R = decode(value.value())?;
        if predicate(&record) {
            matches.push(record);
        }
    }
    Ok(matches)
}

fn count_in<T>(table: &T) -> Result<usize, RegistryError>
where
    T: ReadableTableMetadata,
{
    let len = table.len().map_err(storage_err)?;
    usize::try_from(len).map_err(storage_err)
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Read-only MVCC snapshot.
pub struct RedbSnapshot {
    txn: ReadTransaction,
}

impl StoreRead for RedbSnapshot {
    fn find_by_id<R: Record>(&self, id: u64) -> Result<Option<R>, RegistryError> {
        let table = self.txn.open_table(rows(R::TABLE)).map_err(storage_err)?;
        find_by_id_in(&table, id)
    }

    fn find_where<R, P>(&self, predicate: P) -> Result<Vec<R>, RegistryError>
    where
        R: Record,
        P: Fn(&R) -> bool,
    {
        let table = self.txn.open_table(rows(R::TABLE)).map_err(storage_err)?;
        find_where_in(&table, predicate)
    }

    fn count(&self, table: Table) -> Result<usize, RegistryError> {
        let table = self.txn.open_table(rows(table)).map_err(storage_err)?;
        count_in(&table)
    }
}

// =============================================================================
// WRITE TRANSACTION
// =============================================================================

/// Write transaction. Dropping it without `commit` aborts it.
pub struct RedbTransaction {
    txn: WriteTransaction,
}

impl RedbTransaction {
    fn next_id(&mut self, table: Table) -> Result<u64, RegistryError> {
        let mut sequences = self.txn.open_table(SEQUENCES).map_err(storage_err)?;
        let last = sequences
            .get(table.sequence_key())
            .map_err(storage_err)?
            .map(|v| v.value())
            .unwrap_or(0);
        let next = last.saturating_add(1);
        sequences
            .insert(table.sequence_key(), next)
            .map_err(storage_err)?;
        Ok(next)
    }
}

impl StoreRead for RedbTransaction {
    fn find_by_id<R: Record>(&self, id: u64) -> Result<Option<R>, RegistryError> {
        let table = self.txn.open_table(rows(R::TABLE)).map_err(storage_err)?;
        find_by_id_in(&table, id)
    }

    fn find_where<R, P>(&self, predicate: P) -> Result<Vec<R>, RegistryError>
    where
        R: Record,
        P: Fn(&R) -> bool,
    {
        let table = self.txn.open_table(rows(R::TABLE)).map_err(storage_err)?;
        find_where_in(&table, predicate)
    }

    fn count(&self, table: Table) -> Result<usize, RegistryError> {
        let table = self.txn.open_table(rows(table)).map_err(storage_err)?;
        count_in(&table)
    }
}

impl StoreWrite for RedbTransaction {
    fn insert<R: Record>(&mut self, record: &mut R) -> Result<u64, RegistryError> {
        let id = self.next_id(R::TABLE)?;
        record.assign_id(id);
        let bytes = encode(record)?;
        let mut table = self.txn.open_table(rows(R::TABLE)).map_err(storage_err)?;
        table.insert(id, bytes.as_slice()).map_err(storage_err)?;
        Ok(id)
    }

    fn update<R: Record>(&mut self, record: &R) -> Result<Option<u64>, RegistryError> {
        let id = record.id();
        let mut table = self.txn.open_table(rows(R::TABLE)).map_err(storage_err)?;
        let exists = table.get(id).map_err(storage_err)?.is_some();
        if !exists {
            return Ok(None);
        }
        let bytes = encode(record)?;
        table.insert(id, bytes.as_slice()).map_err(storage_err)?;
        Ok(Some(id))
    }

    fn commit(self) -> Result<(), RegistryError> {
        self.txn.commit().map_err(storage_err)
    }
}

impl Store for RedbStore {
    type Snapshot<'a> = RedbSnapshot;
    type Transaction<'a> = RedbTransaction;

    fn snapshot(&self) -> Result<Self::Snapshot<'_>, RegistryError> {
        let txn = self.db.begin_read().map_err(storage_err)?;
        Ok(RedbSnapshot { txn })
    }

    fn begin(&self) -> Result<Self::Transaction<'_>, RegistryError> {
        let txn = self.db.begin_write().map_err(storage_err)?;
        Ok(RedbTransaction { txn })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::{Note, exercise_store};
    use tempfile::tempdir;

    #[test]
    fn satisfies_store_contract() {
        let dir = tempdir().expect("tempdir");
        let store = RedbStore::open(dir.path().join("store.redb")).expect("open");
        exercise_store(&store);
    }

    #[test]
    fn rows_survive_reopen() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("store.redb");

        {
            let store = RedbStore::open(&path).expect("open");
            let mut txn = store.begin().expect("begin");
            let mut note = Note::new(7, "persisted");
            txn.insert(&mut note).expect("insert");
            txn.commit().expect("commit");
        }

        let store = RedbStore::open(&path).expect("reopen");
        assert_eq!(store.path(), path.as_path());
        let snapshot = store.snapshot().expect("snapshot");
        let note: Option<Note> = snapshot.find_by_id(1).expect("find");
        assert_eq!(note.map(|n| n.text), Some("persisted".to_string()));
    }

    #[test]
    fn sequence_continues_after_reopen() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("store.redb");

        {
            let store = RedbStore::open(&path).expect("open");
            let mut txn = store.begin().expect("begin");
            txn.insert(&mut Note::new(1, "a")).expect("insert");
            txn.insert(&mut Note::new(1, "b")).expect("insert");
            txn.commit().expect("commit");
        }

        let store = RedbStore::open(&path).expect("reopen");
        let mut txn = store.begin().expect("begin");
        let id = txn.insert(&mut Note::new(1, "c")).expect("insert");
        assert_eq!(id, 3);
    }

    #[test]
    fn aborted_insert_does_not_advance_sequence() {
        let dir = tempdir().expect("tempdir");
        let store = RedbStore::open(dir.path().join("store.redb")).expect("open");

        {
            let mut txn = store.begin().expect("begin");
            txn.insert(&mut Note::new(1, "aborted")).expect("insert");
        }

        let mut txn = store.begin().expect("begin");
        assert_eq!(txn.insert(&mut Note::new(1, "kept")).expect("insert"), 1);
        txn.commit().expect("commit");
    }
}
