//! # In-Memory Store
//!
//! Volatile tables behind a `Mutex`. A write transaction holds the lock for
//! its whole lifetime and stages only the rows it inserts or updates; commit
//! merges them into the tables. Snapshots hold the lock too, so readers never
//! observe a half-applied transaction.

use super::{Record, Store, StoreRead, StoreWrite, Table, decode, encode};
use crate::RegistryError;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

type Rows = BTreeMap<u64, Vec<u8>>;

/// Row bytes per table plus the last id handed out per table.
#[derive(Debug, Default)]
struct Tables {
    rows: BTreeMap<Table, Rows>,
    last_ids: BTreeMap<Table, u64>,
}

impl Tables {
    fn table(&self, table: Table) -> Option<&Rows> {
        self.rows.get(&table)
    }

    fn find_by_id<R: Record>(&self, id: u64) -> Result<Option<R>, RegistryError> {
        self.table(R::TABLE)
            .and_then(|rows| rows.get(&id))
            .map(|bytes| decode(bytes))
            .transpose()
    }

    fn find_where<R, P>(&self, predicate: P) -> Result<Vec<R>, RegistryError>
    where
        R: Record,
        P: Fn(&R) -> bool,
    {
        let rows = self.table(R::TABLE).into_iter().flat_map(BTreeMap::values);
        decode_matching(rows, predicate)
    }

    fn count(&self, table: Table) -> usize {
        self.table(table).map_or(0, BTreeMap::len)
    }
}

fn decode_matching<'r, R, P>(
    rows: impl Iterator<Item = &'r Vec<u8>>,
    predicate: P,
) -> Result<Vec<R>, RegistryError>
where
    R: Record,
    P: Fn(&R) -> bool,
{
    let mut matches = Vec::new();
    for bytes in rows {
        let record: R = decode(bytes)?;
        if predicate(&record) {
            matches.push(record);
        }
    }
    Ok(matches)
}

/// A volatile store for tests, demos and `--backend memory`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RegistryError> {
        self.tables
            .lock()
            .map_err(|_| RegistryError::Storage("memory store lock poisoned".to_string()))
    }
}

/// Read view holding the store lock.
pub struct MemorySnapshot<'a> {
    tables: MutexGuard<'a, Tables>,
}

/// Write transaction staging its own rows on top of the committed tables.
pub struct MemoryTransaction<'a> {
    committed: MutexGuard<'a, Tables>,
    staged: Tables,
}

impl MemoryTransaction<'_> {
    /// Committed rows of `table` overlaid with the staged ones, in id order.
    fn merged(&self, table: Table) -> BTreeMap<u64, &Vec<u8>> {
        let mut rows = BTreeMap::new();
        for source in [self.committed.table(table), self.staged.table(table)]
            .into_iter()
            .flatten()
        {
            rows.extend(source.iter().map(|(id, bytes)| (*id, bytes)));
        }
        rows
    }

    fn contains(&self, table: Table, id: u64) -> bool {
        [self.staged.table(table), self.committed.table(table)]
            .into_iter()
            .flatten()
            .any(|rows| rows.contains_key(&id))
    }

    fn last_id(&self, table: Table) -> u64 {
        self.staged
            .last_ids
            .get(&table)
            .or_else(|| self.committed.last_ids.get(&table))
            .copied()
            .unwrap_or(0)
    }

    fn stage<R: Record>(&mut self, record: &R) -> Result<(), RegistryError> {
        let bytes = encode(record)?;
        self.staged
            .rows
            .entry(R::TABLE)
            .or_default()
            .insert(record.id(), bytes);
        Ok(())
    }
}

impl StoreRead for MemorySnapshot<'_> {
    fn find_by_id<R: Record>(&self, id: u64) -> Result<Option<R>, RegistryError> {
        self.tables.find_by_id(id)
    }

    fn find_where<R, P>(&self, predicate: P) -> Result<Vec<R>, RegistryError>
    where
        R: Record,
        P: Fn(&R) -> bool,
    {
        self.tables.find_where(predicate)
    }

    fn count(&self, table: Table) -> Result<usize, RegistryError> {
        Ok(self.tables.count(table))
    }
}

impl StoreRead for MemoryTransaction<'_> {
    fn find_by_id<R: Record>(&self, id: u64) -> Result<Option<R>, RegistryError> {
        match self.staged.table(R::TABLE).and_then(|rows| rows.get(&id)) {
            Some(bytes) => decode(bytes).map(Some),
            None => self.committed.find_by_id(id),
        }
    }

    fn find_where<R, P>(&self, predicate: P) -> Result<Vec<R>, RegistryError>
    where
        R: Record,
        P: Fn(&R) -> bool,
    {
        decode_matching(self.merged(R::TABLE).into_values(), predicate)
    }

    fn count(&self, table: Table) -> Result<usize, RegistryError> {
        Ok(self.merged(table).len())
    }
}

impl StoreWrite for MemoryTransaction<'_> {
    fn insert<R: Record>(&mut self, record: &mut R) -> Result<u64, RegistryError> {
        let id = self.last_id(R::TABLE).saturating_add(1);
        record.assign_id(id);
        self.stage(record)?;
        self.staged.last_ids.insert(R::TABLE, id);
        Ok(id)
    }

    fn update<R: Record>(&mut self, record: &R) -> Result<Option<u64>, RegistryError> {
        let id = record.id();
        if !self.contains(R::TABLE, id) {
            return Ok(None);
        }
        self.stage(record)?;
        Ok(Some(id))
    }

    fn commit(self) -> Result<(), RegistryError> {
        let MemoryTransaction {
            mut committed,
            staged,
        } = self;
        for (table, rows) in staged.rows {
            committed.rows.entry(table).or_default().extend(rows);
        }
        committed.last_ids.extend(staged.last_ids);
        Ok(())
    }
}

impl Store for MemoryStore {
    type Snapshot<'a> = MemorySnapshot<'a>;
    type Transaction<'a> = MemoryTransaction<'a>;

    fn snapshot(&self) -> Result<Self::Snapshot<'_>, RegistryError> {
        Ok(MemorySnapshot {
            tables: self.lock()?,
        })
    }

    fn begin(&self) -> Result<Self::Transaction<'_>, RegistryError> {
        Ok(MemoryTransaction {
            committed: self.lock()?,
            staged: Tables::default(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
