use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub mod in_memory_store;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("state key must not be empty")]
    EmptyKey,
    #[error("read conflict on {key}: read version {read}, committed version {current}")]
    Conflict {
        key: StateKey,
        read: u64,
        current: u64,
    },
}

/// A key scoped to the service that owns it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateKey {
    pub namespace: String,
    pub key: String,
}

impl StateKey {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.key)
    }
}

/// Committed value together with the number of writes it has seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub version: u64,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub tx_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub value: Vec<u8>,
}

/// Oldest first. Consumed once.
pub type HistoryIter<'a> = Box<dyn Iterator<Item = HistoryEntry> + 'a>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub tx_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub writes: usize,
}

/// Pending mutations of one invocation plus the versions it observed.
#[derive(Debug, Default, Clone)]
pub struct WriteSet {
    reads: BTreeMap<StateKey, u64>,
    writes: BTreeMap<StateKey, Vec<u8>>,
}

/// Snapshot of staged writes, used to undo a failed nested invocation.
#[derive(Debug, Clone)]
pub struct Savepoint(BTreeMap<StateKey, Vec<u8>>);

impl WriteSet {
    /// Only the first observed version of a key is kept.
    pub fn record_read(&mut self, key: StateKey, version: u64) {
        self.reads.entry(key).or_insert(version);
    }

    pub fn stage(&mut self, key: StateKey, value: Vec<u8>) {
        self.writes.insert(key, value);
    }

    pub fn staged(&self, key: &StateKey) -> Option<&[u8]> {
        self.writes.get(key).map(Vec::as_slice)
    }

    pub fn savepoint(&self) -> Savepoint {
        Savepoint(self.writes.clone())
    }

    pub fn rollback(&mut self, savepoint: Savepoint) {
        self.writes = savepoint.0;
    }

    pub fn reads(&self) -> impl Iterator<Item = (&StateKey, u64)> {
        self.reads.iter().map(|(key, version)| (key, *version))
    }

    pub(crate) fn len(&self) -> usize {
        self.writes.len()
    }

    pub(crate) fn into_writes(self) -> BTreeMap<StateKey, Vec<u8>> {
        self.writes
    }
}

/// Versioned key-value store with per-key history.
///
/// `commit` applies a whole [`WriteSet`] or nothing. A write set whose
/// recorded read versions no longer match the committed state is rejected
/// with [`StoreError::Conflict`]; retrying is up to the caller.
pub trait LedgerStore {
    fn get(&self, key: &StateKey) -> Result<Option<Versioned>, StoreError>;

    fn history(&self, key: &StateKey) -> Result<HistoryIter<'_>, StoreError>;

    fn commit(&mut self, write_set: WriteSet) -> Result<CommitReceipt, StoreError>;
}
