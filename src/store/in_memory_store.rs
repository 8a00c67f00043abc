use std::collections::HashMap;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::{
    CommitReceipt, HistoryEntry, HistoryIter, LedgerStore, StateKey, StoreError, Versioned,
    WriteSet,
};

/// Keeps every committed value of every key.
/// The current version of a key is the length of its history.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    keys: HashMap<StateKey, Vec<HistoryEntry>>,
}

impl InMemoryStore {
    fn version(&self, key: &StateKey) -> u64 {
        self.keys.get(key).map_or(0, |history| history.len() as u64)
    }
}

impl LedgerStore for InMemoryStore {
    fn get(&self, key: &StateKey) -> Result<Option<Versioned>, StoreError> {
        Ok(self.keys.get(key).and_then(|history| {
            history.last().map(|entry| Versioned {
                version: history.len() as u64,
                value: entry.value.clone(),
            })
        }))
    }

    fn history(&self, key: &StateKey) -> Result<HistoryIter<'_>, StoreError> {
        match self.keys.get(key) {
            Some(history) => Ok(Box::new(history.iter().cloned())),
            None => Ok(Box::new(std::iter::empty())),
        }
    }

    fn commit(&mut self, write_set: WriteSet) -> Result<CommitReceipt, StoreError> {
        for (key, read) in write_set.reads() {
            let current = self.version(key);
            if current != read {
                return Err(StoreError::Conflict {
                    key: key.clone(),
                    read,
                    current,
                });
            }
        }

        let tx_id = Uuid::new_v4();
        let timestamp = Utc::now();
        let writes = write_set.len();
        for (key, value) in write_set.into_writes() {
            self.keys.entry(key).or_default().push(HistoryEntry {
                tx_id,
                timestamp,
                value,
            });
        }
        debug!(%tx_id, writes, "write set committed");
        Ok(CommitReceipt {
            tx_id,
            timestamp,
            writes,
        })
    }
}
