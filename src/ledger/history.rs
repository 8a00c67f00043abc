use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::BankError,
    network::Stub,
    store::{HistoryEntry, HistoryIter},
};

/// One committed write to an account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    #[serde(rename = "txId")]
    pub tx_id: Uuid,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    /// The account record as it was stored.
    pub value: String,
}

impl From<HistoryEntry> for HistoryRecord {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            tx_id: entry.tx_id,
            timestamp: entry.timestamp,
            value: String::from_utf8_lossy(&entry.value).into_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionHistory {
    pub transactions: Vec<HistoryRecord>,
}

/// Lazily walks the committed writes of one account, oldest first.
pub struct AccountHistory<'a> {
    entries: HistoryIter<'a>,
}

impl Iterator for AccountHistory<'_> {
    type Item = HistoryRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(HistoryRecord::from)
    }
}

/// An account that was never written has an empty history.
pub fn account_history<'a>(
    stub: &Stub<'a>,
    account_number: &str,
) -> Result<AccountHistory<'a>, BankError> {
    Ok(AccountHistory {
        entries: stub.history_for_key(account_number)?,
    })
}
