// wal/recovery.rs
// Transaction grouper for streaming WAL recovery

use std::collections::HashMap;

use crate::error::Result;
use crate::transaction::TransactionId;

use super::entry::{WALEntry, WALEntryType};

/// A committed transaction with all its entries
#[derive(Debug)]
pub struct CommittedTransaction {
    pub id: TransactionId,
    pub entries: Vec<WALEntry>,
}

impl CommittedTransaction {
    /// Get operation entries (excluding Begin/Commit markers)
    pub fn operations(&self) -> impl Iterator<Item = &WALEntry> {
        self.entries
            .iter()
            .filter(|e| e.entry_type == WALEntryType::Operation)
    }

    /// Get index change entries
    pub fn index_changes(&self) -> impl Iterator<Item = &WALEntry> {
        self.entries
            .iter()
            .filter(|e| e.entry_type == WALEntryType::IndexChange)
    }

    /// Count of operation entries
    pub fn operation_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.entry_type == WALEntryType::Operation)
            .count()
    }

    /// Count of index change entries
    pub fn index_change_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.entry_type == WALEntryType::IndexChange)
            .count()
    }
}

/// Streaming transaction grouper
///
/// Aggregates WAL entries into committed transactions.
/// Memory usage: O(active transactions) instead of O(all entries)
///
/// Example:
/// ```ignore
/// let iter = WALEntryIterator::new(reader)?;
/// let grouper = TransactionGrouper::new(iter);
///
/// for tx_result in grouper {
///     let tx = tx_result?;
///     // Process committed transaction
/// }
/// ```
pub struct TransactionGrouper<I: Iterator<Item = Result<WALEntry>>> {
    source: I,
    active: HashMap<TransactionId, Vec<WALEntry>>,
}

impl<I: Iterator<Item = Result<WALEntry>>> TransactionGrouper<I> {
    /// Create a new transaction grouper from a WAL entry iterator
    pub fn new(source: I) -> Self {
        Self {
            source,
            active: HashMap::new(),
        }
    }

    /// Get the number of currently active (uncommitted) transactions
    pub fn active_transaction_count(&self) -> usize {
        self.active.len()
    }
}

impl<I: Iterator<Item = Result<WALEntry>>> Iterator for TransactionGrouper<I> {
    type Item = Result<CommittedTransaction>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.source.next()? {
                Ok(entry) => match entry.entry_type {
                    WALEntryType::Begin => {
                        // Start tracking new transaction
                        self.active.entry(entry.transaction_id).or_default();
                    }
                    WALEntryType::Operation | WALEntryType::IndexChange => {
                        // Add to active transaction
                        if let Some(tx) = self.active.get_mut(&entry.transaction_id) {
                            tx.push(entry);
                        }
                        // If transaction not tracked, entry is orphaned - ignore
                    }
                    WALEntryType::Commit => {
                        // Transaction committed - yield it
                        if let Some(entries) = self.active.remove(&entry.transaction_id) {
                            return Some(Ok(CommittedTransaction {
                                id: entry.transaction_id,
                                entries,
                            }));
                        }
                        // If not found, orphaned commit - ignore
                    }
                    WALEntryType::Abort => {
                        // Transaction aborted - discard
                        self.active.remove(&entry.transaction_id);
                    }
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
