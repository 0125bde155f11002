// wal/writer.rs
// Write-Ahead Log file manager

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::transaction::TransactionId;

use super::entry::{WALEntry, WALEntryType};
use super::reader::WALEntryIterator;

/// Write-Ahead Log file manager
///
/// Handles appending entries and managing the WAL file lifecycle.
pub struct WriteAheadLog {
    file: File,
    path: PathBuf,
}

impl WriteAheadLog {
    /// Open or create a WAL file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        Ok(WriteAheadLog { file, path })
    }

    /// Get the path to this WAL file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry to the WAL
    pub fn append(&mut self, entry: &WALEntry) -> Result<u64> {
        let serialized = entry.serialize();
        let offset = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&serialized)?;
        Ok(offset)
    }

    /// Flush WAL to disk (fsync)
    pub fn flush(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Recover transactions from WAL using streaming iterator
    ///
    /// Returns grouped transactions (only committed ones).
    /// This method uses the new streaming approach but returns the same
    /// format as the old method for backwards compatibility.
    pub fn recover(&mut self) -> Result<Vec<Vec<WALEntry>>> {
        use std::collections::HashMap;
        use std::io::BufReader;

        // Reopen file for reading
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let iter = WALEntryIterator::new(reader)?;

        // Group entries by transaction ID
        let mut txs: HashMap<TransactionId, Vec<WALEntry>> = HashMap::new();

        for entry_result in iter {
            let entry = entry_result?;
            txs.entry(entry.transaction_id).or_default().push(entry);
        }

        // Filter to committed transactions only
        let mut committed = Vec::new();
        for (_tx_id, tx_entries) in txs {
            // Check if last entry is COMMIT
            if let Some(last) = tx_entries.last() {
                if last.entry_type == WALEntryType::Commit {
                    committed.push(tx_entries);
                }
            }
            // Else: uncommitted or aborted transaction, discard
        }

        Ok(committed)
    }

    /// Clear WAL file (after successful recovery)
    pub fn clear(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.sync_all()?; // Ensure truncation is persisted to disk
        Ok(())
    }

    /// Checkpoint: remove committed transactions from WAL
    ///
    /// Rewrites the WAL file keeping only uncommitted transactions.
    pub fn checkpoint(&mut self, committed_tx_ids: &[TransactionId]) -> Result<()> {
        use std::io::BufReader;

        // Read all entries using streaming iterator
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let iter = WALEntryIterator::new(reader)?;

        let mut all_entries = Vec::new();
        for entry_result in iter {
            all_entries.push(entry_result?);
        }

        // Keep only uncommitted transactions
        let active_entries: Vec<_> = all_entries
            .into_iter()
            .filter(|e| !committed_tx_ids.contains(&e.transaction_id))
            .collect();

        // Rewrite WAL file atomically
        let temp_path = self.path.with_extension("wal.tmp");
        let mut temp_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;

        for entry in active_entries {
            temp_file.write_all(&entry.serialize())?;
        }
        temp_file.sync_all()?;
        drop(temp_file);

        // Atomic rename
        std::fs::rename(&temp_path, &self.path)?;

        // Reopen file
        self.file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)?;

        Ok(())
    }
}
