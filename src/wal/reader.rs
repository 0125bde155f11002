// wal/reader.rs
// Streaming WAL reader with iterator pattern

use std::io::{Read, Seek, SeekFrom};

use crate::error::{MongoLiteError, Result};

use super::entry::{WALEntry, WALEntryType, MAX_WAL_ENTRY_SIZE, WAL_HEADER_SIZE};

/// Streaming iterator for reading WAL entries
///
/// This iterator reads entries one at a time from the underlying reader,
/// avoiding buffering the entire WAL file in memory.
///
/// Memory usage: O(single entry) instead of O(entire WAL)
pub struct WALEntryIterator<R: Read + Seek> {
    reader: R,
    eof_reached: bool,
}

impl<R: Read + Seek> WALEntryIterator<R> {
    /// Create a new streaming WAL iterator
    pub fn new(mut reader: R) -> Result<Self> {
        // Seek to start
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader,
            eof_reached: false,
        })
    }

    /// Read the next entry from the WAL
    fn read_next(&mut self) -> Result<Option<WALEntry>> {
        // Read header: 8 (tx_id) + 1 (type) + 4 (len) = 13 bytes
        let mut header = [0u8; WAL_HEADER_SIZE];
        match self.reader.read_exact(&mut header) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // End of file - no more entries
                return Ok(None);
            }
            Err(e) => return Err(MongoLiteError::IoFailure(e)),
        }

        let tx_id = u64::from_le_bytes(header[0..8].try_into().unwrap());
        let entry_type = WALEntryType::from_u8(header[8])?;
        let data_len = u32::from_le_bytes(header[9..13].try_into().unwrap()) as usize;

        // SECURITY: Prevent OOM from malformed WAL with huge data_len
        if data_len > MAX_WAL_ENTRY_SIZE {
            return Err(MongoLiteError::CorruptFormat(format!(
                "WAL entry length {} exceeds maximum {}",
                data_len, MAX_WAL_ENTRY_SIZE
            )));
        }

        // Read data
        let mut data = vec![0u8; data_len];
        self.reader.read_exact(&mut data)?;

        // Read checksum
        let mut checksum_bytes = [0u8; 4];
        self.reader.read_exact(&mut checksum_bytes)?;
        let checksum = u32::from_le_bytes(checksum_bytes);

        let entry = WALEntry {
            transaction_id: tx_id,
            entry_type,
            data,
            checksum,
        };

        // Verify checksum
        if entry.compute_checksum() != checksum {
            return Err(MongoLiteError::CorruptFormat(format!(
                "checksum mismatch in WAL entry for transaction {}",
                tx_id
            )));
        }

        Ok(Some(entry))
    }
}

impl<R: Read + Seek> Iterator for WALEntryIterator<R> {
    type Item = Result<WALEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.eof_reached {
            return None;
        }

        match self.read_next() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.eof_reached = true;
                None
            }
            Err(e) => Some(Err(e)),
        }
    }
}
