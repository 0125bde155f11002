// storage/io.rs
// Low-level I/O operations for storage engine

use std::io::{Read, Write, Seek, SeekFrom};
use crate::error::Result;
use super::StorageEngine;

impl StorageEngine {
    /// Write data to the end of the document region.
    /// Returns the offset where data was written.
    pub fn write_data(&mut self, data: &[u8]) -> Result<u64> {
        let offset = self.seek_to_document_region_end()?;

        // Méret + adat írása
        let len = (data.len() as u32).to_le_bytes();
        self.file.write_all(&len)?;
        self.file.write_all(data)?;

        if self.header.version >= 2 {
            // The write above just overwrote whatever catalog bytes used to
            // follow the document region; the next flush_metadata rewrites
            // them past the new end of data.
            self.header.metadata_offset = 0;
        }

        Ok(offset)
    }

    /// Seek to, and return, the offset where the next document/raw write
    /// should land: past the reserved metadata region for version 1 files,
    /// or at the current end of document data (pre-metadata) for version 2.
    fn seek_to_document_region_end(&mut self) -> Result<u64> {
        let file_end = self.file.seek(SeekFrom::End(0))?;
        let write_pos = if self.header.version >= 2 {
            if self.header.metadata_offset > 0 {
                self.header.metadata_offset
            } else {
                file_end
            }
        } else {
            std::cmp::max(file_end, super::DATA_START_OFFSET)
        };
        Ok(self.file.seek(SeekFrom::Start(write_pos))?)
    }

    /// Read data from specified offset
    pub fn read_data(&mut self, offset: u64) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(offset))?;

        // Méret olvasása
        let mut len_bytes = [0u8; 4];
        self.file.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as usize;

        // Adat olvasása
        let mut data = vec![0u8; len];
        self.file.read_exact(&mut data)?;

        Ok(data)
    }

    /// Get file length
    pub fn file_len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Write document and update catalog
    /// This is the new persistent write method that tracks document offsets
    /// Stores ABSOLUTE offsets in catalog for simplicity and correctness
    pub fn write_document(
        &mut self,
        collection: &str,
        doc_id: &crate::document::DocumentId,
        data: &[u8]
    ) -> Result<u64> {
        use crate::error::MongoLiteError;

        let absolute_offset = self.seek_to_document_region_end()?;

        // Write length + data (same format as write_data)
        let len = (data.len() as u32).to_le_bytes();
        self.file.write_all(&len)?;
        self.file.write_all(data)?;

        if self.header.version >= 2 {
            self.header.metadata_offset = 0;
        }

        // Update catalog in metadata with ABSOLUTE offset
        let meta = self.get_collection_meta_mut(collection)
            .ok_or_else(|| MongoLiteError::CollectionNotFound(collection.to_string()))?;

        meta.document_catalog.insert(doc_id.clone(), absolute_offset);

        Ok(absolute_offset)
    }

    /// Read document by offset (catalog-based retrieval)
    /// Takes an ABSOLUTE offset directly from catalog
    pub fn read_document_at(&mut self, _collection: &str, absolute_offset: u64) -> Result<Vec<u8>> {
        self.read_data(absolute_offset)
    }
}
