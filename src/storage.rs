//! Raw page file underneath the persistence adapter.
//!
//! Handles direct disk I/O for individual pages. Each page read is one seek
//! and one read; there is no bulk loading. Page 0 is reserved for the file
//! header, every other page holds exactly one checksummed node.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::{MAGIC, PAGE_SIZE, VERSION};
use crate::error::{StorageError, StorageResult};

/// Unique identifier of a directory node's page on disk.
pub type PageId = u64;

/// File header stored in page 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
    pub page_size: u32,
    pub root_page: PageId,
    pub next_page_id: PageId,
    pub entry_count: u64,
    pub height: u32,
    pub max_node_size: u32,
    pub min_node_size: u32,
}

impl FileHeader {
    pub fn new(max_node_size: u32, min_node_size: u32) -> Self {
        FileHeader {
            magic: MAGIC,
            version: VERSION,
            page_size: PAGE_SIZE as u32,
            root_page: 0,
            next_page_id: 1,
            entry_count: 0,
            height: 0,
            max_node_size,
            min_node_size,
        }
    }

    pub fn validate(&self) -> StorageResult<()> {
        if self.magic != MAGIC {
            return Err(StorageError::Corrupted(
                "invalid file format (bad magic)".into(),
            ));
        }
        if self.version != VERSION {
            return Err(StorageError::Corrupted(format!(
                "unsupported file format version {}",
                self.version
            )));
        }
        if self.page_size != PAGE_SIZE as u32 {
            return Err(StorageError::Corrupted(format!(
                "unexpected page size {}",
                self.page_size
            )));
        }
        if self.min_node_size < 1 || self.max_node_size < 2 * self.min_node_size - 1 {
            return Err(StorageError::Corrupted(format!(
                "inconsistent fanout limits {}/{}",
                self.min_node_size, self.max_node_size
            )));
        }
        Ok(())
    }
}

/// A page payload wrapped with a CRC32 checksum for corruption detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageWithChecksum<N> {
    checksum: u32,
    node: N,
}

impl<N: Serialize> PageWithChecksum<N> {
    pub fn new(node: N) -> StorageResult<Self> {
        let checksum = Self::checksum_of(&node)?;
        Ok(PageWithChecksum { checksum, node })
    }

    fn checksum_of(node: &N) -> StorageResult<u32> {
        let bytes = bincode::serde::encode_to_vec(node, bincode::config::legacy())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(crc32(&bytes))
    }

    /// Verify the checksum and unwrap the payload.
    pub fn into_node(self) -> StorageResult<N> {
        let expected = Self::checksum_of(&self.node)?;
        if self.checksum != expected {
            return Err(StorageError::Corrupted(format!(
                "page checksum mismatch (expected {:x}, got {:x})",
                expected, self.checksum
            )));
        }
        Ok(self.node)
    }
}

/// CRC32-MPEG2
fn crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFFFFFF;
    const POLY: u32 = 0x04C11DB7;

    for &byte in data {
        crc ^= (byte as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x80000000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
    }

    crc ^ 0xFFFFFFFF
}

/// Reads and writes individual pages of the backing file.
///
/// The storage owns the file handle; it is the only path to durable state.
pub struct Storage {
    file: File,
    #[allow(dead_code)]
    path: PathBuf,
    page_size: usize,
}

impl Storage {
    /// Create a new storage file, truncating anything already there.
    pub fn create(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Storage {
            file,
            path: path.to_path_buf(),
            page_size: PAGE_SIZE,
        })
    }

    /// Open an existing storage file.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        Ok(Storage {
            file,
            path: path.to_path_buf(),
            page_size: PAGE_SIZE,
        })
    }

    pub fn read_header(&mut self) -> StorageResult<FileHeader> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut buffer = vec![0u8; self.page_size];
        self.file.read_exact(&mut buffer)?;
        bincode::serde::decode_from_slice(&buffer, bincode::config::legacy())
            .map(|(header, _)| header)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    pub fn write_header(&mut self, header: &FileHeader) -> StorageResult<()> {
        let bytes = bincode::serde::encode_to_vec(header, bincode::config::legacy())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let mut padded = bytes;
        padded.resize(self.page_size, 0);

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&padded)?;
        Ok(())
    }

    /// Read a single node page (one seek, one read) and verify its checksum.
    pub fn read_page<N>(&mut self, page_id: PageId) -> StorageResult<N>
    where
        N: Serialize + DeserializeOwned,
    {
        if page_id == 0 {
            return Err(StorageError::Corrupted(
                "cannot read page 0 (reserved for header)".into(),
            ));
        }

        let offset = page_id * self.page_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; self.page_size];
        self.file.read_exact(&mut buffer)?;

        let page: PageWithChecksum<N> =
            bincode::serde::decode_from_slice(&buffer, bincode::config::legacy())
                .map(|(page, _)| page)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;

        page.into_node()
    }

    /// Write a single node page with checksum, padded to the page size.
    pub fn write_page<N>(&mut self, page_id: PageId, node: &N) -> StorageResult<()>
    where
        N: Serialize + Clone,
    {
        if page_id == 0 {
            return Err(StorageError::Corrupted(
                "cannot write page 0 (reserved for header)".into(),
            ));
        }

        let page = PageWithChecksum::new(node.clone())?;
        let bytes = bincode::serde::encode_to_vec(&page, bincode::config::legacy())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        if bytes.len() > self.page_size {
            return Err(StorageError::PageOverflow(bytes.len(), self.page_size));
        }

        let mut padded = bytes;
        padded.resize(self.page_size, 0);

        let offset = page_id * self.page_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&padded)?;
        Ok(())
    }

    /// Sync file contents to disk.
    pub fn sync(&mut self) -> StorageResult<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
