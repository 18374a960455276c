use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{KvStore, StorageError};

const MAGIC: &[u8; 4] = b"PLH1"; // ASCII magic
const VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1;
const CHECKSUM_LEN: usize = 4;

/// Store persisted to a single snapshot file.
///
/// Layout: 4-byte magic, 1-byte version, postcard-encoded map, CRC32C (LE) of
/// all preceding bytes. Every write rewrites the snapshot through a sibling
/// temp file and a rename, so a crash leaves either the old or the new file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    map: BTreeMap<String, String>,
}

impl FileStore {
    /// Open `path`, starting empty if it does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let map = if path.exists() { decode_snapshot(&fs::read(&path)?)? } else { BTreeMap::new() };
        Ok(Self { path, map })
    }

    pub fn path(&self) -> &Path { &self.path }

    fn flush(&self) -> Result<(), StorageError> {
        let bytes = encode_snapshot(&self.map)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        let previous = self.map.insert(key.to_string(), value);
        if let Err(e) = self.flush() {
            // Keep memory in step with disk.
            match previous {
                Some(old) => self.map.insert(key.to_string(), old),
                None => self.map.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        let Some(previous) = self.map.remove(key) else { return Ok(()) };
        if let Err(e) = self.flush() {
            self.map.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.map.keys().cloned().collect())
    }
}

fn encode_snapshot(map: &BTreeMap<String, String>) -> Result<Vec<u8>, StorageError> {
    let payload = postcard::to_allocvec(map)?;
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + CHECKSUM_LEN);
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.extend_from_slice(&payload);
    let checksum = crc32c::crc32c(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    Ok(buf)
}

fn decode_snapshot(bytes: &[u8]) -> Result<BTreeMap<String, String>, StorageError> {
    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(StorageError::Malformed);
    }
    // Validate checksum first to avoid decoding garbage
    let (content, trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let file_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if file_crc != crc32c::crc32c(content) {
        return Err(StorageError::Checksum);
    }
    if &content[..4] != MAGIC || content[4] != VERSION {
        return Err(StorageError::MagicOrVersion);
    }
    Ok(postcard::from_bytes(&content[HEADER_LEN..])?)
}
