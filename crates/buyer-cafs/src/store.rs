//! A minimal content-addressable file store rooted at a directory: blobs
//! are named by the hex SHA-256 of their content, so identical content
//! always maps to the same path and is only ever stored once.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use buyer_primitives::{Cafs, Fingerprint, TempSink, WorkFile};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::workfile::{FsTempSink, FsWorkFile};

/// A content-addressable store rooted at a directory on disk.
pub struct CafsStore {
    root: PathBuf,
}

impl CafsStore {
    /// Open (creating if necessary) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Import raw bytes, returning a handle keyed by their SHA-256 digest.
    /// Importing the same bytes twice is a no-op the second time: both
    /// calls return handles with the same key.
    pub fn import_bytes(&self, data: &[u8]) -> io::Result<Box<dyn WorkFile>> {
        let digest: [u8; 32] = Sha256::digest(data).into();
        let key = Fingerprint::from_bytes(digest);
        let dest = self.root.join(key.to_hex());
        if !dest.exists() {
            let mut tmp = NamedTempFile::new_in(&self.root)?;
            use std::io::Write;
            tmp.write_all(data)?;
            tmp.persist(&dest).map_err(|e| e.error)?;
        }
        Ok(Box::new(FsWorkFile::new(dest, key, data)))
    }

    /// Import a file from the local filesystem by copying its contents in.
    pub fn import_file(&self, path: &Path) -> io::Result<Box<dyn WorkFile>> {
        let data = fs::read(path)?;
        self.import_bytes(&data)
    }

    /// Open a handle to previously-stored content by its key, if present.
    pub fn open_by_key(&self, key: Fingerprint) -> io::Result<Option<Box<dyn WorkFile>>> {
        let path = self.root.join(key.to_hex());
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)?;
        Ok(Some(Box::new(FsWorkFile::new(path, key, &data))))
    }

    /// Create a new temp sink for writing content whose key is not yet
    /// known (e.g. a decrypted result).
    pub fn create_temp(&self) -> io::Result<Box<dyn TempSink>> {
        let file = NamedTempFile::new_in(&self.root)?;
        Ok(Box::new(FsTempSink::new(file, self.root.clone())))
    }
}

impl Cafs for CafsStore {
    fn create_temp(&self) -> io::Result<Box<dyn TempSink>> {
        CafsStore::create_temp(self)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn import_bytes_is_idempotent_by_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = CafsStore::open(dir.path()).unwrap();

        let a = store.import_bytes(b"hello world").unwrap();
        let b = store.import_bytes(b"hello world").unwrap();
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn temp_sink_finish_produces_content_addressed_handle() {
        let dir = tempfile::tempdir().unwrap();
        let store = CafsStore::open(dir.path()).unwrap();

        let mut sink = store.create_temp().unwrap();
        use std::io::Write;
        sink.write_all(b"decrypted result bytes").unwrap();
        let handle = sink.finish().unwrap();

        assert_eq!(handle.key(), Fingerprint::digest(b"decrypted result bytes"));
        let mut out = Vec::new();
        handle.open().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"decrypted result bytes");
    }

    #[test]
    fn chunked_work_file_reassembles_to_original_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = CafsStore::open(dir.path()).unwrap();
        let original: Vec<u8> = (0..500_000u32).map(|i| (i % 241) as u8).collect();

        let handle = store.import_bytes(&original).unwrap();
        assert!(handle.is_chunked());
        assert!(handle.num_chunks() > 1);

        let mut reassembled = Vec::new();
        for chunk in handle.chunks() {
            reassembled.extend_from_slice(&chunk.unwrap().data);
        }
        assert_eq!(reassembled, original);
    }
}
