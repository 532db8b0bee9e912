//! Filesystem-backed [`WorkFile`] and [`TempSink`] implementations.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use buyer_primitives::{ChunkRecord, Fingerprint, TempSink, WorkFile};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::chunker::chunk_boundaries;

/// A handle to a whole file living under a [`crate::CafsStore`] root,
/// content-addressed by its SHA-256 key.
#[derive(Clone)]
pub struct FsWorkFile {
    path: Arc<PathBuf>,
    key: Fingerprint,
    chunks: Arc<Vec<(u64, u64)>>,
}

impl FsWorkFile {
    pub(crate) fn new(path: PathBuf, key: Fingerprint, data: &[u8]) -> Self {
        let chunks = chunk_boundaries(data)
            .into_iter()
            .map(|(start, len)| (start as u64, len as u64))
            .collect();
        Self {
            path: Arc::new(path),
            key,
            chunks: Arc::new(chunks),
        }
    }

    /// Path to the backing file, for implementations that want direct
    /// filesystem access (e.g. the CLI).
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WorkFile for FsWorkFile {
    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(BufReader::new(File::open(&*self.path)?)))
    }

    fn key(&self) -> Fingerprint {
        self.key
    }

    fn is_chunked(&self) -> bool {
        !self.chunks.is_empty()
    }

    fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    fn chunks(&self) -> Box<dyn Iterator<Item = io::Result<ChunkRecord>> + Send> {
        let path = self.path.clone();
        let chunks = self.chunks.clone();
        Box::new((0..chunks.len()).map(move |index| {
            let (start, len) = *chunks
                .get(index)
                .expect("index drawn from chunks.len()");
            let mut file = File::open(&*path)?;
            file.seek_to(start)?;
            let mut buf = vec![0u8; len as usize];
            file.read_exact(&mut buf)?;
            Ok(ChunkRecord {
                index,
                hash: Fingerprint::digest(&buf),
                data: Bytes::from(buf),
            })
        }))
    }

    fn size(&self) -> u64 {
        self.chunks.iter().map(|&(_, len)| len).sum()
    }

    fn duplicate(&self) -> Box<dyn WorkFile> {
        Box::new(self.clone())
    }
}

trait SeekExt {
    fn seek_to(&mut self, offset: u64) -> io::Result<()>;
}

impl SeekExt for File {
    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        use std::io::{Seek, SeekFrom};
        self.seek(SeekFrom::Start(offset))?;
        Ok(())
    }
}

/// A sink for building a new content-addressed file: writes go to a
/// temporary file while a SHA-256 digest is accumulated; [`TempSink::finish`]
/// moves the temp into the store under its content key.
pub struct FsTempSink {
    file: NamedTempFile,
    hasher: Sha256,
    store_root: PathBuf,
}

impl FsTempSink {
    pub(crate) fn new(file: NamedTempFile, store_root: PathBuf) -> Self {
        Self {
            file,
            hasher: Sha256::new(),
            store_root,
        }
    }
}

impl Write for FsTempSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl TempSink for FsTempSink {
    fn finish(self: Box<Self>) -> io::Result<Box<dyn WorkFile>> {
        let FsTempSink {
            file,
            hasher,
            store_root,
        } = *self;
        let digest: [u8; 32] = hasher.finalize().into();
        let key = Fingerprint::from_bytes(digest);
        let dest = store_root.join(key.to_hex());
        let persisted = file.persist(&dest).map_err(|e| e.error)?;
        drop(persisted);
        let data = std::fs::read(&dest)?;
        Ok(Box::new(FsWorkFile::new(dest, key, &data)))
    }
}
