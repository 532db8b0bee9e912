//! Body framing: `{length: uvarint}{bytes}` per chunk, emitted in permuted
//! order and restricted to wishlist-selected chunks.

use std::io::{self, Read, Write};

use buyer_primitives::WorkFile;
use unsigned_varint::encode as varint_encode;
use unsigned_varint::io::read_u64 as varint_read;

use crate::error::ChunkCodecError;

/// Encode the selected chunk bodies of `work` into `sink`, in the order
/// given by `order` (a permutation of `0..num_chunks`), skipping any index
/// whose `wanted` bit is false. `progress`, if given, is invoked with
/// `(bytes_total, bytes_sent)` after each chunk is written.
pub fn encode_into(
    work: &dyn WorkFile,
    order: &[usize],
    wanted: &[bool],
    sink: &mut dyn Write,
    mut progress: Option<&mut dyn FnMut(u64, u64)>,
) -> Result<(), ChunkCodecError> {
    let records = work
        .chunks()
        .collect::<io::Result<Vec<_>>>()
        .map_err(ChunkCodecError::Io)?;

    let bytes_total: u64 = order
        .iter()
        .filter(|&&i| wanted.get(i).copied().unwrap_or(false))
        .filter_map(|&i| records.get(i))
        .map(|r| r.data.len() as u64)
        .sum();

    let mut bytes_sent = 0u64;
    let mut len_buf = varint_encode::u64_buffer();
    for &i in order {
        if !wanted.get(i).copied().unwrap_or(false) {
            continue;
        }
        let record = records
            .get(i)
            .ok_or_else(|| ChunkCodecError::MalformedLength(format!("no chunk at index {i}")))?;
        sink.write_all(varint_encode::u64(record.data.len() as u64, &mut len_buf))?;
        sink.write_all(&record.data)?;
        bytes_sent += record.data.len() as u64;
        if let Some(cb) = progress.as_deref_mut() {
            cb(bytes_total, bytes_sent);
        }
    }
    Ok(())
}

/// Decode a chunk body stream produced by [`encode_into`]: reads exactly
/// one `{length}{bytes}` frame per wanted index in `order`, in order, and
/// returns each frame tagged with the original (natural) chunk index.
pub fn decode_into<R: Read>(
    mut source: R,
    order: &[usize],
    wanted: &[bool],
) -> Result<Vec<(usize, Vec<u8>)>, ChunkCodecError> {
    let expected: Vec<usize> = order
        .iter()
        .copied()
        .filter(|&i| wanted.get(i).copied().unwrap_or(false))
        .collect();

    let mut out = Vec::with_capacity(expected.len());
    for index in expected {
        let length = varint_read(&mut source)
            .map_err(|e| ChunkCodecError::MalformedLength(e.to_string()))?;
        let mut buf = vec![0u8; length as usize];
        source.read_exact(&mut buf)?;
        out.push((index, buf));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use buyer_primitives::{ChunkRecord, Fingerprint};
    use bytes::Bytes;

    use super::*;

    struct FakeWorkFile {
        chunks: Vec<ChunkRecord>,
    }

    impl WorkFile for FakeWorkFile {
        fn open(&self) -> io::Result<Box<dyn Read + Send>> {
            let mut all = Vec::new();
            for c in &self.chunks {
                all.extend_from_slice(&c.data);
            }
            Ok(Box::new(Cursor::new(all)))
        }

        fn key(&self) -> Fingerprint {
            Fingerprint::digest(b"fake")
        }

        fn is_chunked(&self) -> bool {
            true
        }

        fn num_chunks(&self) -> usize {
            self.chunks.len()
        }

        fn chunks(&self) -> Box<dyn Iterator<Item = io::Result<ChunkRecord>> + Send> {
            Box::new(self.chunks.clone().into_iter().map(Ok))
        }

        fn size(&self) -> u64 {
            self.chunks.iter().map(|c| c.data.len() as u64).sum()
        }

        fn duplicate(&self) -> Box<dyn WorkFile> {
            Box::new(FakeWorkFile {
                chunks: self.chunks.clone(),
            })
        }
    }

    fn make_chunk(index: usize, content: &[u8]) -> ChunkRecord {
        ChunkRecord {
            index,
            hash: Fingerprint::digest(content),
            data: Bytes::copy_from_slice(content),
        }
    }

    #[test]
    fn encode_then_decode_recovers_wanted_chunks_in_order() {
        let work = FakeWorkFile {
            chunks: vec![
                make_chunk(0, b"chunk-zero"),
                make_chunk(1, b"chunk-one"),
                make_chunk(2, b"chunk-two"),
                make_chunk(3, b"chunk-three"),
            ],
        };
        let order = vec![3, 1, 2, 0];
        let wanted = vec![true, false, true, true];

        let mut buf = Vec::new();
        encode_into(&work, &order, &wanted, &mut buf, None).unwrap();

        let decoded = decode_into(Cursor::new(&buf), &order, &wanted).unwrap();
        let indices: Vec<usize> = decoded.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![3, 2, 0]);
        assert_eq!(decoded[0].1, b"chunk-three");
        assert_eq!(decoded[1].1, b"chunk-two");
        assert_eq!(decoded[2].1, b"chunk-zero");
    }

    #[test]
    fn progress_callback_reaches_total() {
        let work = FakeWorkFile {
            chunks: vec![make_chunk(0, b"abc"), make_chunk(1, b"de")],
        };
        let order = vec![0, 1];
        let wanted = vec![true, true];
        let mut buf = Vec::new();
        let seen = Arc::new(std::sync::Mutex::new((0u64, 0u64)));
        let seen_cb = seen.clone();
        let mut cb = move |total, sent| {
            *seen_cb.lock().unwrap() = (total, sent);
        };
        encode_into(&work, &order, &wanted, &mut buf, Some(&mut cb)).unwrap();
        let (total, sent) = *seen.lock().unwrap();
        assert_eq!(total, 5);
        assert_eq!(sent, 5);
    }
}
