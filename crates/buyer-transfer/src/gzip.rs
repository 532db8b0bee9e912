//! Gzip helpers for the two places a transfer body may be compressed: a
//! small in-memory wishlist request, and the large streamed chunk-body push
//! that must flush periodically so the seller isn't left waiting on a full
//! buffer.

use std::io::{self, Write};

use flate2::write::GzEncoder;
use flate2::Compression;

/// Compress `data` as a single gzip member. Used for bodies small enough to
/// build fully in memory (the wishlist request).
pub fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Wraps a [`Write`] so every call to [`Write::write`] is immediately
/// followed by a flush. Layered over a [`GzEncoder`], this turns every write
/// into a `Z_SYNC_FLUSH`: pending compressed bytes reach the underlying pipe
/// (and thus the network) without waiting for the deflate buffer to fill,
/// which is what lets the seller start reassembling chunks as they arrive
/// instead of only after the whole upload completes.
pub struct FlushEveryWrite<W: Write> {
    pub inner: W,
}

impl<W: Write> Write for FlushEveryWrite<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.inner.flush()?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    #[test]
    fn compress_round_trips() {
        let data = b"some work bytes, repeated ".repeat(100);
        let compressed = compress(&data).unwrap();
        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn sync_flushes_are_still_a_valid_stream() {
        // Every call to `write` triggers a `Z_SYNC_FLUSH`, one per input
        // chunk here; the final `finish()` must still produce a gzip stream
        // a plain decoder can read start to end.
        let mut buf = Vec::new();
        {
            let mut writer = FlushEveryWrite {
                inner: GzEncoder::new(&mut buf, Compression::default()),
            };
            writer.write_all(b"frame-one").unwrap();
            writer.write_all(b"frame-two").unwrap();
            writer.inner.try_finish().unwrap();
        }
        let mut decoder = GzDecoder::new(buf.as_slice());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"frame-oneframe-two");
    }
}
