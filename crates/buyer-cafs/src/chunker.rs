//! Content-defined chunking via an Adler32-style rolling hash over each
//! window of bytes. Boundaries are a pure function of content, so chunking
//! the same bytes twice always yields the same cut points.

const WINDOW: usize = 48;
const MIN_CHUNK: usize = 1024;
const MAX_CHUNK: usize = 64 * 1024;
const MASK: u32 = (1 << 13) - 1;

/// Compute `(start, length)` pairs covering the whole of `data`.
pub fn chunk_boundaries(data: &[u8]) -> Vec<(usize, usize)> {
    if data.is_empty() {
        return Vec::new();
    }

    let mut boundaries = Vec::new();
    let mut chunk_start = 0usize;
    for i in 0..data.len() {
        let chunk_len = i + 1 - chunk_start;
        let forced = chunk_len >= MAX_CHUNK;
        let eligible = chunk_len >= MIN_CHUNK && i + 1 >= WINDOW;
        let at_boundary = forced
            || (eligible
                && adler32(
                    data.get(i + 1 - WINDOW..=i)
                        .expect("window fits within data by construction"),
                ) & MASK
                    == 0);
        if at_boundary {
            boundaries.push((chunk_start, chunk_len));
            chunk_start = i + 1;
        }
    }
    if chunk_start < data.len() {
        boundaries.push((chunk_start, data.len() - chunk_start));
    }
    boundaries
}

fn adler32(bytes: &[u8]) -> u32 {
    const MOD_ADLER: u32 = 65521;
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for &byte in bytes {
        a = (a + byte as u32) % MOD_ADLER;
        b = (b + a) % MOD_ADLER;
    }
    (b << 16) | a
}
