//! The wishlist bit stream: one bit per chunk, MSB-first, `1` meaning "send
//! this chunk".

/// Pack a per-chunk want list into the MSB-first wishlist byte stream. The
/// output is exactly `ceil(wanted.len() / 8)` bytes.
pub fn pack(wanted: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; wanted.len().div_ceil(8)];
    for (i, &want) in wanted.iter().enumerate() {
        if want {
            let byte = i / 8;
            let bit = 7 - (i % 8);
            if let Some(slot) = out.get_mut(byte) {
                *slot |= 1 << bit;
            }
        }
    }
    out
}

/// Unpack a wishlist byte stream into `num_chunks` booleans. Tolerates
/// header/body version skew: a short stream is padded with "not wanted",
/// a long one has its extra bits ignored.
pub fn unpack(bytes: &[u8], num_chunks: usize) -> Vec<bool> {
    (0..num_chunks)
        .map(|i| {
            let byte = i / 8;
            let bit = 7 - (i % 8);
            bytes
                .get(byte)
                .map(|b| (b >> bit) & 1 == 1)
                .unwrap_or(false)
        })
        .collect()
}
