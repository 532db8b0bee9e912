//! Minimal hand-rolled `multipart/form-data` framing.
//!
//! The seller worker API only ever needs a handful of named fields, one of
//! which (`chunkdata`) is a multi-megabyte stream produced concurrently with
//! the request being sent. `reqwest::multipart::Form` buffers and drives its
//! own framing, which leaves no seam to gzip the whole body as it is
//! produced; writing the (tiny) framing ourselves keeps the streamed and
//! buffered request paths built the same way.

use rand::Rng;

/// A fresh random boundary string, astronomically unlikely to collide with
/// any byte sequence in the parts it separates.
pub fn new_boundary() -> String {
    let mut rng = rand::thread_rng();
    let suffix: u128 = rng.gen();
    format!("buyer-transfer-{suffix:032x}")
}

/// The `--boundary\r\nContent-Disposition: ...\r\n\r\n` preamble for a text
/// field.
pub fn field_header(boundary: &str, name: &str) -> Vec<u8> {
    format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n").into_bytes()
}

/// The `\r\n` that must follow every field's value.
pub fn field_trailer() -> &'static [u8] {
    b"\r\n"
}

/// The final `--boundary--\r\n` that terminates the body.
pub fn closing(boundary: &str) -> Vec<u8> {
    format!("--{boundary}--\r\n").into_bytes()
}

/// Content-Type header value for a form using `boundary`.
pub fn content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={boundary}")
}

/// Build a small, fully in-memory multipart body from `fields` (name, raw
/// value pairs), in order.
pub fn encode_fields(boundary: &str, fields: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend(field_header(boundary, name));
        body.extend_from_slice(value);
        body.extend(field_trailer());
    }
    body.extend(closing(boundary));
    body
}
