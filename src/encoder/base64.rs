//! Base64 codec.

use base64::{engine::general_purpose::STANDARD as Base64, Engine as _};

use super::Codec;

/// Standard-alphabet Base64 over UTF-8.
///
/// Input that is not valid Base64, or that does not decode to UTF-8, is
/// returned unchanged by [`decode`](Codec::decode).
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Codec;

impl Codec for Base64Codec {
    fn encode(&self, input: &str) -> String {
        Base64.encode(input.as_bytes())
    }

    fn decode(&self, input: &str) -> String {
        Base64
            .decode(input.as_bytes())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_else(|| input.to_string())
    }
}
