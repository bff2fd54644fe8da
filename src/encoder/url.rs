//! Percent encoding.

use super::Codec;

/// `application/x-www-form-urlencoded` style percent codec.
///
/// Decoding turns `+` into a space and replaces byte sequences that are not
/// valid UTF-8 with U+FFFD.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlCodec;

impl Codec for UrlCodec {
    fn encode(&self, input: &str) -> String {
        urlencoding::encode(input).into_owned()
    }

    fn decode(&self, input: &str) -> String {
        if !input.contains(['%', '+']) {
            return input.to_string();
        }
        let spaced = input.replace('+', " ");
        let bytes = urlencoding::decode_binary(spaced.as_bytes());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_escapes_reserved_characters() {
        assert_eq!(UrlCodec.encode("a b&c=d"), "a%20b%26c%3Dd");
    }

    #[test]
    fn decode_percent_and_plus() {
        assert_eq!(UrlCodec.decode("%26lt%3Bscript%26gt%3B"), "&lt;script&gt;");
        assert_eq!(UrlCodec.decode("a+b%20c"), "a b c");
    }

    #[test]
    fn incomplete_escapes_are_kept() {
        assert_eq!(UrlCodec.decode("100%"), "100%");
        assert_eq!(UrlCodec.decode("%zz"), "%zz");
    }

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(UrlCodec.decode("plain"), "plain");
    }
}
