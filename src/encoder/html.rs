//! HTML, HTML-attribute and XML entity codecs.

use std::fmt::Write as _;

use super::Codec;

/// Named entities recognised when decoding HTML.
const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
    ("iexcl", '¡'),
    ("cent", '¢'),
    ("pound", '£'),
    ("yen", '¥'),
    ("sect", '§'),
    ("copy", '©'),
    ("laquo", '«'),
    ("not", '¬'),
    ("shy", '\u{ad}'),
    ("reg", '®'),
    ("deg", '°'),
    ("plusmn", '±'),
    ("micro", 'µ'),
    ("para", '¶'),
    ("middot", '·'),
    ("raquo", '»'),
    ("iquest", '¿'),
    ("times", '×'),
    ("divide", '÷'),
    ("ndash", '–'),
    ("mdash", '—'),
    ("lsquo", '‘'),
    ("rsquo", '’'),
    ("ldquo", '“'),
    ("rdquo", '”'),
    ("hellip", '…'),
    ("euro", '€'),
    ("trade", '™'),
];

/// Entities recognised by the XML codec.
const XML_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
];

/// Longest entity body accepted between `&` and `;`.
const MAX_ENTITY_LEN: usize = 10;

/// Escapes markup characters for HTML element content.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlCodec;

impl Codec for HtmlCodec {
    fn encode(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
                c => push_numeric(&mut out, c),
            }
        }
        out
    }

    fn decode(&self, input: &str) -> String {
        decode_entities(input, NAMED_ENTITIES)
    }
}

/// Escapes everything except alphanumerics for use in attribute values.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlAttributeCodec;

impl Codec for HtmlAttributeCodec {
    fn encode(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                c if c.is_ascii_alphanumeric() || matches!(c, ',' | '.' | '-' | '_') => out.push(c),
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                c => push_numeric(&mut out, c),
            }
        }
        out
    }

    fn decode(&self, input: &str) -> String {
        decode_entities(input, NAMED_ENTITIES)
    }
}

/// XML 1.0 predefined-entity codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCodec;

impl Codec for XmlCodec {
    fn encode(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&apos;"),
                c if c.is_control() && !matches!(c, '\t' | '\n' | '\r') => {
                    push_numeric(&mut out, c)
                }
                c => out.push(c),
            }
        }
        out
    }

    fn decode(&self, input: &str) -> String {
        decode_entities(input, XML_ENTITIES)
    }
}

fn push_numeric(out: &mut String, c: char) {
    let _ = write!(out, "&#{};", u32::from(c));
}

/// Decodes one level of `&name;`, `&#N;` and `&#xH;` references.
///
/// Unknown names, malformed references and references to invalid code points
/// are copied through unchanged.
fn decode_entities(input: &str, named: &[(&str, char)]) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match parse_reference(tail, named) {
            Some((c, consumed)) => {
                out.push(c);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parses a reference at the start of `tail` (which begins with `&`).
/// Returns the decoded character and the number of bytes consumed.
fn parse_reference(tail: &str, named: &[(&str, char)]) -> Option<(char, usize)> {
    let body_end = tail[1..]
        .char_indices()
        .take(MAX_ENTITY_LEN + 1)
        .find(|&(_, c)| c == ';')
        .map(|(i, _)| i + 1)?;
    let body = &tail[1..body_end];
    let consumed = body_end + 1;

    if let Some(number) = body.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(|c| (c, consumed));
    }

    named
        .iter()
        .find(|(name, _)| *name == body)
        .map(|&(_, c)| (c, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_encode_escapes_markup() {
        assert_eq!(
            HtmlCodec.encode("<a href=\"x\">it's</a>"),
            "&lt;a href=&quot;x&quot;&gt;it&#39;s&lt;/a&gt;"
        );
        assert_eq!(HtmlCodec.encode("café"), "caf&#233;");
    }

    #[test]
    fn html_decode_named_and_numeric() {
        assert_eq!(HtmlCodec.decode("&lt;script&gt;"), "<script>");
        assert_eq!(HtmlCodec.decode("&#60;&#x3C;&#X3c;"), "<<<");
        assert_eq!(HtmlCodec.decode("caf&#233; &copy;"), "café ©");
    }

    #[test]
    fn html_decode_is_single_level() {
        assert_eq!(HtmlCodec.decode("&amp;lt;"), "&lt;");
    }

    #[test]
    fn malformed_references_pass_through() {
        assert_eq!(HtmlCodec.decode("AT&T"), "AT&T");
        assert_eq!(HtmlCodec.decode("&bogus;"), "&bogus;");
        assert_eq!(HtmlCodec.decode("&#xZZ;"), "&#xZZ;");
        assert_eq!(HtmlCodec.decode("&#xD800;"), "&#xD800;");
        assert_eq!(HtmlCodec.decode("&lt"), "&lt");
        assert_eq!(HtmlCodec.decode("&"), "&");
    }

    #[test]
    fn attribute_codec_escapes_spaces() {
        assert_eq!(HtmlAttributeCodec.encode("a b"), "a&#32;b");
        assert_eq!(HtmlAttributeCodec.decode("a&#32;b"), "a b");
    }

    #[test]
    fn xml_codec_only_knows_predefined_entities() {
        assert_eq!(XmlCodec.encode("'<&>'"), "&apos;&lt;&amp;&gt;&apos;");
        assert_eq!(XmlCodec.decode("&copy;&amp;"), "&copy;&");
    }
}
