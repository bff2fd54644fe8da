//! JavaScript and VBScript string codecs.

use std::fmt::Write as _;

use super::Codec;

fn is_script_immune(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ',' | '.' | '_')
}

/// Backslash escaping for JavaScript string literals.
///
/// Characters below U+0100 are written as `\xHH`, others as `\uHHHH`
/// (surrogate pairs above the BMP).
#[derive(Debug, Clone, Copy, Default)]
pub struct JavaScriptCodec;

impl Codec for JavaScriptCodec {
    fn encode(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len() * 2);
        for c in input.chars() {
            if is_script_immune(c) {
                out.push(c);
            } else if u32::from(c) < 0x100 {
                let _ = write!(out, "\\x{:02X}", u32::from(c));
            } else {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04X}", unit);
                }
            }
        }
        out
    }

    fn decode(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(pos) = rest.find('\\') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos + 1..];
            match decode_escape(tail) {
                Some((c, consumed)) => {
                    out.push(c);
                    rest = &tail[consumed..];
                }
                None => {
                    out.push('\\');
                    rest = tail;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn hex_value(digits: &str) -> Option<u32> {
    if digits.chars().all(|c| c.is_ascii_hexdigit()) {
        u32::from_str_radix(digits, 16).ok()
    } else {
        None
    }
}

/// Decodes the escape following a backslash. Returns the character and the
/// number of bytes of `tail` consumed.
fn decode_escape(tail: &str) -> Option<(char, usize)> {
    let first = tail.chars().next()?;
    match first {
        'x' => {
            let code = hex_value(tail.get(1..3)?)?;
            char::from_u32(code).map(|c| (c, 3))
        }
        'u' => {
            let unit = hex_value(tail.get(1..5)?)?;
            if (0xD800..0xDC00).contains(&unit) {
                let low = tail
                    .get(5..7)
                    .filter(|marker| *marker == "\\u")
                    .and_then(|_| tail.get(7..11))
                    .and_then(hex_value)
                    .filter(|low| (0xDC00..0xE000).contains(low))?;
                let code = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                char::from_u32(code).map(|c| (c, 11))
            } else {
                char::from_u32(unit).map(|c| (c, 5))
            }
        }
        'b' => Some(('\u{8}', 1)),
        'f' => Some(('\u{c}', 1)),
        'n' => Some(('\n', 1)),
        'r' => Some(('\r', 1)),
        't' => Some(('\t', 1)),
        'v' => Some(('\u{b}', 1)),
        '0' => Some(('\0', 1)),
        c => Some((c, c.len_utf8())),
    }
}

/// VBScript string-expression codec.
///
/// Runs of safe characters become quoted literals and every other character
/// becomes `chrw(N)`, joined with `&`: `a<b` encodes to `"a"&chrw(60)&"b"`.
/// Decoding accepts only input made entirely of that grammar and returns
/// anything else unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct VbScriptCodec;

impl Codec for VbScriptCodec {
    fn encode(&self, input: &str) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut literal = String::new();
        for c in input.chars() {
            if is_script_immune(c) {
                literal.push(c);
                continue;
            }
            if !literal.is_empty() {
                parts.push(format!("\"{}\"", std::mem::take(&mut literal)));
            }
            parts.push(format!("chrw({})", u32::from(c)));
        }
        if !literal.is_empty() {
            parts.push(format!("\"{literal}\""));
        }
        parts.join("&")
    }

    fn decode(&self, input: &str) -> String {
        parse_vbscript(input).unwrap_or_else(|| input.to_string())
    }
}

fn parse_vbscript(input: &str) -> Option<String> {
    if input.is_empty() {
        return None;
    }
    let mut out = String::new();
    for (index, term) in split_terms(input)?.into_iter().enumerate() {
        if index > 0 && term.is_empty() {
            return None;
        }
        if let Some(quoted) = term.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
            if quoted.contains('"') {
                return None;
            }
            out.push_str(quoted);
        } else {
            let digits = term.strip_prefix("chrw(")?.strip_suffix(')')?;
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            out.push(char::from_u32(digits.parse().ok()?)?);
        }
    }
    Some(out)
}

/// Splits on `&` outside quoted literals.
fn split_terms(input: &str) -> Option<Vec<&str>> {
    let mut terms = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (i, c) in input.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '&' if !quoted => {
                terms.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quoted {
        return None;
    }
    terms.push(&input[start..]);
    Some(terms)
}
