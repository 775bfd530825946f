//! JSON string quoting.

use crate::{Error, Result};

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Quote `s` as a JSON string literal, rejecting invalid UTF-8.
///
/// Control characters are written with their short escapes where JSON has
/// one (`\b`, `\f`, `\n`, `\r`, `\t`) and as `\u00XX` otherwise.
pub fn quote_valid_utf8(s: &[u8]) -> Result<Vec<u8>> {
    quote_bytes(s, false)
}

/// Like [`quote_valid_utf8`], additionally escaping `<`, `>`, `&`, U+2028
/// and U+2029 so the output can be embedded in HTML.
pub fn quote_valid_utf8_html_escaped(s: &[u8]) -> Result<Vec<u8>> {
    quote_bytes(s, true)
}

fn quote_bytes(s: &[u8], escape_html: bool) -> Result<Vec<u8>> {
    let s = simdutf8::basic::from_utf8(s).map_err(|_| Error::invalid_utf8("string"))?;
    let mut buf = Vec::with_capacity(s.len() + 2);
    append_quoted(&mut buf, s, escape_html);
    Ok(buf)
}

#[inline]
fn is_safe(b: u8, escape_html: bool) -> bool {
    match b {
        b'"' | b'\\' => false,
        b'<' | b'>' | b'&' => !escape_html,
        0x20..=0x7f => true,
        _ => false,
    }
}

/// Append `s` to `buf` as a quoted JSON string.
pub(crate) fn append_quoted(buf: &mut Vec<u8>, s: &str, escape_html: bool) {
    let bytes = s.as_bytes();
    buf.push(b'"');
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b < 0x80 {
            if is_safe(b, escape_html) {
                i += 1;
                continue;
            }
            buf.extend_from_slice(&bytes[start..i]);
            match b {
                b'"' | b'\\' => buf.extend_from_slice(&[b'\\', b]),
                b'\x08' => buf.extend_from_slice(b"\\b"),
                b'\x0c' => buf.extend_from_slice(b"\\f"),
                b'\n' => buf.extend_from_slice(b"\\n"),
                b'\r' => buf.extend_from_slice(b"\\r"),
                b'\t' => buf.extend_from_slice(b"\\t"),
                _ => buf.extend_from_slice(&[
                    b'\\',
                    b'u',
                    b'0',
                    b'0',
                    HEX[(b >> 4) as usize],
                    HEX[(b & 0xf) as usize],
                ]),
            }
            i += 1;
            start = i;
            continue;
        }
        // U+2028 and U+2029 are E2 80 A8 / E2 80 A9
        if escape_html
            && bytes[i..].starts_with(&[0xe2, 0x80])
            && matches!(bytes.get(i + 2), Some(0xa8 | 0xa9))
        {
            buf.extend_from_slice(&bytes[start..i]);
            buf.extend_from_slice(b"\\u202");
            buf.push(HEX[(bytes[i + 2] & 0xf) as usize]);
            i += 3;
            start = i;
            continue;
        }
        i += 1;
    }
    buf.extend_from_slice(&bytes[start..]);
    buf.push(b'"');
}
