//! Input side of the engine: a cursor over a JSON document.
//!
//! The cursor handles object and array punctuation itself and hands every
//! value it needs to lex to `serde_json`, which validates number grammar,
//! decodes string escapes and skips nested values.

use std::{num::IntErrorKind, str::FromStr};

use serde::de::{self, IgnoredAny, Visitor};

use crate::{Api, Error, Result};

/// Deepest object/array nesting accepted by decoders.
pub const MAX_DEPTH: usize = 1000;

/// Kind of the next JSON token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// End of input or a byte that cannot start a value.
    Invalid,
    String,
    Number,
    Nil,
    Bool,
    Array,
    Object,
}

/// A JSON cursor bound to the [`Api`] that drives it.
pub struct Iter<'a> {
    api: &'a Api,
    buf: &'a [u8],
    head: usize,
    depth: usize,
}

impl<'a> Iter<'a> {
    pub fn new(api: &'a Api, buf: &'a [u8]) -> Self {
        Self {
            api,
            buf,
            head: 0,
            depth: 0,
        }
    }

    /// The engine this cursor belongs to.
    pub fn api(&self) -> &'a Api {
        self.api
    }

    /// A cursor over an isolated byte range, sharing the engine and the
    /// current nesting depth. Errors raised by the sub-cursor never touch
    /// this one.
    pub fn borrow<'b>(&self, buf: &'b [u8]) -> Iter<'b>
    where
        'a: 'b,
    {
        Iter {
            api: self.api,
            buf,
            head: 0,
            depth: self.depth,
        }
    }

    /// Current byte offset into the input.
    pub fn offset(&self) -> usize {
        self.head
    }

    fn error(&self, message: impl std::fmt::Display) -> Error {
        Error::syntax(self.head, message)
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.buf.get(self.head) {
            self.head += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.buf.get(self.head).copied()
    }

    fn expect(&mut self, b: u8) -> Result<()> {
        if self.peek() != Some(b) {
            return Err(self.error(format!("expect {:?}", b as char)));
        }
        self.head += 1;
        Ok(())
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("exceeded max depth"));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn what_is_next(&mut self) -> ValueType {
        match self.peek() {
            Some(b'"') => ValueType::String,
            Some(b'-' | b'0'..=b'9') => ValueType::Number,
            Some(b'n') => ValueType::Nil,
            Some(b't' | b'f') => ValueType::Bool,
            Some(b'[') => ValueType::Array,
            Some(b'{') => ValueType::Object,
            _ => ValueType::Invalid,
        }
    }

    /// Skip the next value and return its raw bytes.
    pub fn skip_and_return_bytes(&mut self) -> Result<&'a [u8]> {
        self.skip_whitespace();
        let rest = &self.buf[self.head..];
        let mut values = serde_json::Deserializer::from_slice(rest).into_iter::<IgnoredAny>();
        match values.next() {
            Some(Ok(_)) => {
                let end = values.byte_offset();
                self.head += end;
                Ok(&rest[..end])
            }
            Some(Err(err)) => Err(self.error(err)),
            None => Err(self.error("unexpected end of input")),
        }
    }

    pub fn skip(&mut self) -> Result<()> {
        self.skip_and_return_bytes().map(|_| ())
    }

    /// Consume a `null` token if one is next.
    pub fn read_nil(&mut self) -> Result<bool> {
        if self.what_is_next() != ValueType::Nil {
            return Ok(false);
        }
        self.skip()?;
        Ok(true)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        if self.what_is_next() != ValueType::Bool {
            return Err(self.error("expect true or false"));
        }
        match self.skip_and_return_bytes()? {
            b"true" => Ok(true),
            _ => Ok(false),
        }
    }

    /// Read a string token and return its unescaped bytes without any UTF-8
    /// validation.
    pub fn read_string_bytes(&mut self) -> Result<Vec<u8>> {
        if self.what_is_next() != ValueType::String {
            return Err(self.error("expect string"));
        }
        let raw = self.skip_and_return_bytes()?;
        let mut de = serde_json::Deserializer::from_slice(raw);
        de::Deserializer::deserialize_bytes(&mut de, BytesVisitor).map_err(|e| self.error(e))
    }

    /// Read a string token, rejecting invalid UTF-8.
    pub fn read_string(&mut self) -> Result<String> {
        String::from_utf8(self.read_string_bytes()?).map_err(|_| Error::invalid_utf8("string"))
    }

    /// Read a number token and return its literal text.
    pub fn read_number(&mut self) -> Result<&'a str> {
        if self.what_is_next() != ValueType::Number {
            return Err(self.error("invalid number"));
        }
        let raw = self.skip_and_return_bytes()?;
        std::str::from_utf8(raw).map_err(|_| self.error("invalid number"))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let lit = self.read_number()?;
        lit.parse()
            .map_err(|_| Error::format("double", format!("invalid number {lit}")))
    }

    /// Read an integer literal of type `T`; fractions and exponents are
    /// rejected.
    pub fn read_int<T>(&mut self, target: &str) -> Result<T>
    where
        T: FromStr<Err = std::num::ParseIntError>,
    {
        let lit = self.read_number()?;
        lit.parse().map_err(|e: std::num::ParseIntError| match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                Error::range(target, format!("{lit} exceed range"))
            }
            _ => Error::format(target, format!("invalid number {lit}")),
        })
    }

    /// Read an object, calling `f` with each key. `f` must consume the value.
    pub fn read_object_cb<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Self, String) -> Result<()>,
    {
        self.expect(b'{')?;
        self.enter()?;
        if self.peek() == Some(b'}') {
            self.head += 1;
            self.depth -= 1;
            return Ok(());
        }
        loop {
            if self.what_is_next() != ValueType::String {
                return Err(self.error("expect string as object key"));
            }
            let key = self.read_string()?;
            self.expect(b':')?;
            f(self, key)?;
            match self.peek() {
                Some(b',') => self.head += 1,
                Some(b'}') => {
                    self.head += 1;
                    break;
                }
                _ => return Err(self.error("expect , or }")),
            }
        }
        self.depth -= 1;
        Ok(())
    }

    /// Read an array, calling `f` once per element. `f` must consume it.
    pub fn read_array_cb<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Self) -> Result<()>,
    {
        self.expect(b'[')?;
        self.enter()?;
        if self.peek() == Some(b']') {
            self.head += 1;
            self.depth -= 1;
            return Ok(());
        }
        loop {
            f(self)?;
            match self.peek() {
                Some(b',') => self.head += 1,
                Some(b']') => {
                    self.head += 1;
                    break;
                }
                _ => return Err(self.error("expect , or ]")),
            }
        }
        self.depth -= 1;
        Ok(())
    }

    /// Fail unless only whitespace remains.
    pub fn ensure_end(&mut self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.error("trailing characters after value")),
        }
    }
}

struct BytesVisitor;

impl<'de> Visitor<'de> for BytesVisitor {
    type Value = Vec<u8>;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("a JSON string")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(v.to_vec())
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(v)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(v.as_bytes().to_vec())
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(v.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    #[test]
    fn test_tokens() {
        let api = Config::default().froze();
        let mut iter = Iter::new(&api, r#" {"a" : [1, -2.5e3, "xé"], "b":null, "c":true} "#.as_bytes());
        let mut seen = vec![];
        iter.read_object_cb(|it, key| {
            match key.as_str() {
                "a" => it.read_array_cb(|it| {
                    match it.what_is_next() {
                        ValueType::Number => seen.push(it.read_number()?.to_string()),
                        ValueType::String => seen.push(it.read_string()?),
                        other => panic!("unexpected {other:?}"),
                    }
                    Ok(())
                })?,
                "b" => assert!(it.read_nil()?),
                "c" => assert!(it.read_bool()?),
                _ => unreachable!(),
            }
            Ok(())
        })
        .unwrap();
        iter.ensure_end().unwrap();
        assert_eq!(seen, ["1", "-2.5e3", "xé"]);
    }

    #[test]
    fn test_skip_and_return_bytes() {
        let api = Config::default().froze();
        let mut iter = Iter::new(&api, br#"  {"k": [1, {"x": "}"}]} , 12"#);
        assert_eq!(
            iter.skip_and_return_bytes().unwrap(),
            br#"{"k": [1, {"x": "}"}]}"#
        );
        assert!(iter.ensure_end().is_err());
    }

    #[test]
    fn test_read_int() {
        let api = Config::default().froze();
        assert_eq!(Iter::new(&api, b"-12").read_int::<i32>("int32").unwrap(), -12);
        assert!(matches!(
            Iter::new(&api, b"4294967296").read_int::<u32>("uint32"),
            Err(Error::Range { .. })
        ));
        assert!(matches!(
            Iter::new(&api, b"1.5").read_int::<i64>("int64"),
            Err(Error::Format { .. })
        ));
        assert!(Iter::new(&api, b"\"1\"").read_int::<i64>("int64").is_err());
    }

    #[test]
    fn test_invalid_utf8() {
        let api = Config::default().froze();
        let mut iter = Iter::new(&api, b"\"abc\xff\"");
        assert!(matches!(iter.read_string(), Err(Error::InvalidUtf8 { .. })));
        let mut iter = Iter::new(&api, b"\"abc\xff\"");
        assert_eq!(iter.read_string_bytes().unwrap(), b"abc\xff");
    }

    #[test]
    fn test_max_depth() {
        let api = Config::default().froze();
        let doc = "[".repeat(MAX_DEPTH + 1);
        fn nest(it: &mut Iter<'_>) -> Result<()> {
            it.read_array_cb(nest)
        }
        assert!(nest(&mut Iter::new(&api, doc.as_bytes())).is_err());
    }
}
