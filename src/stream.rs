//! Output side of the engine: an append-only JSON writer.

use crate::{Api, Error, Result, quote::append_quoted};

/// A JSON writer bound to the [`Api`] that drives it.
///
/// Separators are the caller's job: write [`Stream::write_more`] between
/// members, the way the encoders in this crate do.
pub struct Stream<'a> {
    api: &'a Api,
    buf: Vec<u8>,
}

impl<'a> Stream<'a> {
    pub fn new(api: &'a Api) -> Self {
        Self {
            api,
            buf: Vec::with_capacity(64),
        }
    }

    /// The engine this stream belongs to.
    pub fn api(&self) -> &'a Api {
        self.api
    }

    /// A fresh stream sharing this stream's engine, used to render a value
    /// into a side buffer.
    pub fn borrow(&self) -> Stream<'a> {
        Stream::new(self.api)
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_raw(&mut self, raw: &[u8]) {
        self.buf.extend_from_slice(raw);
    }

    pub fn write_nil(&mut self) {
        self.buf.extend_from_slice(b"null");
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf
            .extend_from_slice(if v { b"true".as_slice() } else { b"false" });
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(v.to_string().as_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(v.to_string().as_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(v.to_string().as_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(v.to_string().as_bytes());
    }

    /// Write a finite float. NaN and infinities are rejected.
    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        if !v.is_finite() {
            return Err(Error::Unsupported(v.to_string()));
        }
        self.buf.extend_from_slice(format_float(v as f64, 32).as_bytes());
        Ok(())
    }

    /// Write a finite double. NaN and infinities are rejected.
    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        if !v.is_finite() {
            return Err(Error::Unsupported(v.to_string()));
        }
        self.buf.extend_from_slice(format_float(v, 64).as_bytes());
        Ok(())
    }

    /// Write a quoted string, escaping HTML characters when the engine is
    /// configured to.
    pub fn write_string(&mut self, s: &str) {
        append_quoted(&mut self.buf, s, self.api.config().escape_html);
    }

    pub fn write_object_start(&mut self) {
        self.buf.push(b'{');
    }

    /// Write `"name":`.
    pub fn write_object_field(&mut self, name: &str) {
        self.write_string(name);
        self.buf.push(b':');
    }

    pub fn write_object_end(&mut self) {
        self.buf.push(b'}');
    }

    pub fn write_array_start(&mut self) {
        self.buf.push(b'[');
    }

    pub fn write_array_end(&mut self) {
        self.buf.push(b']');
    }

    pub fn write_more(&mut self) {
        self.buf.push(b',');
    }

    pub fn write_empty_object(&mut self) {
        self.buf.extend_from_slice(b"{}");
    }

    pub fn write_empty_array(&mut self) {
        self.buf.extend_from_slice(b"[]");
    }
}

/// Shortest round-trip rendering of a float, switching to exponent form
/// below 1e-6 and from 1e21 upwards.
pub(crate) fn format_float(v: f64, bits: u32) -> String {
    let exponent = if bits == 32 {
        let abs = (v as f32).abs();
        abs != 0.0 && !(1e-6..1e21).contains(&abs)
    } else {
        let abs = v.abs();
        abs != 0.0 && !(1e-6..1e21).contains(&abs)
    };
    let s = match (bits, exponent) {
        (32, false) => format!("{}", v as f32),
        (32, true) => format!("{:e}", v as f32),
        (_, false) => format!("{v}"),
        (_, true) => format!("{v:e}"),
    };
    if !exponent {
        return s;
    }
    // 1e21 -> 1e+21
    match s.find('e') {
        Some(pos) if s.as_bytes().get(pos + 1) != Some(&b'-') => {
            format!("{}e+{}", &s[..pos], &s[pos + 1..])
        }
        _ => s,
    }
}
