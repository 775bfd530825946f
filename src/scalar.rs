//! Protobuf-specific rendering of scalar kinds.
//!
//! * 64-bit integers are quoted unless `encode_64bit_as_integer` is set.
//! * Floats use `"NaN"`, `"Infinity"` and `"-Infinity"` for non-finite values.
//! * Strings are checked for valid UTF-8.
//! * Bytes accept every base64 flavour on input.

use std::sync::Arc;

use base64::prelude::*;
use prost::bytes::Bytes;
use prost_reflect::{Kind, Value};

use crate::{
    Error, InvalidUtf8, Iter, ProtoExtension, Result, Stream,
    codec::{MapEncoderConstructor, ValDecoder, ValEncoder},
    fuzzy::{FuzzyBoolDecoder, FuzzyFloatDecoder, FuzzyIntegerDecoder, FuzzyStringDecoder},
    iter::ValueType,
    quote::{quote_valid_utf8, quote_valid_utf8_html_escaped},
};

pub(crate) fn is_64bit(kind: &Kind) -> bool {
    matches!(
        kind,
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 | Kind::Uint64 | Kind::Fixed64
    )
}

fn is_integer(kind: &Kind) -> bool {
    is_64bit(kind)
        || matches!(
            kind,
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 | Kind::Uint32 | Kind::Fixed32
        )
}

impl ProtoExtension {
    pub(crate) fn decorate_scalar_encoder(
        &self,
        kind: &Kind,
        encoder: Arc<dyn ValEncoder>,
    ) -> Arc<dyn ValEncoder> {
        match kind {
            Kind::String => Arc::new(ProtoStringEncoder { elem: encoder }),
            Kind::Float | Kind::Double => Arc::new(FloatSpecialEncoder { elem: encoder }),
            kind if is_64bit(kind) && !self.options().encode_64bit_as_integer => {
                Arc::new(StringModeNumberEncoder { elem: encoder })
            }
            _ => encoder,
        }
    }

    pub(crate) fn decorate_scalar_decoder(
        &self,
        kind: &Kind,
        decoder: Arc<dyn ValDecoder>,
    ) -> Arc<dyn ValDecoder> {
        let options = self.options();
        let fuzzy = !options.disable_fuzzy_decode;
        match kind {
            Kind::Bytes => Arc::new(Base64Decoder { elem: decoder }),
            Kind::String => {
                let decoder: Arc<dyn ValDecoder> = Arc::new(ProtoStringDecoder {
                    permit_invalid_utf8: options.permit_invalid_utf8,
                    invalid_utf8: options.invalid_utf8,
                });
                if fuzzy {
                    Arc::new(FuzzyStringDecoder { elem: decoder })
                } else {
                    decoder
                }
            }
            Kind::Bool if fuzzy => Arc::new(FuzzyBoolDecoder { elem: decoder }),
            Kind::Float | Kind::Double => {
                let single = matches!(kind, Kind::Float);
                let decoder: Arc<dyn ValDecoder> = if fuzzy {
                    Arc::new(FuzzyFloatDecoder {
                        elem: decoder,
                        single,
                    })
                } else {
                    decoder
                };
                Arc::new(FloatSpecialDecoder {
                    elem: decoder,
                    single,
                })
            }
            kind if is_integer(kind) => {
                let decoder: Arc<dyn ValDecoder> = if fuzzy {
                    Arc::new(FuzzyIntegerDecoder::new(kind, decoder))
                } else {
                    decoder
                };
                if is_64bit(kind) {
                    Arc::new(StringModeNumberDecoder { elem: decoder })
                } else {
                    decoder
                }
            }
            _ => decoder,
        }
    }

    /// Quoted 64-bit values already carry their quotes; map keys of those
    /// kinds are written through the value encoder directly.
    pub(crate) fn update_map_key_encoder(&self, c: &mut MapEncoderConstructor) {
        if is_64bit(&c.key_kind) && !self.options().encode_64bit_as_integer {
            c.key_encoder = Arc::new(DynamicKeyEncoder {
                kind: c.key_kind.clone(),
            });
        }
    }
}

/// Re-encodes a map key through the engine's encoder of its kind.
struct DynamicKeyEncoder {
    kind: Kind,
}

impl ValEncoder for DynamicKeyEncoder {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
        let api = stream.api();
        api.encoder_of(&self.kind).encode(value, stream)
    }
}

struct StringModeNumberEncoder {
    elem: Arc<dyn ValEncoder>,
}

impl ValEncoder for StringModeNumberEncoder {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
        stream.write_raw(b"\"");
        self.elem.encode(value, stream)?;
        stream.write_raw(b"\"");
        Ok(())
    }

    fn is_empty(&self, value: &Value) -> bool {
        self.elem.is_empty(value)
    }
}

/// Accepts a number or a string holding one.
struct StringModeNumberDecoder {
    elem: Arc<dyn ValDecoder>,
}

impl ValDecoder for StringModeNumberDecoder {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        if iter.what_is_next() != ValueType::String {
            return self.elem.decode(value, iter);
        }
        let s = iter.read_string()?;
        // an empty string is handed over as is
        let inner: &[u8] = if s.is_empty() { b"\"\"" } else { s.as_bytes() };
        let mut sub = iter.borrow(inner);
        self.elem.decode(value, &mut sub)?;
        sub.ensure_end()
    }
}

struct FloatSpecialEncoder {
    elem: Arc<dyn ValEncoder>,
}

fn special_name(v: f64) -> Option<&'static str> {
    if v.is_nan() {
        Some("NaN")
    } else if v == f64::INFINITY {
        Some("Infinity")
    } else if v == f64::NEG_INFINITY {
        Some("-Infinity")
    } else {
        None
    }
}

impl ValEncoder for FloatSpecialEncoder {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
        let special = match value {
            Value::F32(v) => special_name(f64::from(*v)),
            Value::F64(v) => special_name(*v),
            _ => None,
        };
        match special {
            Some(name) => {
                stream.write_string(name);
                Ok(())
            }
            None => self.elem.encode(value, stream),
        }
    }

    fn is_empty(&self, value: &Value) -> bool {
        self.elem.is_empty(value)
    }
}

struct FloatSpecialDecoder {
    elem: Arc<dyn ValDecoder>,
    single: bool,
}

impl ValDecoder for FloatSpecialDecoder {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        if iter.what_is_next() != ValueType::String {
            return self.elem.decode(value, iter);
        }
        let raw = iter.skip_and_return_bytes()?;
        let special = match raw {
            b"\"NaN\"" => f64::NAN,
            b"\"Infinity\"" => f64::INFINITY,
            b"\"-Infinity\"" => f64::NEG_INFINITY,
            _ => {
                let mut sub = iter.borrow(raw);
                return self.elem.decode(value, &mut sub);
            }
        };
        *value = float_value(self.single, special);
        Ok(())
    }
}

pub(crate) fn float_value(single: bool, v: f64) -> Value {
    if single {
        Value::F32(v as f32)
    } else {
        Value::F64(v)
    }
}

struct ProtoStringEncoder {
    elem: Arc<dyn ValEncoder>,
}

impl ValEncoder for ProtoStringEncoder {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
        let Value::String(s) = value else {
            return self.elem.encode(value, stream);
        };
        let quoted = if stream.api().config().escape_html {
            quote_valid_utf8_html_escaped(s.as_bytes())
        } else {
            quote_valid_utf8(s.as_bytes())
        };
        stream.write_raw(&quoted?);
        Ok(())
    }

    fn is_empty(&self, value: &Value) -> bool {
        self.elem.is_empty(value)
    }
}

struct ProtoStringDecoder {
    permit_invalid_utf8: bool,
    invalid_utf8: InvalidUtf8,
}

impl ValDecoder for ProtoStringDecoder {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        if iter.read_nil()? {
            return Ok(());
        }
        let bytes = iter.read_string_bytes()?;
        let s = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) if self.permit_invalid_utf8 => self.invalid_utf8.render(e.as_bytes()),
            Err(_) => return Err(Error::invalid_utf8("string")),
        };
        *value = Value::String(s);
        Ok(())
    }
}

/// Base64 in any of the standard and URL-safe alphabets, padded or not.
struct Base64Decoder {
    elem: Arc<dyn ValDecoder>,
}

pub(crate) fn decode_base64(s: &str) -> Result<Vec<u8>> {
    let url_safe = s.contains(['-', '_']);
    let padded = s.len() % 4 == 0;
    let engine = match (url_safe, padded) {
        (false, true) => &BASE64_STANDARD,
        (false, false) => &BASE64_STANDARD_NO_PAD,
        (true, true) => &BASE64_URL_SAFE,
        (true, false) => &BASE64_URL_SAFE_NO_PAD,
    };
    engine.decode(s).map_err(|e| Error::format("bytes", e))
}

impl ValDecoder for Base64Decoder {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        if iter.what_is_next() != ValueType::String {
            return self.elem.decode(value, iter);
        }
        let s = iter.read_string()?;
        *value = Value::Bytes(Bytes::from(decode_base64(&s)?));
        Ok(())
    }
}
