//! Value-level encoder/decoder traits and the engine's default codecs.
//!
//! The defaults render a structural, un-opinionated JSON: proto field
//! names, enums as numbers, 64-bit integers as bare numbers and bytes as
//! padded standard base64. Extensions replace or decorate them.

use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
    sync::Arc,
};

use base64::prelude::*;
use prost::bytes::Bytes;
use prost_reflect::{DynamicMessage, Kind, MapKey, MessageDescriptor, ReflectMessage, Value};

use crate::{Error, Iter, Result, Stream, sort_map_keys::KeyOrder};

/// Encodes one protobuf value.
pub trait ValEncoder: Send + Sync {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()>;

    /// Whether `value` counts as empty for `omitempty` purposes.
    fn is_empty(&self, value: &Value) -> bool {
        is_zero(value)
    }
}

/// Decodes one protobuf value in place.
pub trait ValDecoder: Send + Sync {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()>;

    /// Whether JSON `null` is a regular input for this decoder. When it is
    /// not, a `null` at field level clears the field instead.
    fn accepts_null(&self) -> bool {
        false
    }
}

/// Encodes a whole message.
pub trait MessageEncoder: Send + Sync {
    fn encode_message(&self, msg: &DynamicMessage, stream: &mut Stream<'_>) -> Result<()>;
}

/// Decodes into a whole message, merging with what it already holds.
pub trait MessageDecoder: Send + Sync {
    fn decode_message(&self, msg: &mut DynamicMessage, iter: &mut Iter<'_>) -> Result<()>;
}

/// Zero check used by `omitempty`.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Bool(v) => !*v,
        Value::I32(v) => *v == 0,
        Value::I64(v) => *v == 0,
        Value::U32(v) => *v == 0,
        Value::U64(v) => *v == 0,
        Value::F32(v) => *v == 0.0,
        Value::F64(v) => *v == 0.0,
        Value::String(v) => v.is_empty(),
        Value::Bytes(v) => v.is_empty(),
        Value::EnumNumber(v) => *v == 0,
        Value::List(v) => v.is_empty(),
        Value::Map(v) => v.is_empty(),
        _ => false,
    }
}

/// Name used to cache codecs for `kind`.
pub(crate) fn kind_name(kind: &Kind) -> Cow<'_, str> {
    Cow::Borrowed(match kind {
        Kind::Double => "double",
        Kind::Float => "float",
        Kind::Int32 => "int32",
        Kind::Int64 => "int64",
        Kind::Uint32 => "uint32",
        Kind::Uint64 => "uint64",
        Kind::Sint32 => "sint32",
        Kind::Sint64 => "sint64",
        Kind::Fixed32 => "fixed32",
        Kind::Fixed64 => "fixed64",
        Kind::Sfixed32 => "sfixed32",
        Kind::Sfixed64 => "sfixed64",
        Kind::Bool => "bool",
        Kind::String => "string",
        Kind::Bytes => "bytes",
        Kind::Message(desc) => return Cow::Owned(desc.full_name().to_owned()),
        Kind::Enum(desc) => return Cow::Owned(desc.full_name().to_owned()),
    })
}

pub(crate) fn mismatch(expected: &str, value: &Value) -> Error {
    Error::Unsupported(format!("expected {expected}, found {value:?}"))
}

/// Default encoder for `kind`.
pub(crate) fn default_encoder(kind: &Kind) -> Arc<dyn ValEncoder> {
    match kind {
        Kind::Double => Arc::new(F64Codec),
        Kind::Float => Arc::new(F32Codec),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => Arc::new(I32Codec),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Arc::new(I64Codec),
        Kind::Uint32 | Kind::Fixed32 => Arc::new(U32Codec),
        Kind::Uint64 | Kind::Fixed64 => Arc::new(U64Codec),
        Kind::Bool => Arc::new(BoolCodec),
        Kind::String => Arc::new(StringCodec),
        Kind::Bytes => Arc::new(BytesCodec),
        Kind::Enum(_) => Arc::new(EnumNumberCodec),
        Kind::Message(desc) => Arc::new(MessageValueCodec { desc: desc.clone() }),
    }
}

/// Default decoder for `kind`.
pub(crate) fn default_decoder(kind: &Kind) -> Arc<dyn ValDecoder> {
    match kind {
        Kind::Double => Arc::new(F64Codec),
        Kind::Float => Arc::new(F32Codec),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => Arc::new(I32Codec),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Arc::new(I64Codec),
        Kind::Uint32 | Kind::Fixed32 => Arc::new(U32Codec),
        Kind::Uint64 | Kind::Fixed64 => Arc::new(U64Codec),
        Kind::Bool => Arc::new(BoolCodec),
        Kind::String => Arc::new(StringCodec),
        Kind::Bytes => Arc::new(BytesCodec),
        Kind::Enum(_) => Arc::new(EnumNumberCodec),
        Kind::Message(desc) => Arc::new(MessageValueCodec { desc: desc.clone() }),
    }
}

macro_rules! int_codec {
    ($name:ident, $variant:ident, $ty:ty, $write:ident, $label:literal) => {
        pub(crate) struct $name;

        impl ValEncoder for $name {
            fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
                match value {
                    Value::$variant(v) => {
                        stream.$write(*v);
                        Ok(())
                    }
                    other => Err(mismatch($label, other)),
                }
            }
        }

        impl ValDecoder for $name {
            fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
                if iter.read_nil()? {
                    return Ok(());
                }
                *value = Value::$variant(iter.read_int::<$ty>($label)?);
                Ok(())
            }
        }
    };
}

int_codec!(I32Codec, I32, i32, write_i32, "int32");
int_codec!(I64Codec, I64, i64, write_i64, "int64");
int_codec!(U32Codec, U32, u32, write_u32, "uint32");
int_codec!(U64Codec, U64, u64, write_u64, "uint64");

pub(crate) struct F32Codec;

impl ValEncoder for F32Codec {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
        match value {
            Value::F32(v) => stream.write_f32(*v),
            other => Err(mismatch("float", other)),
        }
    }
}

impl ValDecoder for F32Codec {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        if iter.read_nil()? {
            return Ok(());
        }
        let v = iter.read_f64()?;
        if v.is_finite() && v.abs() > f32::MAX as f64 {
            return Err(Error::range("float", format!("{v} exceed range")));
        }
        *value = Value::F32(v as f32);
        Ok(())
    }
}

pub(crate) struct F64Codec;

impl ValEncoder for F64Codec {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
        match value {
            Value::F64(v) => stream.write_f64(*v),
            other => Err(mismatch("double", other)),
        }
    }
}

impl ValDecoder for F64Codec {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        if iter.read_nil()? {
            return Ok(());
        }
        *value = Value::F64(iter.read_f64()?);
        Ok(())
    }
}

pub(crate) struct BoolCodec;

impl ValEncoder for BoolCodec {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
        match value {
            Value::Bool(v) => {
                stream.write_bool(*v);
                Ok(())
            }
            other => Err(mismatch("bool", other)),
        }
    }
}

impl ValDecoder for BoolCodec {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        if iter.read_nil()? {
            return Ok(());
        }
        *value = Value::Bool(iter.read_bool()?);
        Ok(())
    }
}

/// Strings are written as is; invalid UTF-8 on input is replaced.
pub(crate) struct StringCodec;

impl ValEncoder for StringCodec {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
        match value {
            Value::String(v) => {
                stream.write_string(v);
                Ok(())
            }
            other => Err(mismatch("string", other)),
        }
    }
}

impl ValDecoder for StringCodec {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        if iter.read_nil()? {
            return Ok(());
        }
        let bytes = iter.read_string_bytes()?;
        *value = Value::String(String::from_utf8_lossy(&bytes).into_owned());
        Ok(())
    }
}

pub(crate) struct BytesCodec;

impl ValEncoder for BytesCodec {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
        match value {
            Value::Bytes(v) => {
                stream.write_string(&BASE64_STANDARD.encode(v));
                Ok(())
            }
            other => Err(mismatch("bytes", other)),
        }
    }
}

impl ValDecoder for BytesCodec {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        if iter.read_nil()? {
            return Ok(());
        }
        let s = iter.read_string()?;
        let bytes = BASE64_STANDARD
            .decode(s.as_bytes())
            .map_err(|e| Error::format("bytes", e))?;
        *value = Value::Bytes(Bytes::from(bytes));
        Ok(())
    }
}

pub(crate) struct EnumNumberCodec;

impl ValEncoder for EnumNumberCodec {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
        match value {
            Value::EnumNumber(v) => {
                stream.write_i32(*v);
                Ok(())
            }
            other => Err(mismatch("enum", other)),
        }
    }
}

impl ValDecoder for EnumNumberCodec {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        if iter.read_nil()? {
            return Ok(());
        }
        *value = Value::EnumNumber(iter.read_int::<i32>("enum")?);
        Ok(())
    }
}

/// A message-typed value. The message codec is looked up when a value is
/// processed, so recursive types never recurse while codecs are built.
pub(crate) struct MessageValueCodec {
    desc: MessageDescriptor,
}

impl ValEncoder for MessageValueCodec {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
        match value {
            Value::Message(msg) => {
                let api = stream.api();
                api.message_encoder(&msg.descriptor())
                    .encode_message(msg, stream)
            }
            other => Err(mismatch(self.desc.full_name(), other)),
        }
    }

    fn is_empty(&self, _value: &Value) -> bool {
        false
    }
}

impl ValDecoder for MessageValueCodec {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        let mut msg = match std::mem::replace(value, Value::Bool(false)) {
            Value::Message(msg) => msg,
            _ => DynamicMessage::new(self.desc.clone()),
        };
        let api = iter.api();
        let result = api.message_decoder(&self.desc).decode_message(&mut msg, iter);
        *value = Value::Message(msg);
        result
    }
}

/// Repeated values.
pub(crate) struct ListEncoder {
    pub elem: Arc<dyn ValEncoder>,
}

impl ValEncoder for ListEncoder {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
        let Value::List(items) = value else {
            return Err(mismatch("list", value));
        };
        if items.is_empty() {
            stream.write_empty_array();
            return Ok(());
        }
        stream.write_array_start();
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                stream.write_more();
            }
            self.elem.encode(item, stream)?;
        }
        stream.write_array_end();
        Ok(())
    }
}

pub(crate) struct ListDecoder {
    pub kind: Kind,
    pub elem: Arc<dyn ValDecoder>,
}

impl ValDecoder for ListDecoder {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        if iter.read_nil()? {
            *value = Value::List(vec![]);
            return Ok(());
        }
        let mut items = vec![];
        iter.read_array_cb(|it| {
            let mut item = Value::default_value(&self.kind);
            self.elem.decode(&mut item, it)?;
            items.push(item);
            Ok(())
        })?;
        *value = Value::List(items);
        Ok(())
    }
}

/// Writes a non-string map key between quotes.
pub(crate) struct QuotedKeyEncoder {
    pub elem: Arc<dyn ValEncoder>,
}

impl ValEncoder for QuotedKeyEncoder {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
        stream.write_raw(b"\"");
        self.elem.encode(value, stream)?;
        stream.write_raw(b"\"");
        Ok(())
    }
}

/// Everything needed to build the encoder of a map field. Extensions may
/// swap any part of it before the encoder is built.
pub struct MapEncoderConstructor {
    pub key_kind: Kind,
    pub value_kind: Kind,
    pub key_encoder: Arc<dyn ValEncoder>,
    pub elem_encoder: Arc<dyn ValEncoder>,
    pub key_order: KeyOrder,
}

pub(crate) struct MapEncoder {
    pub key: Arc<dyn ValEncoder>,
    pub elem: Arc<dyn ValEncoder>,
    pub order: KeyOrder,
}

impl From<MapEncoderConstructor> for MapEncoder {
    fn from(c: MapEncoderConstructor) -> Self {
        Self {
            key: c.key_encoder,
            elem: c.elem_encoder,
            order: c.key_order,
        }
    }
}

impl ValEncoder for MapEncoder {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
        let Value::Map(map) = value else {
            return Err(mismatch("map", value));
        };
        if map.is_empty() {
            stream.write_empty_object();
            return Ok(());
        }
        let mut entries: Vec<(&MapKey, &Value)> = map.iter().collect();
        self.order.sort(&mut entries);
        stream.write_object_start();
        for (i, (key, item)) in entries.into_iter().enumerate() {
            if i > 0 {
                stream.write_more();
            }
            self.key.encode(&key_value(key), stream)?;
            stream.write_raw(b":");
            self.elem.encode(item, stream)?;
        }
        stream.write_object_end();
        Ok(())
    }
}

pub(crate) struct MapDecoder {
    pub key_kind: Kind,
    pub value_kind: Kind,
    pub elem: Arc<dyn ValDecoder>,
}

impl ValDecoder for MapDecoder {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        let mut map = match std::mem::replace(value, Value::Bool(false)) {
            Value::Map(map) => map,
            _ => HashMap::new(),
        };
        let mut seen = HashSet::new();
        let result = iter.read_nil().and_then(|nil| {
            if nil {
                return Ok(());
            }
            iter.read_object_cb(|it, key| {
                let map_key = parse_map_key(&key, &self.key_kind)?;
                if !seen.insert(map_key.clone()) {
                    return Err(Error::consistency("map", format!("duplicate {key:?} field")));
                }
                let mut item = Value::default_value(&self.value_kind);
                self.elem.decode(&mut item, it)?;
                map.insert(map_key, item);
                Ok(())
            })
        });
        *value = Value::Map(map);
        result
    }
}

pub(crate) fn key_value(key: &MapKey) -> Value {
    match key {
        MapKey::Bool(v) => Value::Bool(*v),
        MapKey::I32(v) => Value::I32(*v),
        MapKey::I64(v) => Value::I64(*v),
        MapKey::U32(v) => Value::U32(*v),
        MapKey::U64(v) => Value::U64(*v),
        MapKey::String(v) => Value::String(v.clone()),
    }
}

fn parse_map_key(key: &str, kind: &Kind) -> Result<MapKey> {
    fn int<T: std::str::FromStr>(key: &str, target: &str) -> Result<T> {
        key.parse()
            .map_err(|_| Error::format(target, format!("invalid map key {key:?}")))
    }
    Ok(match kind {
        Kind::Bool => match key {
            "true" => MapKey::Bool(true),
            "false" => MapKey::Bool(false),
            _ => return Err(Error::format("bool", format!("invalid map key {key:?}"))),
        },
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => MapKey::I32(int(key, "int32")?),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => MapKey::I64(int(key, "int64")?),
        Kind::Uint32 | Kind::Fixed32 => MapKey::U32(int(key, "uint32")?),
        Kind::Uint64 | Kind::Fixed64 => MapKey::U64(int(key, "uint64")?),
        Kind::String => MapKey::String(key.to_owned()),
        other => {
            return Err(Error::Unsupported(format!(
                "map key of kind {}",
                kind_name(other)
            )));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_zero() {
        assert!(is_zero(&Value::I64(0)));
        assert!(is_zero(&Value::String(String::new())));
        assert!(is_zero(&Value::EnumNumber(0)));
        assert!(!is_zero(&Value::F64(f64::NAN)));
        assert!(!is_zero(&Value::Bool(true)));
    }

    #[test]
    fn test_parse_map_key() {
        assert_eq!(parse_map_key("-3", &Kind::Int64).unwrap(), MapKey::I64(-3));
        assert_eq!(parse_map_key("false", &Kind::Bool).unwrap(), MapKey::Bool(false));
        assert!(parse_map_key("1.0", &Kind::Uint32).is_err());
        assert!(parse_map_key("yes", &Kind::Bool).is_err());
    }
}
