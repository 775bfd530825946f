//! `google.protobuf.Value`, `Struct` and `ListValue` as free-form JSON.

use std::collections::HashMap;

use prost_reflect::{DynamicMessage, Kind, MapKey, MessageDescriptor, ReflectMessage, Value};

use super::{LIST_VALUE, STRUCT, VALUE, field, set};
use crate::{Error, Iter, ProtoOptions, Result, Stream, iter::ValueType};

const NULL_VALUE: u32 = 1;
const NUMBER_VALUE: u32 = 2;
const STRING_VALUE: u32 = 3;
const BOOL_VALUE: u32 = 4;
const STRUCT_VALUE: u32 = 5;
const LIST_VALUE_FIELD: u32 = 6;

pub(super) fn encode_value(
    options: &ProtoOptions,
    msg: &DynamicMessage,
    stream: &mut Stream<'_>,
) -> Result<()> {
    let desc = msg.descriptor();
    let Some(active) = desc.fields().find(|f| msg.has_field(f)) else {
        return Err(Error::consistency(VALUE, "none of the oneof fields is set"));
    };
    let value = msg.get_field(&active);
    match (active.number(), &*value) {
        (NULL_VALUE, _) => stream.write_nil(),
        (NUMBER_VALUE, Value::F64(v)) => {
            if !v.is_finite() {
                return Err(Error::format(VALUE, format!("invalid {v} value")));
            }
            stream.write_f64(*v)?;
        }
        (STRING_VALUE, Value::String(_)) => {
            let api = stream.api();
            api.encoder_of(&Kind::String).encode(&value, stream)?;
        }
        (BOOL_VALUE, Value::Bool(v)) => stream.write_bool(*v),
        (STRUCT_VALUE, Value::Message(m)) => encode_struct(options, m, stream)?,
        (LIST_VALUE_FIELD, Value::Message(m)) => encode_list(options, m, stream)?,
        (_, other) => {
            return Err(Error::Unsupported(format!("{VALUE} holding {other:?}")));
        }
    }
    Ok(())
}

pub(super) fn encode_struct(
    options: &ProtoOptions,
    msg: &DynamicMessage,
    stream: &mut Stream<'_>,
) -> Result<()> {
    let fields = msg.get_field(&field(msg, 1)?);
    let Some(map) = fields.as_map().filter(|m| !m.is_empty()) else {
        stream.write_empty_object();
        return Ok(());
    };
    let mut entries: Vec<(&str, &Value)> = map
        .iter()
        .filter_map(|(k, v)| match k {
            MapKey::String(k) => Some((k.as_str(), v)),
            _ => None,
        })
        .collect();
    if stream.api().config().sort_map_keys {
        entries.sort_by(|a, b| a.0.cmp(b.0));
    }
    stream.write_object_start();
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            stream.write_more();
        }
        stream.write_object_field(key);
        let Value::Message(value) = value else {
            return Err(Error::Unsupported(format!("{STRUCT} holding {value:?}")));
        };
        encode_value(options, value, stream).map_err(|e| e.in_field(key))?;
    }
    stream.write_object_end();
    Ok(())
}

pub(super) fn encode_list(
    options: &ProtoOptions,
    msg: &DynamicMessage,
    stream: &mut Stream<'_>,
) -> Result<()> {
    let values = msg.get_field(&field(msg, 1)?);
    let items = values.as_list().unwrap_or_default();
    if items.is_empty() {
        stream.write_empty_array();
        return Ok(());
    }
    stream.write_array_start();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            stream.write_more();
        }
        let Value::Message(item) = item else {
            return Err(Error::Unsupported(format!("{LIST_VALUE} holding {item:?}")));
        };
        encode_value(options, item, stream)?;
    }
    stream.write_array_end();
    Ok(())
}

fn message_kind(msg: &DynamicMessage, number: u32) -> Result<MessageDescriptor> {
    let field = field(msg, number)?;
    let kind = match field.kind() {
        Kind::Message(entry) if field.is_map() => entry.map_entry_value_field().kind(),
        kind => kind,
    };
    match kind {
        Kind::Message(desc) => Ok(desc),
        _ => Err(Error::Unsupported(format!(
            "{}: field {number} is not a message",
            msg.descriptor().full_name()
        ))),
    }
}

pub(super) fn decode_value(
    options: &ProtoOptions,
    msg: &mut DynamicMessage,
    iter: &mut Iter<'_>,
) -> Result<()> {
    match iter.what_is_next() {
        ValueType::Nil => {
            iter.skip()?;
            set(msg, NULL_VALUE, Value::EnumNumber(0))
        }
        ValueType::Bool => {
            let v = iter.read_bool()?;
            set(msg, BOOL_VALUE, Value::Bool(v))
        }
        ValueType::Number => {
            let v = iter.read_f64()?;
            set(msg, NUMBER_VALUE, Value::F64(v))
        }
        ValueType::String => {
            let mut v = Value::String(String::new());
            let api = iter.api();
            api.decoder_of(&Kind::String).decode(&mut v, iter)?;
            set(msg, STRING_VALUE, v)
        }
        ValueType::Object => {
            let mut nested = DynamicMessage::new(message_kind(msg, STRUCT_VALUE)?);
            decode_struct(options, &mut nested, iter)?;
            set(msg, STRUCT_VALUE, Value::Message(nested))
        }
        ValueType::Array => {
            let mut nested = DynamicMessage::new(message_kind(msg, LIST_VALUE_FIELD)?);
            decode_list(options, &mut nested, iter)?;
            set(msg, LIST_VALUE_FIELD, Value::Message(nested))
        }
        ValueType::Invalid => Err(Error::format(VALUE, "invalid value")),
    }
}

pub(super) fn decode_struct(
    options: &ProtoOptions,
    msg: &mut DynamicMessage,
    iter: &mut Iter<'_>,
) -> Result<()> {
    if iter.what_is_next() != ValueType::Object {
        return Err(Error::format(STRUCT, "expect object"));
    }
    let value_desc = message_kind(msg, 1)?;
    let mut map = HashMap::new();
    iter.read_object_cb(|it, key| {
        let map_key = MapKey::String(key.clone());
        if map.contains_key(&map_key) {
            return Err(Error::consistency(STRUCT, format!("duplicate {key:?} field")));
        }
        let mut value = DynamicMessage::new(value_desc.clone());
        decode_value(options, &mut value, it).map_err(|e| e.in_field(&key))?;
        map.insert(map_key, Value::Message(value));
        Ok(())
    })?;
    set(msg, 1, Value::Map(map))
}

pub(super) fn decode_list(
    options: &ProtoOptions,
    msg: &mut DynamicMessage,
    iter: &mut Iter<'_>,
) -> Result<()> {
    if iter.what_is_next() != ValueType::Array {
        return Err(Error::format(LIST_VALUE, "expect array"));
    }
    let value_desc = message_kind(msg, 1)?;
    let mut items = vec![];
    iter.read_array_cb(|it| {
        let mut value = DynamicMessage::new(value_desc.clone());
        decode_value(options, &mut value, it)?;
        items.push(Value::Message(value));
        Ok(())
    })?;
    set(msg, 1, Value::List(items))
}
