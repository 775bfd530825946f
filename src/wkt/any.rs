//! `google.protobuf.Any`.
//!
//! The embedded message is resolved from the type URL. Messages with a
//! special JSON form are written under a `"value"` key; every other message
//! has its fields spliced next to `"@type"`.

use std::collections::HashSet;

use prost::{
    Message,
    bytes::Bytes,
    encoding::{WireType, encode_key, encode_varint},
};
use prost_reflect::{DynamicMessage, Kind, MessageDescriptor, ReflectMessage, Value};
use tracing::debug;

use super::{ANY, field, is_well_known_type, set};
use crate::{Error, Iter, KeyOrder, ProtoOptions, Result, Stream, TypeResolver, iter::ValueType};

const TYPE_KEY: &str = "@type";
const VALUE_KEY: &str = "value";

fn resolve(options: &ProtoOptions, any: &DynamicMessage, url: &str) -> Result<MessageDescriptor> {
    let resolved = match &options.resolver {
        Some(resolver) => resolver.find_message_by_url(url),
        None => any.descriptor().parent_pool().find_message_by_url(url),
    };
    resolved.inspect_err(|e| debug!(url, error = %e, "unable to resolve Any type"))
}

pub(super) fn encode(options: &ProtoOptions, msg: &DynamicMessage, stream: &mut Stream<'_>) -> Result<()> {
    let type_url = msg.get_field(&field(msg, 1)?).as_str().unwrap_or_default().to_owned();
    let payload = msg.get_field(&field(msg, 2)?);
    let payload = payload.as_bytes().cloned().unwrap_or_default();
    if type_url.is_empty() {
        if !payload.is_empty() {
            return Err(Error::consistency(ANY, "empty type URL with non-empty value"));
        }
        stream.write_empty_object();
        return Ok(());
    }

    let desc = resolve(options, msg, &type_url)?;
    let embedded = DynamicMessage::decode(desc.clone(), payload)
        .map_err(|e| Error::format(ANY, format!("unable to decode {type_url:?}: {e}")))?;
    let api = stream.api();
    let encoder = api.message_encoder(&desc);

    stream.write_object_start();
    stream.write_object_field(TYPE_KEY);
    stream.write_string(&type_url);
    if is_well_known_type(desc.full_name()) {
        stream.write_more();
        stream.write_object_field(VALUE_KEY);
        encoder.encode_message(&embedded, stream)?;
    } else {
        let mut side = stream.borrow();
        encoder.encode_message(&embedded, &mut side)?;
        let buf = side.into_inner();
        let mut fields = Iter::new(api, &buf);
        if fields.what_is_next() != ValueType::Object {
            return Err(Error::format(desc.full_name(), "expect object"));
        }
        fields.read_object_cb(|it, key| {
            stream.write_more();
            stream.write_object_field(&key);
            stream.write_raw(it.skip_and_return_bytes()?);
            Ok(())
        })?;
    }
    stream.write_object_end();
    Ok(())
}

pub(super) fn decode(options: &ProtoOptions, msg: &mut DynamicMessage, iter: &mut Iter<'_>) -> Result<()> {
    let api = iter.api();
    let mut type_url = None;
    let mut value = None;
    let mut seen = HashSet::new();
    // every field but "@type", re-serialized as an object
    let mut rest = Stream::new(api);
    rest.write_object_start();
    let mut rest_empty = true;
    iter.read_object_cb(|it, key| {
        if !seen.insert(key.clone()) {
            return Err(Error::consistency(ANY, format!("duplicate {key:?} field")));
        }
        if key == TYPE_KEY {
            if it.what_is_next() != ValueType::String {
                return Err(Error::format(ANY, "\"@type\" field must be a string"));
            }
            type_url = Some(it.read_string()?);
            return Ok(());
        }
        let raw = it.skip_and_return_bytes()?;
        if key == VALUE_KEY {
            value = Some(raw);
        }
        if !rest_empty {
            rest.write_more();
        }
        rest_empty = false;
        rest.write_object_field(&key);
        rest.write_raw(raw);
        Ok(())
    })?;
    rest.write_object_end();

    if seen.is_empty() {
        set(msg, 1, Value::String(String::new()))?;
        return set(msg, 2, Value::Bytes(Bytes::new()));
    }
    let type_url = match type_url {
        None => return Err(Error::format(ANY, "missing \"@type\" field")),
        Some(url) if url.is_empty() => {
            return Err(Error::format(ANY, "\"@type\" field contains empty value"));
        }
        Some(url) => url,
    };

    let desc = resolve(options, msg, &type_url)?;
    let decoder = api.message_decoder(&desc);
    let mut embedded = DynamicMessage::new(desc.clone());
    if is_well_known_type(desc.full_name()) {
        let Some(raw) = value else {
            return Err(Error::format(ANY, "missing \"value\" field"));
        };
        if seen.len() > 2 {
            return Err(Error::format(
                ANY,
                format!("unexpected field next to \"value\" for {type_url:?}"),
            ));
        }
        let mut sub = iter.borrow(raw);
        decoder.decode_message(&mut embedded, &mut sub)?;
        sub.ensure_end()?;
    } else {
        let buf = rest.into_inner();
        let mut sub = iter.borrow(&buf);
        decoder.decode_message(&mut embedded, &mut sub)?;
    }

    set(msg, 1, Value::String(type_url))?;
    let mut payload = Vec::new();
    encode_deterministic(&embedded, &mut payload)?;
    set(msg, 2, Value::Bytes(Bytes::from(payload)))
}

/// Binary encoding with fields in number order and map entries sorted by key,
/// recursively through nested messages.
fn encode_deterministic(msg: &DynamicMessage, buf: &mut Vec<u8>) -> Result<()> {
    let desc = msg.descriptor();
    for (field, value) in msg.fields() {
        match (field.kind(), value) {
            (Kind::Message(entry), Value::Map(map)) => {
                let mut entries: Vec<_> = map.iter().collect();
                KeyOrder::Numeric.sort(&mut entries);
                for (key, value) in entries {
                    let mut item = DynamicMessage::new(entry.clone());
                    item.try_set_field_by_number(1, key.clone().into())
                        .and_then(|()| item.try_set_field_by_number(2, value.clone()))
                        .map_err(|e| Error::Unsupported(e.to_string()))?;
                    encode_embedded(field.number(), &item, buf)?;
                }
            }
            (Kind::Message(_), Value::Message(item)) if !field.is_group() => {
                encode_embedded(field.number(), item, buf)?;
            }
            (Kind::Message(_), Value::List(items)) if !field.is_group() => {
                for item in items.iter().filter_map(Value::as_message) {
                    encode_embedded(field.number(), item, buf)?;
                }
            }
            _ => {
                let mut single = DynamicMessage::new(desc.clone());
                single
                    .try_set_field(&field, value.clone())
                    .map_err(|e| Error::Unsupported(e.to_string()))?;
                buf.extend_from_slice(&single.encode_to_vec());
            }
        }
    }
    Ok(())
}

fn encode_embedded(number: u32, msg: &DynamicMessage, buf: &mut Vec<u8>) -> Result<()> {
    let mut inner = Vec::new();
    encode_deterministic(msg, &mut inner)?;
    encode_key(number, WireType::LengthDelimited, buf);
    encode_varint(inner.len() as u64, buf);
    buf.extend_from_slice(&inner);
    Ok(())
}
