//! Codecs of the well-known types.

mod any;
mod duration;
mod fieldmask;
mod timestamp;
mod value;
mod wrappers;

use prost_reflect::{DynamicMessage, FieldDescriptor, ReflectMessage, Value};

use crate::{CodecRegistry, Error, Result, binding::set_field, registry::ProtoCodec};

pub use duration::{format_duration, parse_duration};
pub use fieldmask::{json_camel_case, json_snake_case};
pub use timestamp::{format_timestamp, parse_timestamp};

pub const ANY: &str = "google.protobuf.Any";
pub const TIMESTAMP: &str = "google.protobuf.Timestamp";
pub const DURATION: &str = "google.protobuf.Duration";
pub const FIELD_MASK: &str = "google.protobuf.FieldMask";
pub const EMPTY: &str = "google.protobuf.Empty";
pub const STRUCT: &str = "google.protobuf.Struct";
pub const LIST_VALUE: &str = "google.protobuf.ListValue";
pub const VALUE: &str = "google.protobuf.Value";
pub const NULL_VALUE: &str = "google.protobuf.NullValue";

const WRAPPERS: [&str; 9] = [
    "google.protobuf.DoubleValue",
    "google.protobuf.FloatValue",
    "google.protobuf.Int64Value",
    "google.protobuf.UInt64Value",
    "google.protobuf.Int32Value",
    "google.protobuf.UInt32Value",
    "google.protobuf.BoolValue",
    "google.protobuf.StringValue",
    "google.protobuf.BytesValue",
];

/// Whether `full_name` is a well-known type with a special JSON form.
/// `google.protobuf.Empty` counts, although it is written as a regular
/// message.
pub fn is_well_known_type(full_name: &str) -> bool {
    matches!(
        full_name,
        ANY | TIMESTAMP | DURATION | FIELD_MASK | EMPTY | STRUCT | LIST_VALUE | VALUE
    ) || WRAPPERS.contains(&full_name)
}

pub(crate) fn well_known_codecs() -> CodecRegistry {
    let mut registry = CodecRegistry::new()
        .with(
            ANY,
            ProtoCodec {
                encode: any::encode,
                decode: any::decode,
            },
        )
        .with(
            TIMESTAMP,
            ProtoCodec {
                encode: timestamp::encode,
                decode: timestamp::decode,
            },
        )
        .with(
            DURATION,
            ProtoCodec {
                encode: duration::encode,
                decode: duration::decode,
            },
        )
        .with(
            FIELD_MASK,
            ProtoCodec {
                encode: fieldmask::encode,
                decode: fieldmask::decode,
            },
        )
        .with(
            STRUCT,
            ProtoCodec {
                encode: value::encode_struct,
                decode: value::decode_struct,
            },
        )
        .with(
            LIST_VALUE,
            ProtoCodec {
                encode: value::encode_list,
                decode: value::decode_list,
            },
        )
        .with(
            VALUE,
            ProtoCodec {
                encode: value::encode_value,
                decode: value::decode_value,
            },
        );
    for name in WRAPPERS {
        registry = registry.with(
            name,
            ProtoCodec {
                encode: wrappers::encode,
                decode: wrappers::decode,
            },
        );
    }
    registry
}

fn field(msg: &DynamicMessage, number: u32) -> Result<FieldDescriptor> {
    let desc = msg.descriptor();
    desc.get_field(number).ok_or_else(|| {
        Error::Unsupported(format!("{} has no field {number}", desc.full_name()))
    })
}

fn get_i64(msg: &DynamicMessage, number: u32) -> Result<i64> {
    let field = field(msg, number)?;
    Ok(msg.get_field(&field).as_i64().unwrap_or_default())
}

fn get_i32(msg: &DynamicMessage, number: u32) -> Result<i32> {
    let field = field(msg, number)?;
    Ok(msg.get_field(&field).as_i32().unwrap_or_default())
}

/// Set a field. Zero values of fields without presence are cleared instead.
fn set(msg: &mut DynamicMessage, number: u32, value: Value) -> Result<()> {
    let field = field(msg, number)?;
    if !field.supports_presence() && value == Value::default_value_for_field(&field) {
        msg.clear_field(&field);
        return Ok(());
    }
    set_field(msg, &field, value)
}
