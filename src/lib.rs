//! # protobuf-json-codec
//!
//! The canonical protobuf JSON mapping for [`prost_reflect::DynamicMessage`],
//! built as an extension to a small reflection-driven JSON engine.
//!
//! ## Features
//! * Well-known types: `Any`, `Timestamp`, `Duration`, `FieldMask`,
//!   `Struct`/`Value`/`ListValue` and the wrappers
//! * lowerCamelCase or proto field names, enums by name or number
//! * Flattened oneofs, quoted 64-bit integers, `NaN`/`Infinity` floats
//! * Lenient decoding of scalars (`"1"` for numbers, `1.0` for integers,
//!   `"true"` for bools, ...), which can be switched off
//! * Codecs of further message types through a [`CodecRegistry`]
//!
//! ## Examples
//!
//! ``` rust
//! use prost_reflect::{DescriptorPool, DynamicMessage, Value};
//! use protobuf_json_codec::{ProtoOptions, new_api};
//!
//! let desc = DescriptorPool::global()
//!     .get_message_by_name("google.protobuf.Duration")
//!     .unwrap();
//! let mut msg = DynamicMessage::new(desc.clone());
//! msg.set_field_by_name("seconds", Value::I64(1));
//! msg.set_field_by_name("nanos", Value::I32(500_000_000));
//!
//! let api = new_api(ProtoOptions::default());
//! assert_eq!(api.marshal_to_string(&msg).unwrap(), r#""1.500s""#);
//!
//! let mut decoded = DynamicMessage::new(desc);
//! api.unmarshal_from_str(r#""1.500s""#, &mut decoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```
//!

mod api;
mod binding;
mod codec;
mod enums;
mod error;
mod ext;
pub mod extra;
mod fuzzy;
mod iter;
mod nil;
mod oneof;
mod quote;
mod registry;
mod resolver;
mod scalar;
mod sort_map_keys;
mod stream;
pub mod wkt;

pub use api::{Api, Config, Extension};
pub use binding::{Binding, FieldDecoder, FieldEncoder, Slot, StructDescriptor, StructDescriptorConstructor};
pub use codec::{MapEncoderConstructor, MessageDecoder, MessageEncoder, ValDecoder, ValEncoder, is_zero};
pub use error::{Error, Result};
pub use ext::{InvalidUtf8, ProtoExtension, ProtoOptions};
pub use iter::{Iter, MAX_DEPTH, ValueType};
pub use quote::{quote_valid_utf8, quote_valid_utf8_html_escaped};
pub use registry::{CodecRegistry, DecodeFn, EncodeFn, ProtoCodec};
pub use resolver::TypeResolver;
pub use sort_map_keys::KeyOrder;
pub use stream::Stream;

/// An engine with map keys sorted, unknown fields rejected and a
/// [`ProtoExtension`] built from `options`.
pub fn new_api(options: ProtoOptions) -> Api {
    let mut api = Config::new()
        .with_sort_map_keys(true)
        .with_disallow_unknown_fields(true)
        .froze();
    api.register_extension(ProtoExtension::new(options));
    api
}
