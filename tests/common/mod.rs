#![allow(dead_code)]

use std::sync::OnceLock;

use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, ReflectMessage, Value};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, MessageOptions, OneofDescriptorProto,
    field_descriptor_proto::{Label, Type},
};
use protobuf_json_codec::{Api, ProtoOptions, new_api};

fn json_name(name: &str) -> String {
    let mut out = String::new();
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn scalar(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_owned()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        json_name: Some(json_name(name)),
        ..Default::default()
    }
}

fn typed(name: &str, number: i32, ty: Type, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(format!(".{type_name}")),
        ..scalar(name, number, ty)
    }
}

fn message(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    typed(name, number, Type::Message, type_name)
}

fn enumeration(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    typed(name, number, Type::Enum, type_name)
}

fn repeated(field: FieldDescriptorProto) -> FieldDescriptorProto {
    FieldDescriptorProto {
        label: Some(Label::Repeated as i32),
        ..field
    }
}

fn in_oneof(field: FieldDescriptorProto, index: i32) -> FieldDescriptorProto {
    FieldDescriptorProto {
        oneof_index: Some(index),
        ..field
    }
}

fn optional(field: FieldDescriptorProto, index: i32) -> FieldDescriptorProto {
    FieldDescriptorProto {
        proto3_optional: Some(true),
        ..in_oneof(field, index)
    }
}

fn oneof(name: &str) -> OneofDescriptorProto {
    OneofDescriptorProto {
        name: Some(name.to_owned()),
        ..Default::default()
    }
}

fn msg(name: &str, field: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_owned()),
        field,
        ..Default::default()
    }
}

fn map_entry(name: &str, key: FieldDescriptorProto, value: FieldDescriptorProto) -> DescriptorProto {
    DescriptorProto {
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..msg(name, vec![key, value])
    }
}

/// A map field `name` of message `parent`, plus its entry type.
fn map(
    parent: &str,
    name: &str,
    number: i32,
    key: Type,
    value: FieldDescriptorProto,
) -> (FieldDescriptorProto, DescriptorProto) {
    let entry = format!("{}Entry", capitalize(&json_name(name)));
    let field = repeated(message(name, number, &format!("{parent}.{entry}")));
    (field, map_entry(&entry, scalar("key", 1, key), value))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn enum_type(name: &str, values: &[(&str, i32)]) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(name.to_owned()),
        value: values
            .iter()
            .map(|(name, number)| EnumValueDescriptorProto {
                name: Some((*name).to_owned()),
                number: Some(*number),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn file(
    name: &str,
    package: &str,
    dependency: &[&str],
    message_type: Vec<DescriptorProto>,
    enum_type: Vec<EnumDescriptorProto>,
) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_owned()),
        package: Some(package.to_owned()),
        dependency: dependency.iter().map(|d| (*d).to_owned()).collect(),
        message_type,
        enum_type,
        syntax: Some("proto3".to_owned()),
        ..Default::default()
    }
}

fn well_known_files() -> Vec<FileDescriptorProto> {
    let seconds_nanos = || {
        vec![
            scalar("seconds", 1, Type::Int64),
            scalar("nanos", 2, Type::Int32),
        ]
    };
    let (fields, fields_entry) = map(
        "google.protobuf.Struct",
        "fields",
        1,
        Type::String,
        message("value", 2, "google.protobuf.Value"),
    );
    let mut structure = msg("Struct", vec![fields]);
    structure.nested_type.push(fields_entry);
    let mut value = msg(
        "Value",
        vec![
            in_oneof(enumeration("null_value", 1, "google.protobuf.NullValue"), 0),
            in_oneof(scalar("number_value", 2, Type::Double), 0),
            in_oneof(scalar("string_value", 3, Type::String), 0),
            in_oneof(scalar("bool_value", 4, Type::Bool), 0),
            in_oneof(message("struct_value", 5, "google.protobuf.Struct"), 0),
            in_oneof(message("list_value", 6, "google.protobuf.ListValue"), 0),
        ],
    );
    value.oneof_decl.push(oneof("kind"));
    let wrapper = |name: &str, ty: Type| msg(name, vec![scalar("value", 1, ty)]);

    vec![
        file(
            "google/protobuf/any.proto",
            "google.protobuf",
            &[],
            vec![msg(
                "Any",
                vec![
                    scalar("type_url", 1, Type::String),
                    scalar("value", 2, Type::Bytes),
                ],
            )],
            vec![],
        ),
        file(
            "google/protobuf/timestamp.proto",
            "google.protobuf",
            &[],
            vec![msg("Timestamp", seconds_nanos())],
            vec![],
        ),
        file(
            "google/protobuf/duration.proto",
            "google.protobuf",
            &[],
            vec![msg("Duration", seconds_nanos())],
            vec![],
        ),
        file(
            "google/protobuf/empty.proto",
            "google.protobuf",
            &[],
            vec![msg("Empty", vec![])],
            vec![],
        ),
        file(
            "google/protobuf/field_mask.proto",
            "google.protobuf",
            &[],
            vec![msg(
                "FieldMask",
                vec![repeated(scalar("paths", 1, Type::String))],
            )],
            vec![],
        ),
        file(
            "google/protobuf/struct.proto",
            "google.protobuf",
            &[],
            vec![
                structure,
                value,
                msg(
                    "ListValue",
                    vec![repeated(message("values", 1, "google.protobuf.Value"))],
                ),
            ],
            vec![enum_type("NullValue", &[("NULL_VALUE", 0)])],
        ),
        file(
            "google/protobuf/wrappers.proto",
            "google.protobuf",
            &[],
            vec![
                wrapper("DoubleValue", Type::Double),
                wrapper("FloatValue", Type::Float),
                wrapper("Int64Value", Type::Int64),
                wrapper("UInt64Value", Type::Uint64),
                wrapper("Int32Value", Type::Int32),
                wrapper("UInt32Value", Type::Uint32),
                wrapper("BoolValue", Type::Bool),
                wrapper("StringValue", Type::String),
                wrapper("BytesValue", Type::Bytes),
            ],
            vec![],
        ),
    ]
}

fn test_file() -> FileDescriptorProto {
    let json_enum = "test.v1.JsonEnum";

    let singular = msg(
        "Singular",
        vec![
            enumeration("e", 1, json_enum),
            scalar("s", 2, Type::String),
            scalar("i32", 3, Type::Int32),
            scalar("i64", 4, Type::Int64),
            scalar("u32", 5, Type::Uint32),
            scalar("u64", 6, Type::Uint64),
            scalar("f32", 7, Type::Float),
            scalar("f64", 8, Type::Double),
            scalar("si32", 9, Type::Sint32),
            scalar("si64", 10, Type::Sint64),
            scalar("fi32", 11, Type::Fixed32),
            scalar("fi64", 12, Type::Fixed64),
            scalar("sfi32", 13, Type::Sfixed32),
            scalar("sfi64", 14, Type::Sfixed64),
            scalar("bl", 15, Type::Bool),
            scalar("by", 16, Type::Bytes),
            scalar("display_name", 17, Type::String),
            message("msg", 18, "test.v1.Message"),
        ],
    );

    let mut optionals = msg(
        "Optionals",
        vec![
            optional(scalar("s", 1, Type::String), 1),
            optional(scalar("i64", 2, Type::Int64), 2),
            optional(message("msg", 3, "test.v1.Message"), 3),
            optional(enumeration("e", 4, json_enum), 4),
            in_oneof(scalar("name", 5, Type::String), 0),
            in_oneof(message("m", 6, "test.v1.Message"), 0),
        ],
    );
    optionals.oneof_decl = vec![oneof("choice"), oneof("_s"), oneof("_i64"), oneof("_msg"), oneof("_e")];

    let repeated_msg = msg(
        "Repeated",
        vec![
            repeated(scalar("s", 1, Type::String)),
            repeated(scalar("i64", 2, Type::Int64)),
            repeated(message("msgs", 3, "test.v1.Message")),
            repeated(enumeration("e", 4, json_enum)),
            repeated(message("v", 5, "google.protobuf.Value")),
        ],
    );

    let maps_name = "test.v1.Maps";
    let (str_field, str_entry) = map(maps_name, "str", 1, Type::Int64, scalar("value", 2, Type::String));
    let (by_field, by_entry) = map(maps_name, "by", 2, Type::Bool, scalar("value", 2, Type::Bytes));
    let (bo_field, bo_entry) = map(maps_name, "bo", 3, Type::Uint32, scalar("value", 2, Type::Bool));
    let (msg_field, msg_entry) = map(maps_name, "msg", 4, Type::String, message("value", 2, "test.v1.Message"));
    let (i64_field, i64_entry) = map(maps_name, "i64", 5, Type::Int32, scalar("value", 2, Type::Int64));
    let mut maps = msg("Maps", vec![str_field, by_field, bo_field, msg_field, i64_field]);
    maps.nested_type = vec![str_entry, by_entry, bo_entry, msg_entry, i64_entry];

    let mut one_of = msg(
        "OneOf",
        vec![
            in_oneof(scalar("str", 1, Type::String), 0),
            in_oneof(scalar("num", 2, Type::Int64), 0),
            in_oneof(message("msg", 3, "test.v1.Message"), 0),
            in_oneof(message("val", 4, "google.protobuf.Value"), 0),
            in_oneof(enumeration("nu", 5, "google.protobuf.NullValue"), 0),
            scalar("other", 6, Type::String),
        ],
    );
    one_of.oneof_decl.push(oneof("kind"));

    let wkts = msg(
        "WKTs",
        vec![
            message("a", 1, "google.protobuf.Any"),
            message("d", 2, "google.protobuf.Duration"),
            message("t", 3, "google.protobuf.Timestamp"),
            message("st", 4, "google.protobuf.Struct"),
            message("v", 5, "google.protobuf.Value"),
            message("l", 6, "google.protobuf.ListValue"),
            message("i32", 7, "google.protobuf.Int32Value"),
            message("ui32", 8, "google.protobuf.UInt32Value"),
            message("i64", 9, "google.protobuf.Int64Value"),
            message("u64", 10, "google.protobuf.UInt64Value"),
            message("f32", 11, "google.protobuf.FloatValue"),
            message("f64", 12, "google.protobuf.DoubleValue"),
            message("b", 13, "google.protobuf.BoolValue"),
            message("s", 14, "google.protobuf.StringValue"),
            message("by", 15, "google.protobuf.BytesValue"),
            message("fm", 16, "google.protobuf.FieldMask"),
            message("em", 17, "google.protobuf.Empty"),
            enumeration("nu", 18, "google.protobuf.NullValue"),
        ],
    );

    file(
        "test/v1/test.proto",
        "test.v1",
        &[
            "google/protobuf/any.proto",
            "google/protobuf/timestamp.proto",
            "google/protobuf/duration.proto",
            "google/protobuf/empty.proto",
            "google/protobuf/field_mask.proto",
            "google/protobuf/struct.proto",
            "google/protobuf/wrappers.proto",
        ],
        vec![
            msg("Message", vec![scalar("id", 1, Type::Int32)]),
            singular,
            optionals,
            repeated_msg,
            maps,
            one_of,
            wkts,
        ],
        vec![enum_type(
            "JsonEnum",
            &[
                ("JSON_ENUM_UNSPECIFIED", 0),
                ("JSON_ENUM_SOME", 1),
                ("JSON_ENUM_OTHER", 2),
            ],
        )],
    )
}

pub fn pool() -> &'static DescriptorPool {
    static POOL: OnceLock<DescriptorPool> = OnceLock::new();
    POOL.get_or_init(|| {
        let mut file = well_known_files();
        file.push(test_file());
        DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file }).unwrap()
    })
}

pub fn descriptor(name: &str) -> MessageDescriptor {
    pool()
        .get_message_by_name(name)
        .unwrap_or_else(|| panic!("{name} not found"))
}

pub fn new_message(name: &str) -> DynamicMessage {
    DynamicMessage::new(descriptor(name))
}

/// A message with the given fields set.
pub fn build(name: &str, fields: &[(&str, Value)]) -> DynamicMessage {
    let mut msg = new_message(name);
    for (field, value) in fields {
        let field = msg
            .descriptor()
            .get_field_by_name(field)
            .unwrap_or_else(|| panic!("{name}.{field} not found"));
        // zeros without presence are not stored by a decoded message
        if !field.supports_presence() && *value == Value::default_value_for_field(&field) {
            continue;
        }
        msg.try_set_field(&field, value.clone()).unwrap();
    }
    msg
}

pub fn api() -> Api {
    new_api(ProtoOptions::default())
}

pub fn marshal(api: &Api, msg: &DynamicMessage) -> String {
    api.marshal_to_string(msg).unwrap()
}

pub fn unmarshal(api: &Api, name: &str, json: &str) -> DynamicMessage {
    let mut msg = new_message(name);
    api.unmarshal_from_str(json, &mut msg).unwrap();
    msg
}

/// A pool of its own holding `test.v1.Message` with a single string field.
pub fn other_pool() -> &'static DescriptorPool {
    static POOL: OnceLock<DescriptorPool> = OnceLock::new();
    POOL.get_or_init(|| {
        let file = file(
            "other/test.proto",
            "test.v1",
            &[],
            vec![msg("Message", vec![scalar("name", 1, Type::String)])],
            vec![],
        );
        DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] }).unwrap()
    })
}
