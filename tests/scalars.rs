mod common;

use common::{api, build, marshal, new_message, unmarshal};
use prost::bytes::Bytes;
use prost_reflect::{DynamicMessage, Value};
use protobuf_json_codec::{Config, ProtoExtension, ProtoOptions, new_api};

fn string_field(msg: &DynamicMessage) -> String {
    msg.get_field_by_name("s").unwrap().as_str().unwrap().to_owned()
}

#[test]
fn test_html_escaping() {
    let msg = build("test.v1.Singular", &[("s", Value::String("<a&b>".to_owned()))]);
    assert_eq!(marshal(&api(), &msg), r#"{"s":"<a&b>"}"#);

    let mut html = Config::new().with_escape_html(true).froze();
    html.register_extension(ProtoExtension::default());
    let json = marshal(&html, &msg);
    assert_eq!(json, r#"{"s":"\u003ca\u0026b\u003e"}"#);
    assert_eq!(unmarshal(&html, "test.v1.Singular", &json), msg);
}

#[test]
fn test_invalid_utf8() {
    let input: &[u8] = b"{\"s\":\"a\xffb\"}";

    let mut msg = new_message("test.v1.Singular");
    let err = api().unmarshal(input, &mut msg).unwrap_err();
    assert!(err.to_string().contains("invalid UTF-8"), "{err}");

    let lossy = new_api(ProtoOptions::default().with_permit_invalid_utf8(true));
    let mut msg = new_message("test.v1.Singular");
    lossy.unmarshal(input, &mut msg).unwrap();
    assert_eq!(string_field(&msg), "a\u{fffd}b");

    // valid strings are untouched
    let msg = unmarshal(&lossy, "test.v1.Singular", r#"{"s":"你好"}"#);
    assert_eq!(string_field(&msg), "你好");
}

#[cfg(feature = "stfu8")]
#[test]
fn test_invalid_utf8_stfu8() {
    let api = new_api(
        ProtoOptions::default()
            .with_permit_invalid_utf8(true)
            .with_invalid_utf8(protobuf_json_codec::InvalidUtf8::Stfu8),
    );
    let mut msg = new_message("test.v1.Singular");
    api.unmarshal(b"{\"s\":\"a\xffb\"}", &mut msg).unwrap();
    let s = string_field(&msg);
    assert!(s.to_ascii_lowercase().contains(r"\xff"), "{s}");
    assert!(!s.contains('\u{fffd}'));
}

#[test]
fn test_non_finite_floats() {
    let api = api();
    let msg = build(
        "test.v1.Singular",
        &[
            ("f32", Value::F32(f32::INFINITY)),
            ("f64", Value::F64(f64::NAN)),
        ],
    );
    let json = marshal(&api, &msg);
    assert_eq!(json, r#"{"f32":"Infinity","f64":"NaN"}"#);

    let decoded = unmarshal(&api, "test.v1.Singular", &json);
    assert_eq!(
        decoded.get_field_by_name("f32").unwrap().as_f32(),
        Some(f32::INFINITY)
    );
    assert!(decoded.get_field_by_name("f64").unwrap().as_f64().unwrap().is_nan());

    let msg = unmarshal(&api, "test.v1.Singular", r#"{"f64":"-Infinity","f32":-0.5}"#);
    assert_eq!(marshal(&api, &msg), r#"{"f32":-0.5,"f64":"-Infinity"}"#);

    let mut msg = new_message("test.v1.Singular");
    assert!(api.unmarshal_from_str(r#"{"f64":"nan"}"#, &mut msg).is_err());
}

#[test]
fn test_64bit_quoting() {
    let msg = build(
        "test.v1.Singular",
        &[
            ("i64", Value::I64(i64::MAX)),
            ("u64", Value::U64(u64::MAX)),
            ("si64", Value::I64(i64::MIN)),
            ("fi64", Value::U64(1)),
            ("sfi64", Value::I64(-1)),
        ],
    );
    let json = marshal(&api(), &msg);
    assert_eq!(
        json,
        r#"{"i64":"9223372036854775807","u64":"18446744073709551615","si64":"-9223372036854775808","fi64":"1","sfi64":"-1"}"#
    );
    assert_eq!(unmarshal(&api(), "test.v1.Singular", &json), msg);

    let integers = new_api(ProtoOptions::default().with_encode_64bit_as_integer(true));
    let json = marshal(&integers, &msg);
    assert_eq!(
        json,
        r#"{"i64":9223372036854775807,"u64":18446744073709551615,"si64":-9223372036854775808,"fi64":1,"sfi64":-1}"#
    );
    // quoted input is accepted either way
    let decoded = unmarshal(&integers, "test.v1.Singular", r#"{"i64":"9007199254740993"}"#);
    assert_eq!(
        decoded.get_field_by_name("i64").unwrap().as_i64(),
        Some(9_007_199_254_740_993)
    );

    let mut msg = new_message("test.v1.Singular");
    assert!(
        api()
            .unmarshal_from_str(r#"{"u64":"18446744073709551616"}"#, &mut msg)
            .is_err()
    );
}

#[test]
fn test_bytes() {
    let api = api();
    let msg = build(
        "test.v1.Singular",
        &[("by", Value::Bytes(Bytes::from_static(b"\xfb\xff\x00")))],
    );
    assert_eq!(marshal(&api, &msg), r#"{"by":"+//A"}"#);
    for json in [r#"{"by":"+//A"}"#, r#"{"by":"-__A"}"#] {
        assert_eq!(unmarshal(&api, "test.v1.Singular", json), msg, "{json}");
    }

    let one = build("test.v1.Singular", &[("by", Value::Bytes(Bytes::from_static(b"a")))]);
    for json in [r#"{"by":"YQ=="}"#, r#"{"by":"YQ"}"#] {
        assert_eq!(unmarshal(&api, "test.v1.Singular", json), one, "{json}");
    }

    let mut msg = new_message("test.v1.Singular");
    assert!(api.unmarshal_from_str(r#"{"by":"Y*=="}"#, &mut msg).is_err());
}

#[test]
fn test_repeated_scalars() {
    let api = api();
    let msg = unmarshal(
        &api,
        "test.v1.Repeated",
        r#"{"s":["a","b"],"i64":[1,"-2"],"msgs":[{"id":1},{}],"v":[1,"x",null]}"#,
    );
    assert_eq!(
        marshal(&api, &msg),
        r#"{"s":["a","b"],"i64":["1","-2"],"msgs":[{"id":1},{}],"v":[1,"x",null]}"#
    );

    // null clears a list
    let mut msg = msg;
    api.unmarshal_from_str(r#"{"s":null}"#, &mut msg).unwrap();
    assert!(!msg.has_field_by_name("s"));
    assert!(msg.has_field_by_name("i64"));
}

#[test]
fn test_emit_unpopulated_round_trip() {
    let api = new_api(ProtoOptions::default().with_emit_unpopulated(true));
    for name in ["test.v1.Singular", "test.v1.Repeated", "test.v1.Maps", "test.v1.OneOf"] {
        let msg = new_message(name);
        let json = marshal(&api, &msg);
        assert_eq!(unmarshal(&api, name, &json), msg, "{json}");
    }

    let msg = build(
        "test.v1.Singular",
        &[
            ("i32", Value::I32(0)),
            ("s", Value::String("x".to_owned())),
            ("e", Value::EnumNumber(0)),
        ],
    );
    let json = marshal(&api, &msg);
    assert_eq!(unmarshal(&api, "test.v1.Singular", &json), msg, "{json}");

    // explicit zeros decode to the same message as absent fields
    let zeros = unmarshal(&api, "test.v1.Singular", r#"{"i32":0,"s":"","bl":false,"by":"","e":0}"#);
    assert_eq!(zeros, new_message("test.v1.Singular"));
}
