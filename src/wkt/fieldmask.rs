use prost_reflect::{DynamicMessage, Value};

use super::{FIELD_MASK, field, set};
use crate::{Error, Iter, ProtoOptions, Result, Stream, iter::ValueType};

/// `foo_bar.baz_qux` to `fooBar.bazQux`. Underscores are dropped and a
/// lowercase letter after one is capitalized.
pub fn json_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut after_underscore = false;
    for c in s.chars() {
        if c == '_' {
            after_underscore = true;
            continue;
        }
        if after_underscore && c.is_ascii_lowercase() {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
        after_underscore = false;
    }
    out
}

/// `fooBar.bazQux` to `foo_bar.baz_qux`.
pub fn json_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Dot-separated identifiers.
fn is_valid_path(path: &str) -> bool {
    path.split('.').all(|name| {
        let mut chars = name.chars();
        chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

pub(super) fn encode(_: &ProtoOptions, msg: &DynamicMessage, stream: &mut Stream<'_>) -> Result<()> {
    let paths = msg.get_field(&field(msg, 1)?);
    let mut out = Vec::new();
    for path in paths.as_list().unwrap_or_default() {
        let path = path.as_str().unwrap_or_default();
        if !is_valid_path(path) {
            return Err(Error::format(
                FIELD_MASK,
                format!("{path:?} contains invalid path"),
            ));
        }
        let camel = json_camel_case(path);
        if json_snake_case(&camel) != path {
            return Err(Error::consistency(
                FIELD_MASK,
                format!("{path:?} contains irreversible value"),
            ));
        }
        out.push(camel);
    }
    stream.write_string(&out.join(","));
    Ok(())
}

pub(super) fn decode(_: &ProtoOptions, msg: &mut DynamicMessage, iter: &mut Iter<'_>) -> Result<()> {
    if iter.what_is_next() != ValueType::String {
        return Err(Error::format(FIELD_MASK, "expect string"));
    }
    let s = iter.read_string()?;
    let mut paths = vec![];
    if !s.is_empty() {
        for part in s.split(',') {
            let path = json_snake_case(part);
            if part.contains('_') || !is_valid_path(&path) {
                return Err(Error::format(
                    FIELD_MASK,
                    format!("{part:?} contains invalid path"),
                ));
            }
            paths.push(Value::String(path));
        }
    }
    set(msg, 1, Value::List(paths))
}
