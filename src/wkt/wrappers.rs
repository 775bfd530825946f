//! Wrapper messages are written as their `value` field.

use prost_reflect::{DynamicMessage, Value};

use super::{field, set};
use crate::{Iter, ProtoOptions, Result, Stream};

pub(super) fn encode(_: &ProtoOptions, msg: &DynamicMessage, stream: &mut Stream<'_>) -> Result<()> {
    let field = field(msg, 1)?;
    let api = stream.api();
    api.encoder_of(&field.kind())
        .encode(&msg.get_field(&field), stream)
}

pub(super) fn decode(_: &ProtoOptions, msg: &mut DynamicMessage, iter: &mut Iter<'_>) -> Result<()> {
    let field = field(msg, 1)?;
    let api = iter.api();
    let mut value = Value::default_value_for_field(&field);
    api.decoder_of(&field.kind()).decode(&mut value, iter)?;
    set(msg, field.number(), value)
}
