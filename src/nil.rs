//! Kinds that take JSON `null` as a real value.

use std::sync::Arc;

use prost_reflect::{DynamicMessage, Kind, Value};

use crate::{
    Iter, ProtoExtension, Result,
    codec::ValDecoder,
    wkt::{NULL_VALUE, VALUE},
};

/// Decodes `null` into a fixed value instead of clearing the field.
struct NilDecoder {
    elem: Arc<dyn ValDecoder>,
    null: Value,
}

impl ValDecoder for NilDecoder {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        if iter.read_nil()? {
            *value = self.null.clone();
            return Ok(());
        }
        self.elem.decode(value, iter)
    }

    fn accepts_null(&self) -> bool {
        true
    }
}

impl ProtoExtension {
    /// `google.protobuf.Value` reads `null` as its `null_value` variant and
    /// `google.protobuf.NullValue` reads it as `NULL_VALUE`.
    pub(crate) fn decorate_decoder_for_nil(
        &self,
        kind: &Kind,
        decoder: Arc<dyn ValDecoder>,
    ) -> Arc<dyn ValDecoder> {
        let null = match kind {
            Kind::Enum(desc) if desc.full_name() == NULL_VALUE => Value::EnumNumber(0),
            Kind::Message(desc) if desc.full_name() == VALUE => {
                let mut msg = DynamicMessage::new(desc.clone());
                let Some(field) = desc.get_field(1) else {
                    return decoder;
                };
                if msg.try_set_field(&field, Value::EnumNumber(0)).is_err() {
                    return decoder;
                }
                Value::Message(msg)
            }
            _ => return decoder,
        };
        Arc::new(NilDecoder {
            elem: decoder,
            null,
        })
    }
}
