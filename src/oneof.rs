//! Oneof members as plain sibling fields.

use std::sync::Arc;

use prost_reflect::{DynamicMessage, FieldDescriptor, Value};

use crate::{
    Iter, ProtoExtension, Result, Stream,
    binding::{FieldDecoder, FieldEncoder, Slot, StructDescriptorConstructor, set_field},
    codec::ValDecoder,
    extra::ImmunityEmitEmptyEncoder,
};

impl ProtoExtension {
    /// Replace every oneof slot with one binding per member, promoted to the
    /// level of the slot. Members of synthetic oneofs (proto3 `optional`)
    /// stay omitted when unset, even under "emit unpopulated".
    pub(crate) fn flatten_oneofs(&self, c: &mut StructDescriptorConstructor<'_>) {
        let api = c.api();
        let bindings = std::mem::take(&mut c.bindings);
        for mut binding in bindings {
            let (oneof, optional) = match &binding.slot {
                Slot::Oneof(oneof) => (Some(oneof.clone()), false),
                Slot::Field(field) => (None, field.containing_oneof().is_some()),
            };
            let Some(oneof) = oneof else {
                if optional {
                    binding.encoder = Arc::new(ImmunityEmitEmptyEncoder::new(binding.encoder));
                }
                c.bindings.push(binding);
                continue;
            };
            let level = binding.levels.first().copied().unwrap_or_default();
            let members: Vec<FieldDescriptor> = oneof.fields().collect();
            for mut member in c.describe_fields(&members).fields {
                let Some(field) = member.field().cloned() else {
                    continue;
                };
                let mut levels = vec![level];
                levels.extend(&member.levels);
                member.levels = levels;
                member.encoder = Arc::new(OneofWrapperEncoder {
                    field: field.clone(),
                    elem: member.encoder,
                });
                member.decoder = Arc::new(OneofWrapperDecoder {
                    value: api.decoder_of(&field.kind()),
                    field,
                });
                c.embedded_bindings.push(member);
            }
        }
    }
}

/// Writes a member only while it is the active one.
struct OneofWrapperEncoder {
    field: FieldDescriptor,
    elem: Arc<dyn FieldEncoder>,
}

impl FieldEncoder for OneofWrapperEncoder {
    fn encode(&self, msg: &DynamicMessage, stream: &mut Stream<'_>) -> Result<()> {
        if !msg.has_field(&self.field) {
            stream.write_nil();
            return Ok(());
        }
        self.elem
            .encode(msg, stream)
            .map_err(|e| e.in_field(self.field.name()))
    }

    fn is_empty(&self, msg: &DynamicMessage) -> bool {
        !msg.has_field(&self.field)
    }

    fn is_embedded_nil(&self, msg: &DynamicMessage) -> bool {
        !msg.has_field(&self.field)
    }

    fn immune_to_emit_empty(&self) -> bool {
        self.elem.immune_to_emit_empty()
    }
}

/// Selects its member when the key is present. A `null` leaves the oneof
/// untouched unless the member's kind takes `null` as a value.
struct OneofWrapperDecoder {
    field: FieldDescriptor,
    value: Arc<dyn ValDecoder>,
}

impl FieldDecoder for OneofWrapperDecoder {
    fn decode(&self, msg: &mut DynamicMessage, iter: &mut Iter<'_>) -> Result<()> {
        if !self.value.accepts_null() && iter.read_nil()? {
            return Ok(());
        }
        let result = if msg.has_field(&self.field) {
            self.value.decode(msg.get_field_mut(&self.field), iter)
        } else {
            let mut value = Value::default_value_for_field(&self.field);
            self.value
                .decode(&mut value, iter)
                .and_then(|()| set_field(msg, &self.field, value))
        };
        result.map_err(|e| e.in_field(self.field.name()))
    }
}
