//! Field bindings: how the engine walks the fields of a message.

use std::{collections::HashMap, sync::Arc};

use prost_reflect::{DynamicMessage, FieldDescriptor, MessageDescriptor, OneofDescriptor, Value};
use tracing::debug;

use crate::{
    Api, Error, Iter, Result, Stream,
    codec::{MessageDecoder, MessageEncoder, ValDecoder, ValEncoder},
};

/// Encodes one binding of a message.
pub trait FieldEncoder: Send + Sync {
    fn encode(&self, msg: &DynamicMessage, stream: &mut Stream<'_>) -> Result<()>;

    fn is_empty(&self, msg: &DynamicMessage) -> bool;

    /// True when the binding belongs to a oneof variant that is not the
    /// active one; such bindings are skipped entirely.
    fn is_embedded_nil(&self, _msg: &DynamicMessage) -> bool {
        false
    }

    /// True for encoders whose emptiness must survive "emit unpopulated".
    fn immune_to_emit_empty(&self) -> bool {
        false
    }
}

/// Decodes the JSON value of one binding into a message.
pub trait FieldDecoder: Send + Sync {
    fn decode(&self, msg: &mut DynamicMessage, iter: &mut Iter<'_>) -> Result<()>;
}

/// What a binding reads and writes.
#[derive(Debug, Clone)]
pub enum Slot {
    Field(FieldDescriptor),
    /// Every member of a non-synthetic oneof, as one polymorphic value.
    Oneof(OneofDescriptor),
}

/// One entry of a message's field list.
#[derive(Clone)]
pub struct Binding {
    pub slot: Slot,
    /// Position path; promoted bindings have more than one level.
    pub levels: Vec<usize>,
    /// Keys accepted on input.
    pub from_names: Vec<String>,
    /// Keys written on output.
    pub to_names: Vec<String>,
    pub omit_empty: bool,
    pub encoder: Arc<dyn FieldEncoder>,
    pub decoder: Arc<dyn FieldDecoder>,
}

impl Binding {
    pub fn field(&self) -> Option<&FieldDescriptor> {
        match &self.slot {
            Slot::Field(field) => Some(field),
            Slot::Oneof(_) => None,
        }
    }
}

/// The field list of a message, as handed to
/// [`Extension::update_struct_descriptor`](crate::Extension::update_struct_descriptor).
pub struct StructDescriptor {
    pub descriptor: MessageDescriptor,
    pub fields: Vec<Binding>,
}

/// The field list of a message before extensions have rewritten it.
pub struct StructDescriptorConstructor<'a> {
    api: &'a Api,
    pub descriptor: MessageDescriptor,
    pub bindings: Vec<Binding>,
    /// Bindings promoted from nested structures, merged in by levels.
    pub embedded_bindings: Vec<Binding>,
}

impl<'a> StructDescriptorConstructor<'a> {
    pub(crate) fn new(api: &'a Api, descriptor: MessageDescriptor) -> Self {
        let bindings = api.default_bindings(&descriptor);
        Self {
            api,
            descriptor,
            bindings,
            embedded_bindings: vec![],
        }
    }

    pub fn api(&self) -> &'a Api {
        self.api
    }

    /// Describe `fields` as a standalone structure, with every extension's
    /// `update_struct_descriptor` applied.
    pub fn describe_fields(&self, fields: &[FieldDescriptor]) -> StructDescriptor {
        self.api.describe_fields(&self.descriptor, fields)
    }
}

/// Default field encoder: reads the field and hands the value to its
/// value encoder.
pub(crate) struct StructFieldEncoder {
    pub field: FieldDescriptor,
    pub value: Arc<dyn ValEncoder>,
}

fn tracks_presence(field: &FieldDescriptor) -> bool {
    field.supports_presence() && !field.is_list() && !field.is_map()
}

impl FieldEncoder for StructFieldEncoder {
    fn encode(&self, msg: &DynamicMessage, stream: &mut Stream<'_>) -> Result<()> {
        if tracks_presence(&self.field) && !msg.has_field(&self.field) {
            stream.write_nil();
            return Ok(());
        }
        self.value.encode(&msg.get_field(&self.field), stream)
    }

    fn is_empty(&self, msg: &DynamicMessage) -> bool {
        if tracks_presence(&self.field) {
            return !msg.has_field(&self.field);
        }
        self.value.is_empty(&msg.get_field(&self.field))
    }
}

/// Default field decoder.
///
/// `null` clears fields with presence and collections unless the value
/// decoder takes `null` as input. Unset presence fields are decoded into a
/// fresh value; everything else is decoded in place. Fields without
/// presence and collections are cleared when left at their default.
pub(crate) struct StructFieldDecoder {
    pub field: FieldDescriptor,
    pub value: Arc<dyn ValDecoder>,
}

impl FieldDecoder for StructFieldDecoder {
    fn decode(&self, msg: &mut DynamicMessage, iter: &mut Iter<'_>) -> Result<()> {
        let field = &self.field;
        let nullable = field.supports_presence() || field.is_list() || field.is_map();
        if nullable && !self.value.accepts_null() && iter.read_nil()? {
            msg.clear_field(field);
            return Ok(());
        }
        if tracks_presence(field) && !msg.has_field(field) {
            let mut value = Value::default_value_for_field(field);
            self.value.decode(&mut value, iter)?;
            return set_field(msg, field, value);
        }
        self.value.decode(msg.get_field_mut(field), iter)?;
        if !tracks_presence(field) && *msg.get_field(field) == Value::default_value_for_field(field) {
            msg.clear_field(field);
        }
        Ok(())
    }
}

pub(crate) fn set_field(msg: &mut DynamicMessage, field: &FieldDescriptor, value: Value) -> Result<()> {
    msg.try_set_field(field, value)
        .map_err(|e| Error::Unsupported(e.to_string()))
}

/// Default rendering of a oneof: an object holding the active member.
pub(crate) struct OneofSlotEncoder {
    pub variants: Vec<(FieldDescriptor, Arc<dyn ValEncoder>)>,
}

impl OneofSlotEncoder {
    fn active(&self, msg: &DynamicMessage) -> Option<&(FieldDescriptor, Arc<dyn ValEncoder>)> {
        self.variants.iter().find(|(field, _)| msg.has_field(field))
    }
}

impl FieldEncoder for OneofSlotEncoder {
    fn encode(&self, msg: &DynamicMessage, stream: &mut Stream<'_>) -> Result<()> {
        let Some((field, encoder)) = self.active(msg) else {
            stream.write_nil();
            return Ok(());
        };
        stream.write_object_start();
        stream.write_object_field(field.name());
        encoder.encode(&msg.get_field(field), stream)?;
        stream.write_object_end();
        Ok(())
    }

    fn is_empty(&self, msg: &DynamicMessage) -> bool {
        self.active(msg).is_none()
    }
}

pub(crate) struct OneofSlotDecoder {
    pub oneof: OneofDescriptor,
    pub variants: Vec<(FieldDescriptor, Arc<dyn ValDecoder>)>,
}

impl FieldDecoder for OneofSlotDecoder {
    fn decode(&self, msg: &mut DynamicMessage, iter: &mut Iter<'_>) -> Result<()> {
        if iter.read_nil()? {
            for (field, _) in &self.variants {
                if msg.has_field(field) {
                    msg.clear_field(field);
                }
            }
            return Ok(());
        }
        iter.read_object_cb(|it, key| {
            let Some((field, decoder)) = self.variants.iter().find(|(f, _)| f.name() == key) else {
                return Err(Error::UnknownField {
                    message: self.oneof.full_name().to_owned(),
                    field: key,
                });
            };
            let mut value = Value::default_value_for_field(field);
            decoder.decode(&mut value, it)?;
            set_field(msg, field, value)
        })
    }
}

/// A finished field list, indexed for decoding. Published descriptors are
/// never mutated.
pub struct StructCodec {
    descriptor: MessageDescriptor,
    fields: Vec<Binding>,
    index: HashMap<String, usize>,
    folded: Option<HashMap<String, usize>>,
}

impl StructCodec {
    pub(crate) fn new(descriptor: MessageDescriptor, mut fields: Vec<Binding>, case_sensitive: bool) -> Self {
        fields.sort_by(|a, b| a.levels.cmp(&b.levels));
        drop_shadowed_names(&mut fields);

        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, binding) in fields.iter().enumerate() {
            for name in &binding.from_names {
                match index.get(name) {
                    Some(&j) if fields[j].levels.len() <= binding.levels.len() => {}
                    _ => {
                        index.insert(name.clone(), i);
                    }
                }
            }
        }
        let folded = (!case_sensitive).then(|| {
            let mut folded = HashMap::new();
            for (name, &i) in &index {
                folded.entry(name.to_ascii_lowercase()).or_insert(i);
            }
            folded
        });
        debug!(
            name = descriptor.full_name(),
            fields = fields.len(),
            "described message"
        );
        Self {
            descriptor,
            fields,
            index,
            folded,
        }
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    pub fn fields(&self) -> &[Binding] {
        &self.fields
    }

    fn lookup(&self, key: &str) -> Option<&Binding> {
        let i = match self.index.get(key) {
            Some(i) => Some(i),
            None => self
                .folded
                .as_ref()
                .and_then(|folded| folded.get(&key.to_ascii_lowercase())),
        };
        i.map(|&i| &self.fields[i])
    }
}

/// When two bindings write the same key, the shallower one keeps it.
fn drop_shadowed_names(fields: &mut [Binding]) {
    let mut owner: HashMap<String, usize> = HashMap::new();
    let mut shadowed = vec![];
    for (i, binding) in fields.iter().enumerate() {
        for name in &binding.to_names {
            match owner.get(name) {
                Some(&j) if fields[j].levels.len() <= binding.levels.len() => {
                    shadowed.push((i, name.clone()));
                }
                Some(&j) => {
                    shadowed.push((j, name.clone()));
                    owner.insert(name.clone(), i);
                }
                None => {
                    owner.insert(name.clone(), i);
                }
            }
        }
    }
    for (i, name) in shadowed {
        fields[i].to_names.retain(|n| *n != name);
    }
}

impl MessageEncoder for StructCodec {
    fn encode_message(&self, msg: &DynamicMessage, stream: &mut Stream<'_>) -> Result<()> {
        stream.write_object_start();
        let mut first = true;
        for binding in &self.fields {
            if binding.to_names.is_empty() {
                continue;
            }
            if binding.omit_empty && binding.encoder.is_empty(msg) {
                continue;
            }
            if binding.encoder.is_embedded_nil(msg) {
                continue;
            }
            for name in &binding.to_names {
                if !first {
                    stream.write_more();
                }
                first = false;
                stream.write_object_field(name);
                binding.encoder.encode(msg, stream)?;
            }
        }
        stream.write_object_end();
        Ok(())
    }
}

impl MessageDecoder for StructCodec {
    fn decode_message(&self, msg: &mut DynamicMessage, iter: &mut Iter<'_>) -> Result<()> {
        if iter.read_nil()? {
            return Ok(());
        }
        iter.read_object_cb(|it, key| match self.lookup(&key) {
            Some(binding) => binding.decoder.decode(msg, it),
            None if it.api().config().disallow_unknown_fields => Err(Error::UnknownField {
                message: self.descriptor.full_name().to_owned(),
                field: key,
            }),
            None => it.skip(),
        })
    }
}
