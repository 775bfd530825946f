//! The reflection-driven engine and its extension hooks.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use parking_lot::RwLock;
use prost_reflect::{
    DescriptorPool, DynamicMessage, FieldDescriptor, Kind, MessageDescriptor, OneofDescriptor,
    ReflectMessage,
};

use crate::{
    Error, Iter, Result, Stream,
    binding::{
        Binding, FieldDecoder, FieldEncoder, OneofSlotDecoder, OneofSlotEncoder, Slot,
        StructCodec, StructDescriptor, StructDescriptorConstructor, StructFieldDecoder,
        StructFieldEncoder,
    },
    codec::{
        ListDecoder, ListEncoder, MapDecoder, MapEncoder, MapEncoderConstructor, MessageDecoder,
        MessageEncoder, QuotedKeyEncoder, ValDecoder, ValEncoder, default_decoder,
        default_encoder, kind_name,
    },
    sort_map_keys::KeyOrder,
};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Write map entries in a stable order. Dynamic maps are hash maps, so
    /// this is on by default.
    pub sort_map_keys: bool,
    /// Escape `<`, `>`, `&`, U+2028 and U+2029 in strings.
    pub escape_html: bool,
    /// Fail on object keys that match no field.
    pub disallow_unknown_fields: bool,
    /// Match object keys to fields case-sensitively only.
    pub case_sensitive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sort_map_keys: true,
            escape_html: false,
            disallow_unknown_fields: false,
            case_sensitive: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sort_map_keys(mut self, sort_map_keys: bool) -> Self {
        self.sort_map_keys = sort_map_keys;
        self
    }

    pub fn with_escape_html(mut self, escape_html: bool) -> Self {
        self.escape_html = escape_html;
        self
    }

    pub fn with_disallow_unknown_fields(mut self, disallow: bool) -> Self {
        self.disallow_unknown_fields = disallow;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Build an engine from this configuration.
    pub fn froze(self) -> Api {
        Api {
            config: self,
            extensions: vec![],
            encoders: RwLock::default(),
            decoders: RwLock::default(),
            message_encoders: RwLock::default(),
            message_decoders: RwLock::default(),
            structs: RwLock::default(),
        }
    }
}

/// Hooks that let an extension take over or reshape codec construction.
///
/// Every hook runs once per type; the results are cached by the [`Api`].
#[allow(unused_variables)]
pub trait Extension: Send + Sync {
    /// Take over a whole message type.
    fn create_message_encoder(&self, desc: &MessageDescriptor) -> Option<Arc<dyn MessageEncoder>> {
        None
    }

    fn create_message_decoder(&self, desc: &MessageDescriptor) -> Option<Arc<dyn MessageDecoder>> {
        None
    }

    /// Replace the default encoder of a value kind.
    fn create_encoder(&self, kind: &Kind) -> Option<Arc<dyn ValEncoder>> {
        None
    }

    fn create_decoder(&self, kind: &Kind) -> Option<Arc<dyn ValDecoder>> {
        None
    }

    /// Wrap the encoder chosen for a value kind.
    fn decorate_encoder(&self, kind: &Kind, encoder: Arc<dyn ValEncoder>) -> Arc<dyn ValEncoder> {
        encoder
    }

    fn decorate_decoder(&self, kind: &Kind, decoder: Arc<dyn ValDecoder>) -> Arc<dyn ValDecoder> {
        decoder
    }

    fn update_map_encoder_constructor(&self, constructor: &mut MapEncoderConstructor) {}

    /// Rewrite the raw field list of a message.
    fn update_struct_descriptor_constructor(&self, constructor: &mut StructDescriptorConstructor<'_>) {}

    /// Rename or rewrap bindings once the field list is settled.
    fn update_struct_descriptor(&self, descriptor: &mut StructDescriptor) {}
}

/// Codecs by type name, grouped by the pool defining the type. Scalar kinds
/// have no pool.
type Cache<T> = RwLock<Vec<(Option<DescriptorPool>, HashMap<String, Arc<T>>)>>;

/// A frozen engine: configuration, extensions and the codec caches.
///
/// `Api` is `Send + Sync`; caches fill on first use of each type and are
/// shared by every call afterwards.
pub struct Api {
    config: Config,
    extensions: Vec<Arc<dyn Extension>>,
    encoders: Cache<dyn ValEncoder>,
    decoders: Cache<dyn ValDecoder>,
    message_encoders: Cache<dyn MessageEncoder>,
    message_decoders: Cache<dyn MessageDecoder>,
    structs: Cache<StructCodec>,
}

fn cached<T: ?Sized>(
    cache: &Cache<T>,
    pool: Option<&DescriptorPool>,
    key: &str,
    build: impl FnOnce() -> Arc<T>,
) -> Arc<T> {
    let hit = cache
        .read()
        .iter()
        .find(|(p, _)| p.as_ref() == pool)
        .and_then(|(_, codecs)| codecs.get(key).cloned());
    if let Some(hit) = hit {
        return hit;
    }
    let built = build();
    let mut cache = cache.write();
    let index = match cache.iter().position(|(p, _)| p.as_ref() == pool) {
        Some(index) => index,
        None => {
            cache.push((pool.cloned(), HashMap::new()));
            cache.len() - 1
        }
    };
    cache[index].1.entry(key.to_owned()).or_insert(built).clone()
}

fn pool_of(kind: &Kind) -> Option<&DescriptorPool> {
    match kind {
        Kind::Message(desc) => Some(desc.parent_pool()),
        Kind::Enum(desc) => Some(desc.parent_pool()),
        _ => None,
    }
}

impl Api {
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register an extension. Codecs built before the call are dropped.
    pub fn register_extension(&mut self, extension: impl Extension + 'static) {
        self.extensions.push(Arc::new(extension));
        self.encoders.get_mut().clear();
        self.decoders.get_mut().clear();
        self.message_encoders.get_mut().clear();
        self.message_decoders.get_mut().clear();
        self.structs.get_mut().clear();
    }

    pub fn marshal(&self, msg: &DynamicMessage) -> Result<Vec<u8>> {
        let mut stream = Stream::new(self);
        self.message_encoder(&msg.descriptor())
            .encode_message(msg, &mut stream)?;
        Ok(stream.into_inner())
    }

    pub fn marshal_to_string(&self, msg: &DynamicMessage) -> Result<String> {
        String::from_utf8(self.marshal(msg)?)
            .map_err(|_| Error::invalid_utf8(msg.descriptor().full_name()))
    }

    /// Decode `data` into `msg`, merging with its current content.
    pub fn unmarshal(&self, data: &[u8], msg: &mut DynamicMessage) -> Result<()> {
        let mut iter = Iter::new(self, data);
        self.message_decoder(&msg.descriptor())
            .decode_message(msg, &mut iter)?;
        iter.ensure_end()
    }

    pub fn unmarshal_from_str(&self, data: &str, msg: &mut DynamicMessage) -> Result<()> {
        self.unmarshal(data.as_bytes(), msg)
    }

    /// Encoder of a whole message type.
    pub fn message_encoder(&self, desc: &MessageDescriptor) -> Arc<dyn MessageEncoder> {
        cached(&self.message_encoders, Some(desc.parent_pool()), desc.full_name(), || {
            self.extensions
                .iter()
                .find_map(|ext| ext.create_message_encoder(desc))
                .unwrap_or_else(|| self.struct_codec(desc) as Arc<dyn MessageEncoder>)
        })
    }

    /// Decoder of a whole message type.
    pub fn message_decoder(&self, desc: &MessageDescriptor) -> Arc<dyn MessageDecoder> {
        cached(&self.message_decoders, Some(desc.parent_pool()), desc.full_name(), || {
            self.extensions
                .iter()
                .find_map(|ext| ext.create_message_decoder(desc))
                .unwrap_or_else(|| self.struct_codec(desc) as Arc<dyn MessageDecoder>)
        })
    }

    /// Encoder of a single value of `kind`, decorated by every extension.
    pub fn encoder_of(&self, kind: &Kind) -> Arc<dyn ValEncoder> {
        cached(&self.encoders, pool_of(kind), &kind_name(kind), || {
            let encoder = self
                .extensions
                .iter()
                .find_map(|ext| ext.create_encoder(kind))
                .unwrap_or_else(|| default_encoder(kind));
            self.extensions
                .iter()
                .fold(encoder, |encoder, ext| ext.decorate_encoder(kind, encoder))
        })
    }

    /// Decoder of a single value of `kind`, decorated by every extension.
    pub fn decoder_of(&self, kind: &Kind) -> Arc<dyn ValDecoder> {
        cached(&self.decoders, pool_of(kind), &kind_name(kind), || {
            let decoder = self
                .extensions
                .iter()
                .find_map(|ext| ext.create_decoder(kind))
                .unwrap_or_else(|| default_decoder(kind));
            self.extensions
                .iter()
                .fold(decoder, |decoder, ext| ext.decorate_decoder(kind, decoder))
        })
    }

    fn struct_codec(&self, desc: &MessageDescriptor) -> Arc<StructCodec> {
        cached(&self.structs, Some(desc.parent_pool()), desc.full_name(), || {
            let mut constructor = StructDescriptorConstructor::new(self, desc.clone());
            for ext in &self.extensions {
                ext.update_struct_descriptor_constructor(&mut constructor);
            }
            let StructDescriptorConstructor {
                bindings,
                embedded_bindings,
                ..
            } = constructor;
            let mut descriptor = StructDescriptor {
                descriptor: desc.clone(),
                fields: bindings,
            };
            for ext in &self.extensions {
                ext.update_struct_descriptor(&mut descriptor);
            }
            let mut fields = embedded_bindings;
            fields.extend(descriptor.fields);
            Arc::new(StructCodec::new(
                desc.clone(),
                fields,
                self.config.case_sensitive,
            ))
        })
    }

    /// Bindings of `desc` in declaration order. Each non-synthetic oneof
    /// becomes one slot at the position of its first member.
    pub(crate) fn default_bindings(&self, desc: &MessageDescriptor) -> Vec<Binding> {
        let mut bindings = vec![];
        let mut oneofs = HashSet::new();
        for (i, field) in desc.fields().enumerate() {
            match field.containing_oneof().filter(|o| !is_synthetic(o)) {
                Some(oneof) => {
                    if oneofs.insert(oneof.name().to_owned()) {
                        bindings.push(self.oneof_binding(oneof, i));
                    }
                }
                None => bindings.push(self.field_binding(&field, vec![i], true)),
            }
        }
        bindings
    }

    pub(crate) fn describe_fields(
        &self,
        desc: &MessageDescriptor,
        fields: &[FieldDescriptor],
    ) -> StructDescriptor {
        let mut descriptor = StructDescriptor {
            descriptor: desc.clone(),
            fields: fields
                .iter()
                .enumerate()
                .map(|(i, field)| self.field_binding(field, vec![i], false))
                .collect(),
        };
        for ext in &self.extensions {
            ext.update_struct_descriptor(&mut descriptor);
        }
        descriptor
    }

    fn field_binding(&self, field: &FieldDescriptor, levels: Vec<usize>, omit_empty: bool) -> Binding {
        let encoder: Arc<dyn FieldEncoder> = Arc::new(StructFieldEncoder {
            field: field.clone(),
            value: self.field_value_encoder(field),
        });
        let decoder: Arc<dyn FieldDecoder> = Arc::new(StructFieldDecoder {
            field: field.clone(),
            value: self.field_value_decoder(field),
        });
        Binding {
            slot: Slot::Field(field.clone()),
            levels,
            from_names: vec![field.name().to_owned()],
            to_names: vec![field.name().to_owned()],
            omit_empty,
            encoder,
            decoder,
        }
    }

    fn oneof_binding(&self, oneof: OneofDescriptor, level: usize) -> Binding {
        let fields: Vec<_> = oneof.fields().collect();
        let encoder = OneofSlotEncoder {
            variants: fields
                .iter()
                .map(|f| (f.clone(), self.encoder_of(&f.kind())))
                .collect(),
        };
        let decoder = OneofSlotDecoder {
            oneof: oneof.clone(),
            variants: fields
                .iter()
                .map(|f| (f.clone(), self.decoder_of(&f.kind())))
                .collect(),
        };
        Binding {
            slot: Slot::Oneof(oneof.clone()),
            levels: vec![level],
            from_names: vec![oneof.name().to_owned()],
            to_names: vec![oneof.name().to_owned()],
            omit_empty: true,
            encoder: Arc::new(encoder),
            decoder: Arc::new(decoder),
        }
    }

    fn field_value_encoder(&self, field: &FieldDescriptor) -> Arc<dyn ValEncoder> {
        let kind = field.kind();
        if field.is_map() {
            let Kind::Message(entry) = &kind else {
                return self.encoder_of(&kind);
            };
            let key_kind = entry.map_entry_key_field().kind();
            let value_kind = entry.map_entry_value_field().kind();
            let key_encoder: Arc<dyn ValEncoder> = match key_kind {
                Kind::String => self.encoder_of(&key_kind),
                _ => Arc::new(QuotedKeyEncoder {
                    elem: self.encoder_of(&key_kind),
                }),
            };
            let mut constructor = MapEncoderConstructor {
                elem_encoder: self.encoder_of(&value_kind),
                key_encoder,
                key_kind,
                value_kind,
                key_order: if self.config.sort_map_keys {
                    KeyOrder::Lexical
                } else {
                    KeyOrder::Unordered
                },
            };
            for ext in &self.extensions {
                ext.update_map_encoder_constructor(&mut constructor);
            }
            return Arc::new(MapEncoder::from(constructor));
        }
        if field.is_list() {
            return Arc::new(ListEncoder {
                elem: self.encoder_of(&kind),
            });
        }
        self.encoder_of(&kind)
    }

    fn field_value_decoder(&self, field: &FieldDescriptor) -> Arc<dyn ValDecoder> {
        let kind = field.kind();
        if field.is_map() {
            let Kind::Message(entry) = &kind else {
                return self.decoder_of(&kind);
            };
            let key_kind = entry.map_entry_key_field().kind();
            let value_kind = entry.map_entry_value_field().kind();
            return Arc::new(MapDecoder {
                elem: self.decoder_of(&value_kind),
                key_kind,
                value_kind,
            });
        }
        if field.is_list() {
            return Arc::new(ListDecoder {
                elem: self.decoder_of(&kind),
                kind,
            });
        }
        self.decoder_of(&kind)
    }
}

/// The oneof generated for a proto3 `optional` field.
fn is_synthetic(oneof: &OneofDescriptor) -> bool {
    oneof
        .fields()
        .all(|f| f.field_descriptor_proto().proto3_optional())
}
