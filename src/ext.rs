//! The protobuf extension: options and hook dispatch.

use std::{fmt, sync::Arc};

use prost_reflect::{Kind, MessageDescriptor};
use serde::Deserialize;

use crate::{
    CodecRegistry, Extension, TypeResolver,
    binding::{Slot, StructDescriptor, StructDescriptorConstructor},
    codec::{MapEncoderConstructor, MessageDecoder, MessageEncoder, ValDecoder, ValEncoder},
    enums::ProtoEnumCodec,
    extra::EmitEmptyEncoder,
};

/// How permitted invalid UTF-8 is turned into a Rust string on input.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidUtf8 {
    /// Replace invalid sequences with U+FFFD.
    #[default]
    Lossy,
    /// Escape invalid bytes with STFU-8 (`\xff`), keeping them recoverable.
    #[cfg(feature = "stfu8")]
    Stfu8,
}

impl InvalidUtf8 {
    pub(crate) fn render(self, bytes: &[u8]) -> String {
        match self {
            InvalidUtf8::Lossy => String::from_utf8_lossy(bytes).into_owned(),
            #[cfg(feature = "stfu8")]
            InvalidUtf8::Stfu8 => stfu8::encode_u8(bytes),
        }
    }
}

/// Switches of the protobuf JSON mapping.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProtoOptions {
    /// Write every field, including unset ones. Unset proto3 `optional`
    /// fields stay omitted.
    pub emit_unpopulated: bool,
    /// Write enums as numbers instead of names.
    pub use_enum_numbers: bool,
    /// Write proto field names instead of lowerCamelCase JSON names.
    pub use_proto_names: bool,
    /// Resolves `Any` type URLs. Defaults to the pool of the `Any` message.
    #[serde(skip)]
    pub resolver: Option<Arc<dyn TypeResolver>>,
    /// Write 64-bit integers as bare numbers instead of strings.
    pub encode_64bit_as_integer: bool,
    /// Order map keys by their text even when they are integers.
    pub sort_map_keys_as_string: bool,
    /// Accept strings holding invalid UTF-8.
    pub permit_invalid_utf8: bool,
    /// Rendering of permitted invalid UTF-8.
    pub invalid_utf8: InvalidUtf8,
    /// Only accept the canonical JSON shape of each scalar.
    pub disable_fuzzy_decode: bool,
    /// Codecs of specially handled message types. Defaults to the
    /// well-known types.
    #[serde(skip)]
    pub registry: Option<Arc<CodecRegistry>>,
}

impl fmt::Debug for ProtoOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtoOptions")
            .field("emit_unpopulated", &self.emit_unpopulated)
            .field("use_enum_numbers", &self.use_enum_numbers)
            .field("use_proto_names", &self.use_proto_names)
            .field("resolver", &self.resolver.as_ref().map(|_| ".."))
            .field("encode_64bit_as_integer", &self.encode_64bit_as_integer)
            .field("sort_map_keys_as_string", &self.sort_map_keys_as_string)
            .field("permit_invalid_utf8", &self.permit_invalid_utf8)
            .field("invalid_utf8", &self.invalid_utf8)
            .field("disable_fuzzy_decode", &self.disable_fuzzy_decode)
            .field("registry", &self.registry.as_ref().map(|r| r.len()))
            .finish()
    }
}

impl ProtoOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_emit_unpopulated(mut self, v: bool) -> Self {
        self.emit_unpopulated = v;
        self
    }

    pub fn with_use_enum_numbers(mut self, v: bool) -> Self {
        self.use_enum_numbers = v;
        self
    }

    pub fn with_use_proto_names(mut self, v: bool) -> Self {
        self.use_proto_names = v;
        self
    }

    pub fn with_resolver(mut self, resolver: impl TypeResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_encode_64bit_as_integer(mut self, v: bool) -> Self {
        self.encode_64bit_as_integer = v;
        self
    }

    pub fn with_sort_map_keys_as_string(mut self, v: bool) -> Self {
        self.sort_map_keys_as_string = v;
        self
    }

    pub fn with_permit_invalid_utf8(mut self, v: bool) -> Self {
        self.permit_invalid_utf8 = v;
        self
    }

    pub fn with_invalid_utf8(mut self, v: InvalidUtf8) -> Self {
        self.invalid_utf8 = v;
        self
    }

    pub fn with_disable_fuzzy_decode(mut self, v: bool) -> Self {
        self.disable_fuzzy_decode = v;
        self
    }

    pub fn with_registry(mut self, registry: CodecRegistry) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    pub(crate) fn registry(&self) -> &CodecRegistry {
        match &self.registry {
            Some(registry) => registry.as_ref(),
            None => CodecRegistry::well_known(),
        }
    }
}

/// Canonical protobuf JSON mapping as an [`Extension`].
#[derive(Debug, Clone, Default)]
pub struct ProtoExtension {
    options: Arc<ProtoOptions>,
}

impl ProtoExtension {
    pub fn new(options: ProtoOptions) -> Self {
        Self {
            options: Arc::new(options),
        }
    }

    pub fn options(&self) -> &ProtoOptions {
        &self.options
    }

    pub(crate) fn shared_options(&self) -> Arc<ProtoOptions> {
        self.options.clone()
    }
}

impl Extension for ProtoExtension {
    fn create_message_encoder(&self, desc: &MessageDescriptor) -> Option<Arc<dyn MessageEncoder>> {
        self.create_codec(desc).map(|c| c as Arc<dyn MessageEncoder>)
    }

    fn create_message_decoder(&self, desc: &MessageDescriptor) -> Option<Arc<dyn MessageDecoder>> {
        self.create_codec(desc).map(|c| c as Arc<dyn MessageDecoder>)
    }

    fn create_encoder(&self, kind: &Kind) -> Option<Arc<dyn ValEncoder>> {
        match kind {
            Kind::Enum(desc) => Some(Arc::new(ProtoEnumCodec::new(desc.clone(), self.shared_options()))),
            _ => None,
        }
    }

    fn create_decoder(&self, kind: &Kind) -> Option<Arc<dyn ValDecoder>> {
        match kind {
            Kind::Enum(desc) => Some(Arc::new(ProtoEnumCodec::new(desc.clone(), self.shared_options()))),
            _ => None,
        }
    }

    fn decorate_encoder(&self, kind: &Kind, encoder: Arc<dyn ValEncoder>) -> Arc<dyn ValEncoder> {
        self.decorate_scalar_encoder(kind, encoder)
    }

    fn decorate_decoder(&self, kind: &Kind, decoder: Arc<dyn ValDecoder>) -> Arc<dyn ValDecoder> {
        let decoder = self.decorate_scalar_decoder(kind, decoder);
        self.decorate_decoder_for_nil(kind, decoder)
    }

    fn update_map_encoder_constructor(&self, constructor: &mut MapEncoderConstructor) {
        self.update_map_key_encoder(constructor);
        self.update_map_key_order(constructor);
    }

    fn update_struct_descriptor_constructor(&self, constructor: &mut StructDescriptorConstructor<'_>) {
        self.flatten_oneofs(constructor);
    }

    fn update_struct_descriptor(&self, descriptor: &mut StructDescriptor) {
        for binding in &mut descriptor.fields {
            let Slot::Field(field) = &binding.slot else {
                continue;
            };
            let proto_name = field.name().to_owned();
            let json_name = field.json_name().to_owned();
            let (emitted, alias) = if self.options.use_proto_names {
                (proto_name, json_name)
            } else {
                (json_name, proto_name)
            };
            binding.from_names = if alias == emitted {
                vec![emitted.clone()]
            } else {
                vec![emitted.clone(), alias]
            };
            binding.to_names = vec![emitted];

            if self.options.emit_unpopulated {
                binding.encoder = Arc::new(EmitEmptyEncoder::new(binding.encoder.clone()));
            }
        }
    }
}
