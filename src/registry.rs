//! Message types with a dedicated JSON form.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock},
};

use prost_reflect::{DynamicMessage, MessageDescriptor};
use tracing::trace;

use crate::{
    Iter, ProtoExtension, ProtoOptions, Result, Stream,
    codec::{MessageDecoder, MessageEncoder},
    wkt,
};

/// Writes a message in its dedicated JSON form.
pub type EncodeFn = fn(&ProtoOptions, &DynamicMessage, &mut Stream<'_>) -> Result<()>;

/// Reads a message from its dedicated JSON form. `null` never reaches it,
/// except for `google.protobuf.Value`.
pub type DecodeFn = fn(&ProtoOptions, &mut DynamicMessage, &mut Iter<'_>) -> Result<()>;

/// An encode/decode pair for one message type.
#[derive(Clone, Copy)]
pub struct ProtoCodec {
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

impl fmt::Debug for ProtoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtoCodec").finish_non_exhaustive()
    }
}

/// Codecs keyed by message full name.
#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, ProtoCodec>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The codecs of the well-known types.
    pub fn well_known() -> &'static CodecRegistry {
        static WELL_KNOWN: OnceLock<CodecRegistry> = OnceLock::new();
        WELL_KNOWN.get_or_init(wkt::well_known_codecs)
    }

    /// Add or replace the codec of `full_name`.
    pub fn with(mut self, full_name: impl Into<String>, codec: ProtoCodec) -> Self {
        self.codecs.insert(full_name.into(), codec);
        self
    }

    pub fn lookup(&self, full_name: &str) -> Option<ProtoCodec> {
        self.codecs.get(full_name).copied()
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

/// Adapts a [`ProtoCodec`] to the engine.
pub(crate) struct RegisteredCodec {
    codec: ProtoCodec,
    options: Arc<ProtoOptions>,
    takes_null: bool,
}

impl MessageEncoder for RegisteredCodec {
    fn encode_message(&self, msg: &DynamicMessage, stream: &mut Stream<'_>) -> Result<()> {
        (self.codec.encode)(&self.options, msg, stream)
    }
}

impl MessageDecoder for RegisteredCodec {
    fn decode_message(&self, msg: &mut DynamicMessage, iter: &mut Iter<'_>) -> Result<()> {
        if !self.takes_null && iter.read_nil()? {
            return Ok(());
        }
        (self.codec.decode)(&self.options, msg, iter)
    }
}

impl ProtoExtension {
    pub(crate) fn create_codec(&self, desc: &MessageDescriptor) -> Option<Arc<RegisteredCodec>> {
        let codec = self.options().registry().lookup(desc.full_name())?;
        trace!(name = desc.full_name(), "using registered codec");
        Some(Arc::new(RegisteredCodec {
            codec,
            options: self.shared_options(),
            takes_null: desc.full_name() == wkt::VALUE,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known() {
        let registry = CodecRegistry::well_known();
        assert!(registry.lookup("google.protobuf.Timestamp").is_some());
        assert!(registry.lookup("google.protobuf.BoolValue").is_some());
        assert!(registry.lookup("google.protobuf.Empty").is_none());
        assert!(registry.lookup("test.v1.Message").is_none());

        let duration = registry.lookup("google.protobuf.Duration").unwrap();
        let custom = registry.clone().with("test.v1.Message", duration);
        assert_eq!(custom.len(), registry.len() + 1);
    }
}
