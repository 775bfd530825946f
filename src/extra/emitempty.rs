use std::{fmt, sync::Arc};

use prost_reflect::DynamicMessage;

use crate::{
    Extension, Result, Stream,
    binding::{Binding, FieldEncoder, StructDescriptor},
};

/// Writes a binding even when it is empty, unless the wrapped encoder is
/// immune.
pub struct EmitEmptyEncoder {
    elem: Arc<dyn FieldEncoder>,
}

impl EmitEmptyEncoder {
    pub fn new(elem: Arc<dyn FieldEncoder>) -> Self {
        Self { elem }
    }
}

impl FieldEncoder for EmitEmptyEncoder {
    fn encode(&self, msg: &DynamicMessage, stream: &mut Stream<'_>) -> Result<()> {
        self.elem.encode(msg, stream)
    }

    fn is_empty(&self, msg: &DynamicMessage) -> bool {
        self.elem.immune_to_emit_empty() && self.elem.is_empty(msg)
    }

    fn is_embedded_nil(&self, msg: &DynamicMessage) -> bool {
        self.elem.is_embedded_nil(msg)
    }

    fn immune_to_emit_empty(&self) -> bool {
        self.elem.immune_to_emit_empty()
    }
}

/// Marks an encoder whose emptiness [`EmitEmptyEncoder`] must respect.
pub struct ImmunityEmitEmptyEncoder {
    elem: Arc<dyn FieldEncoder>,
}

impl ImmunityEmitEmptyEncoder {
    pub fn new(elem: Arc<dyn FieldEncoder>) -> Self {
        Self { elem }
    }
}

impl FieldEncoder for ImmunityEmitEmptyEncoder {
    fn encode(&self, msg: &DynamicMessage, stream: &mut Stream<'_>) -> Result<()> {
        self.elem.encode(msg, stream)
    }

    fn is_empty(&self, msg: &DynamicMessage) -> bool {
        self.elem.is_empty(msg)
    }

    fn is_embedded_nil(&self, msg: &DynamicMessage) -> bool {
        self.elem.is_embedded_nil(msg)
    }

    fn immune_to_emit_empty(&self) -> bool {
        true
    }
}

type Filter = dyn Fn(&Binding) -> bool + Send + Sync;

/// Writes empty fields of every message, or of the bindings accepted by a
/// filter.
#[derive(Default)]
pub struct EmitEmptyExtension {
    filter: Option<Box<Filter>>,
}

impl fmt::Debug for EmitEmptyExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitEmptyExtension")
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl EmitEmptyExtension {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: impl Fn(&Binding) -> bool + Send + Sync + 'static) -> Self {
        Self {
            filter: Some(Box::new(filter)),
        }
    }
}

impl Extension for EmitEmptyExtension {
    fn update_struct_descriptor(&self, descriptor: &mut StructDescriptor) {
        for binding in &mut descriptor.fields {
            if self.filter.as_ref().is_some_and(|filter| !filter(binding)) {
                continue;
            }
            binding.encoder = Arc::new(EmitEmptyEncoder::new(binding.encoder.clone()));
        }
    }
}
