//! Optional extensions that work with any engine.

mod emitempty;

pub use emitempty::{EmitEmptyEncoder, EmitEmptyExtension, ImmunityEmitEmptyEncoder};
