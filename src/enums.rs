//! Enum values by name.

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use prost_reflect::{EnumDescriptor, Value};

use crate::{
    Error, Iter, ProtoOptions, Result, Stream,
    codec::{ValDecoder, ValEncoder, mismatch},
    iter::ValueType,
    wkt::NULL_VALUE,
};

struct EnumTable {
    names: HashMap<i32, String>,
    numbers: HashMap<String, i32>,
}

impl EnumTable {
    fn new(desc: &EnumDescriptor) -> Self {
        let mut names = HashMap::new();
        let mut numbers = HashMap::new();
        for value in desc.values() {
            // aliases share a number; the first declared name is written
            names.entry(value.number()).or_insert_with(|| value.name().to_owned());
            numbers.insert(value.name().to_owned(), value.number());
        }
        Self { names, numbers }
    }
}

/// Writes enums by name and reads names or numbers.
///
/// Numbers without a declared name are written as numbers.
/// `google.protobuf.NullValue` is always written as `null`.
pub(crate) struct ProtoEnumCodec {
    desc: EnumDescriptor,
    options: Arc<ProtoOptions>,
    table: OnceLock<EnumTable>,
}

impl ProtoEnumCodec {
    pub(crate) fn new(desc: EnumDescriptor, options: Arc<ProtoOptions>) -> Self {
        Self {
            desc,
            options,
            table: OnceLock::new(),
        }
    }

    fn table(&self) -> &EnumTable {
        self.table.get_or_init(|| EnumTable::new(&self.desc))
    }

    fn number_of(&self, name: &str) -> Result<i32> {
        if let Some(&n) = self.table().numbers.get(name) {
            return Ok(n);
        }
        if !self.options.disable_fuzzy_decode {
            if let Ok(n) = name.parse::<i32>() {
                return Ok(n);
            }
        }
        Err(Error::format(
            self.desc.full_name(),
            format!("invalid enum value {name:?}"),
        ))
    }
}

impl ValEncoder for ProtoEnumCodec {
    fn encode(&self, value: &Value, stream: &mut Stream<'_>) -> Result<()> {
        let Value::EnumNumber(n) = value else {
            return Err(mismatch(self.desc.full_name(), value));
        };
        if self.desc.full_name() == NULL_VALUE {
            stream.write_nil();
        } else if self.options.use_enum_numbers {
            stream.write_i32(*n);
        } else {
            match self.table().names.get(n) {
                Some(name) => stream.write_string(name),
                None => stream.write_i32(*n),
            }
        }
        Ok(())
    }
}

impl ValDecoder for ProtoEnumCodec {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        let n = match iter.what_is_next() {
            ValueType::Nil => {
                iter.skip()?;
                0
            }
            ValueType::Number => iter.read_int::<i32>(self.desc.full_name())?,
            ValueType::String => self.number_of(&iter.read_string()?)?,
            _ => {
                return Err(Error::format(
                    self.desc.full_name(),
                    "expect enum name or number",
                ));
            }
        };
        *value = Value::EnumNumber(n);
        Ok(())
    }
}
