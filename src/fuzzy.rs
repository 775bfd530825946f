//! Lenient scalar decoding.
//!
//! Numbers are accepted as strings and strings as numbers, booleans as `0`
//! and `1`, and integral floats such as `1.0` for integer fields.

use std::sync::Arc;

use prost_reflect::{Kind, Value};

use crate::{Error, Iter, Result, codec::ValDecoder, iter::ValueType, scalar::float_value};

/// Strings also accept a bare number literal, taken verbatim, and `null`.
pub(crate) struct FuzzyStringDecoder {
    pub elem: Arc<dyn ValDecoder>,
}

impl ValDecoder for FuzzyStringDecoder {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        match iter.what_is_next() {
            ValueType::Number => {
                *value = Value::String(iter.read_number()?.to_owned());
                Ok(())
            }
            ValueType::Nil => {
                iter.skip()?;
                *value = Value::String(String::new());
                Ok(())
            }
            _ => self.elem.decode(value, iter),
        }
    }
}

/// Normalize the next token into number text for integer and bool targets.
fn numeric_text(iter: &mut Iter<'_>, target: &str) -> Result<String> {
    let text = match iter.what_is_next() {
        ValueType::Number => iter.read_number()?.to_owned(),
        ValueType::String => match iter.read_string()?.as_str() {
            "true" => "1".to_owned(),
            "false" => "0".to_owned(),
            s => s.to_owned(),
        },
        ValueType::Bool => if iter.read_bool()? { "1" } else { "0" }.to_owned(),
        ValueType::Nil => {
            iter.skip()?;
            "0".to_owned()
        }
        _ => return Err(Error::format(target, "not number or string")),
    };
    Ok(if text.is_empty() { "0".to_owned() } else { text })
}

fn is_float_text(text: &str) -> bool {
    text.contains(['.', 'e', 'E'])
}

#[derive(Debug, Clone, Copy)]
enum IntTarget {
    I32,
    I64,
    U32,
    U64,
}

impl IntTarget {
    fn label(self) -> &'static str {
        match self {
            IntTarget::I32 => "int32",
            IntTarget::I64 => "int64",
            IntTarget::U32 => "uint32",
            IntTarget::U64 => "uint64",
        }
    }

    /// Convert an integral float, rejecting values outside the target.
    fn from_f64(self, f: f64) -> Result<Value> {
        let (min, max_exclusive) = match self {
            IntTarget::I32 => (f64::from(i32::MIN), f64::from(i32::MAX) + 1.0),
            IntTarget::U32 => (0.0, f64::from(u32::MAX) + 1.0),
            IntTarget::I64 => (-9_223_372_036_854_775_808.0, 9_223_372_036_854_775_808.0),
            IntTarget::U64 => (0.0, 18_446_744_073_709_551_616.0),
        };
        if !(min..max_exclusive).contains(&f) {
            return Err(Error::range(self.label(), format!("{f} exceed range")));
        }
        Ok(match self {
            IntTarget::I32 => Value::I32(f as i32),
            IntTarget::I64 => Value::I64(f as i64),
            IntTarget::U32 => Value::U32(f as u32),
            IntTarget::U64 => Value::U64(f as u64),
        })
    }
}

pub(crate) struct FuzzyIntegerDecoder {
    elem: Arc<dyn ValDecoder>,
    target: IntTarget,
}

impl FuzzyIntegerDecoder {
    pub(crate) fn new(kind: &Kind, elem: Arc<dyn ValDecoder>) -> Self {
        let target = match kind {
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => IntTarget::I64,
            Kind::Uint32 | Kind::Fixed32 => IntTarget::U32,
            Kind::Uint64 | Kind::Fixed64 => IntTarget::U64,
            _ => IntTarget::I32,
        };
        Self { elem, target }
    }
}

impl ValDecoder for FuzzyIntegerDecoder {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        let text = numeric_text(iter, self.target.label())?;
        let mut sub = iter.borrow(text.as_bytes());
        if is_float_text(&text) {
            let f = sub.read_f64()?;
            if f.fract() != 0.0 {
                return Err(Error::range(self.target.label(), format!("{text} found frac")));
            }
            *value = self.target.from_f64(f)?;
        } else {
            self.elem.decode(value, &mut sub)?;
        }
        sub.ensure_end()
    }
}

pub(crate) struct FuzzyBoolDecoder {
    pub elem: Arc<dyn ValDecoder>,
}

impl ValDecoder for FuzzyBoolDecoder {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        if iter.what_is_next() == ValueType::Bool {
            return self.elem.decode(value, iter);
        }
        let text = numeric_text(iter, "bool")?;
        let mut sub = iter.borrow(text.as_bytes());
        let v = if is_float_text(&text) {
            let f = sub.read_f64()?;
            if f == 1.0 {
                true
            } else if f == 0.0 {
                false
            } else {
                return Err(Error::range("bool", format!("{text} exceed range")));
            }
        } else {
            match sub.read_int::<i64>("bool")? {
                1 => true,
                0 => false,
                n => return Err(Error::format("bool", format!("invalid bool({n})"))),
            }
        };
        sub.ensure_end()?;
        *value = Value::Bool(v);
        Ok(())
    }
}

/// Floats also accept numeric strings, booleans and `null`.
pub(crate) struct FuzzyFloatDecoder {
    pub elem: Arc<dyn ValDecoder>,
    pub single: bool,
}

impl ValDecoder for FuzzyFloatDecoder {
    fn decode(&self, value: &mut Value, iter: &mut Iter<'_>) -> Result<()> {
        match iter.what_is_next() {
            ValueType::String => {
                let text = match iter.read_string()?.as_str() {
                    "true" => "1".to_owned(),
                    "false" | "" => "0".to_owned(),
                    s => s.to_owned(),
                };
                let mut sub = iter.borrow(text.as_bytes());
                self.elem.decode(value, &mut sub)?;
                sub.ensure_end()
            }
            ValueType::Bool => {
                let v = if iter.read_bool()? { 1.0 } else { 0.0 };
                *value = float_value(self.single, v);
                Ok(())
            }
            ValueType::Nil => {
                iter.skip()?;
                *value = float_value(self.single, 0.0);
                Ok(())
            }
            _ => self.elem.decode(value, iter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_target_from_f64() {
        assert_eq!(IntTarget::I32.from_f64(-2.0).unwrap(), Value::I32(-2));
        assert_eq!(IntTarget::U64.from_f64(4.0).unwrap(), Value::U64(4));
        assert!(IntTarget::U32.from_f64(-1.0).is_err());
        assert!(IntTarget::I32.from_f64(2147483648.0).is_err());
        assert!(IntTarget::I64.from_f64(9.3e18).is_err());
        assert!(IntTarget::U64.from_f64(1.9e19).is_err());
    }

    #[test]
    fn test_is_float_text() {
        assert!(is_float_text("1.0"));
        assert!(is_float_text("1e3"));
        assert!(!is_float_text("-12"));
    }
}
