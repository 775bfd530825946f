//! Ordering of map entries on output.

use std::cmp::Ordering;

use prost_reflect::{MapKey, Value};

use crate::{ProtoExtension, codec::MapEncoderConstructor};

/// How map entries are ordered when written.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrder {
    /// Iteration order of the underlying map.
    Unordered,
    /// By the rendered key text.
    #[default]
    Lexical,
    /// Integer keys by value, `false` before `true`, strings lexically.
    Numeric,
}

impl KeyOrder {
    pub(crate) fn sort(self, entries: &mut [(&MapKey, &Value)]) {
        match self {
            KeyOrder::Unordered => {}
            KeyOrder::Lexical => entries.sort_by(|a, b| key_text(a.0).cmp(&key_text(b.0))),
            KeyOrder::Numeric => entries.sort_by(|a, b| compare_numeric(a.0, b.0)),
        }
    }
}

fn key_text(key: &MapKey) -> String {
    match key {
        MapKey::Bool(v) => v.to_string(),
        MapKey::I32(v) => v.to_string(),
        MapKey::I64(v) => v.to_string(),
        MapKey::U32(v) => v.to_string(),
        MapKey::U64(v) => v.to_string(),
        MapKey::String(v) => v.clone(),
    }
}

fn compare_numeric(a: &MapKey, b: &MapKey) -> Ordering {
    match (a, b) {
        (MapKey::Bool(a), MapKey::Bool(b)) => a.cmp(b),
        (MapKey::I32(a), MapKey::I32(b)) => a.cmp(b),
        (MapKey::I64(a), MapKey::I64(b)) => a.cmp(b),
        (MapKey::U32(a), MapKey::U32(b)) => a.cmp(b),
        (MapKey::U64(a), MapKey::U64(b)) => a.cmp(b),
        (MapKey::String(a), MapKey::String(b)) => a.cmp(b),
        (a, b) => key_text(a).cmp(&key_text(b)),
    }
}

impl ProtoExtension {
    /// Order integer keys by value unless the engine leaves maps unsorted or
    /// string ordering was asked for.
    pub(crate) fn update_map_key_order(&self, c: &mut MapEncoderConstructor) {
        if c.key_order == KeyOrder::Lexical && !self.options().sort_map_keys_as_string {
            c.key_order = KeyOrder::Numeric;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(order: KeyOrder, keys: &[MapKey]) -> Vec<MapKey> {
        let value = Value::Bool(true);
        let mut entries: Vec<_> = keys.iter().map(|k| (k, &value)).collect();
        order.sort(&mut entries);
        entries.into_iter().map(|(k, _)| k.clone()).collect()
    }

    #[test]
    fn test_numeric_order() {
        let keys = [MapKey::I64(-1), MapKey::I64(-3), MapKey::I64(-2)];
        assert_eq!(
            sorted(KeyOrder::Numeric, &keys),
            [MapKey::I64(-3), MapKey::I64(-2), MapKey::I64(-1)]
        );
        assert_eq!(
            sorted(KeyOrder::Lexical, &keys),
            [MapKey::I64(-1), MapKey::I64(-2), MapKey::I64(-3)]
        );

        let keys = [MapKey::U32(188), MapKey::U32(20), MapKey::U32(10)];
        assert_eq!(
            sorted(KeyOrder::Numeric, &keys),
            [MapKey::U32(10), MapKey::U32(20), MapKey::U32(188)]
        );
        assert_eq!(
            sorted(KeyOrder::Lexical, &keys),
            [MapKey::U32(10), MapKey::U32(188), MapKey::U32(20)]
        );

        let keys = [MapKey::Bool(true), MapKey::Bool(false)];
        assert_eq!(
            sorted(KeyOrder::Numeric, &keys),
            [MapKey::Bool(false), MapKey::Bool(true)]
        );
    }
}
