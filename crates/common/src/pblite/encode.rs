use std::collections::BTreeMap;

use crate::wire::{WireNumber, WireValue};

/// A type that can be written in positional form.
pub trait Encode {
    fn encode(&self) -> WireValue;
}

/// Highest field number written positionally. Larger ones go to the
/// trailing extension block.
pub const MAX_POSITIONAL_FIELD: u32 = 1024;

/// Builds a positional sequence: field `k` lands at index `k - 1`.
///
/// Gaps are filled with null and trailing nulls are trimmed, so the output
/// matches what the server sends for the same message. Fields above
/// [`MAX_POSITIONAL_FIELD`] are collected into a trailing `{"<field>": value}`
/// mapping, which the decoder merges back in by key.
#[derive(Debug, Default)]
pub struct PositionalWriter {
    slots: Vec<WireValue>,
    extension: BTreeMap<String, WireValue>,
}

impl PositionalWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<T: Encode + ?Sized>(&mut self, field: u32, value: &T) -> &mut Self {
        debug_assert!(field > 0, "field numbers start at 1");
        let encoded = value.encode();
        if encoded.is_null() || field == 0 {
            return self;
        }
        if field > MAX_POSITIONAL_FIELD {
            self.extension.insert(field.to_string(), encoded);
            return self;
        }
        let index = (field - 1) as usize;
        if self.slots.len() <= index {
            self.slots.resize(index + 1, WireValue::Null);
        }
        self.slots[index] = encoded;
        self
    }

    pub fn finish(mut self) -> WireValue {
        while self.slots.last().is_some_and(WireValue::is_null) {
            self.slots.pop();
        }
        if !self.extension.is_empty() {
            self.slots.push(WireValue::Mapping(self.extension));
        } else if matches!(self.slots.last(), Some(WireValue::Mapping(_))) {
            // A trailing mapping would be read back as an extension block.
            self.slots.push(WireValue::Mapping(BTreeMap::new()));
        }
        WireValue::Sequence(self.slots)
    }
}

macro_rules! impl_encode_number {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self) -> WireValue {
                    WireValue::Number(WireNumber::Int(i64::from(*self)))
                }
            }
        )*
    };
}

impl_encode_number!(i8, i16, i32, u8, u16, u32);

// 64-bit values travel as decimal strings.
impl Encode for i64 {
    fn encode(&self) -> WireValue {
        WireValue::String(self.to_string())
    }
}

impl Encode for u64 {
    fn encode(&self) -> WireValue {
        WireValue::String(self.to_string())
    }
}

impl Encode for bool {
    fn encode(&self) -> WireValue {
        WireValue::Bool(*self)
    }
}

impl Encode for f64 {
    fn encode(&self) -> WireValue {
        WireValue::Number(WireNumber::Float(*self))
    }
}

impl Encode for str {
    fn encode(&self) -> WireValue {
        WireValue::String(self.to_string())
    }
}

impl Encode for String {
    fn encode(&self) -> WireValue {
        WireValue::String(self.clone())
    }
}

impl Encode for WireValue {
    fn encode(&self) -> WireValue {
        self.clone()
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self) -> WireValue {
        self.as_ref().map_or(WireValue::Null, Encode::encode)
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self) -> WireValue {
        WireValue::Sequence(self.iter().map(Encode::encode).collect())
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self) -> WireValue {
        (**self).encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fields_land_at_their_positions() {
        let mut writer = PositionalWriter::new();
        writer.field(1, "a").field(3, &7u32).field(5, &Option::<String>::None);
        assert_eq!(writer.finish(), WireValue::from(json!(["a", null, 7])));
    }

    #[test]
    fn wide_integers_are_strings() {
        let mut writer = PositionalWriter::new();
        writer.field(1, &1_000_000_000_000u64).field(2, &-5i64);
        assert_eq!(writer.finish(), WireValue::from(json!(["1000000000000", "-5"])));
    }

    #[test]
    fn high_field_numbers_go_to_extension_block() {
        let mut writer = PositionalWriter::new();
        writer.field(1, "a").field(4_000_000_000, &7u32);
        assert_eq!(writer.finish(), WireValue::from(json!(["a", {"4000000000": 7}])));
    }

    #[test]
    fn extension_block_follows_trailing_mapping() {
        let mut writer = PositionalWriter::new();
        writer.field(1, &WireValue::from(json!({"7": 1}))).field(MAX_POSITIONAL_FIELD + 1, "x");
        let key = (MAX_POSITIONAL_FIELD + 1).to_string();
        assert_eq!(writer.finish(), WireValue::from(json!([{"7": 1}, {key: "x"}])));
    }

    #[test]
    fn trailing_mapping_is_guarded() {
        let mut writer = PositionalWriter::new();
        writer.field(1, &WireValue::from(json!({"7": 1})));
        assert_eq!(writer.finish(), WireValue::from(json!([{"7": 1}, {}])));
    }
}
