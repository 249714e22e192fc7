use std::collections::BTreeMap;

use crate::wire::WireValue;

/// Sparse field-number view over a positional sequence.
///
/// Slot `i` becomes field `i + 1`; null slots are not stored. When the last
/// slot is a mapping whose keys are all field numbers, it is an extension
/// block: its entries are merged in by key and the slot itself is dropped.
/// Extension entries keep explicit nulls so `decode_nil` can see them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionalRecord<'a> {
    fields: BTreeMap<u32, &'a WireValue>,
}

impl<'a> PositionalRecord<'a> {
    pub fn from_sequence(items: &'a [WireValue]) -> Self {
        let mut fields = BTreeMap::new();
        for (index, value) in items.iter().enumerate() {
            if !value.is_null() {
                fields.insert(field_number(index), value);
            }
        }

        if let Some(WireValue::Mapping(extension)) = items.last() {
            if is_extension_block(extension) {
                fields.remove(&field_number(items.len() - 1));
                merge_numeric_keys(&mut fields, extension);
            }
        }

        Self { fields }
    }

    /// Open a mapping keyed by numeric strings (`{"2": .., "3": ..}`) as a record.
    ///
    /// Returns `None` when any key is not a field number.
    pub fn from_mapping(entries: &'a BTreeMap<String, WireValue>) -> Option<Self> {
        if !is_extension_block(entries) {
            return None;
        }
        let mut fields = BTreeMap::new();
        merge_numeric_keys(&mut fields, entries);
        Some(Self { fields })
    }

    /// Stored value for `field`, which may be an explicit null.
    pub fn get(&self, field: u32) -> Option<&'a WireValue> {
        self.fields.get(&field).copied()
    }

    /// Present and non-null.
    pub fn contains(&self, field: u32) -> bool {
        self.get(field).is_some_and(|value| !value.is_null())
    }

    pub fn fields(&self) -> impl Iterator<Item = u32> + '_ {
        self.fields.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

fn field_number(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

fn is_extension_block(entries: &BTreeMap<String, WireValue>) -> bool {
    entries.keys().all(|key| parse_field_key(key).is_some())
}

fn parse_field_key(key: &str) -> Option<u32> {
    key.parse::<u32>().ok().filter(|field| *field > 0)
}

fn merge_numeric_keys<'a>(
    fields: &mut BTreeMap<u32, &'a WireValue>,
    entries: &'a BTreeMap<String, WireValue>,
) {
    for (key, value) in entries {
        if let Some(field) = parse_field_key(key) {
            fields.insert(field, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seq(value: serde_json::Value) -> Vec<WireValue> {
        match WireValue::from(value) {
            WireValue::Sequence(items) => items,
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn positions_map_to_one_based_fields() {
        let items = seq(json!(["a", null, 7]));
        let record = PositionalRecord::from_sequence(&items);
        assert_eq!(record.get(1), Some(&WireValue::from("a")));
        assert_eq!(record.get(2), None);
        assert_eq!(record.get(3), Some(&WireValue::int(7)));
        assert_eq!(record.fields().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn trailing_numeric_mapping_is_extension_block() {
        let items = seq(json!(["a", {"10": "ten", "11": null}]));
        let record = PositionalRecord::from_sequence(&items);
        assert_eq!(record.get(2), None);
        assert_eq!(record.get(10), Some(&WireValue::from("ten")));
        assert_eq!(record.get(11), Some(&WireValue::Null));
        assert!(!record.contains(11));
    }

    #[test]
    fn trailing_mapping_with_named_keys_is_plain_field() {
        let items = seq(json!(["a", {"name": 1}]));
        let record = PositionalRecord::from_sequence(&items);
        assert!(record.contains(2));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn extension_entries_override_positions() {
        let items = seq(json!(["old", {"1": "new"}]));
        let record = PositionalRecord::from_sequence(&items);
        assert_eq!(record.get(1), Some(&WireValue::from("new")));
    }

    #[test]
    fn mapping_record_requires_numeric_keys() {
        let numeric = match WireValue::from(json!({"2": "b", "3": "c"})) {
            WireValue::Mapping(entries) => entries,
            _ => unreachable!(),
        };
        let record = PositionalRecord::from_mapping(&numeric).expect("numeric keys");
        assert_eq!(record.get(3), Some(&WireValue::from("c")));

        let named = match WireValue::from(json!({"p": "x"})) {
            WireValue::Mapping(entries) => entries,
            _ => unreachable!(),
        };
        assert!(PositionalRecord::from_mapping(&named).is_none());
    }
}
