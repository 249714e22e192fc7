// Decoder and the three container kinds: keyed, sequence, single value.

use std::any::type_name;

use crate::wire::{sanitize, WireNumber, WireValue};

use super::decode::{Decode, WireInteger};
use super::error::DecodeError;
use super::path::{CodingPath, PathSegment};
use super::record::PositionalRecord;

/// Root-container policy switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Allow more than one container to be opened over the same node.
    pub multiple_root_containers: bool,
    /// Allow a bare scalar at the root instead of requiring a sequence.
    pub primitive_root_values: bool,
}

/// Entry point: decodes typed messages from wire trees or raw response text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PbliteDecoder {
    options: DecoderOptions,
}

impl PbliteDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DecoderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> DecoderOptions {
        self.options
    }

    pub fn decode<T: Decode>(&self, value: &WireValue) -> Result<T, DecodeError> {
        let is_container = matches!(value, WireValue::Sequence(_) | WireValue::Mapping(_));
        if !is_container && !self.options.primitive_root_values {
            return Err(DecodeError::DataCorrupted {
                path: CodingPath::root(),
                message: format!("root must be a sequence, found {}", value.describe()),
            });
        }
        let mut decoder = Decoder::new(value, CodingPath::root(), self.options);
        T::decode(&mut decoder)
    }

    /// Sanitize raw response text, drop its leading header marker and decode the rest.
    pub fn decode_response<T: Decode>(&self, text: &str) -> Result<T, DecodeError> {
        let mut items = sanitize(text)?;
        if items.is_empty() {
            return Err(DecodeError::DataCorrupted {
                path: CodingPath::root(),
                message: "response has no header marker".to_string(),
            });
        }
        items.remove(0);
        self.decode(&WireValue::Sequence(items))
    }
}

/// Decoding context for one node of the tree.
///
/// Hands out at most one container unless `multiple_root_containers` is set.
#[derive(Debug)]
pub struct Decoder<'a> {
    value: &'a WireValue,
    path: CodingPath,
    options: DecoderOptions,
    opened: bool,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(value: &'a WireValue, path: CodingPath, options: DecoderOptions) -> Self {
        Self { value, path, options, opened: false }
    }

    pub fn path(&self) -> &CodingPath {
        &self.path
    }

    pub fn value(&self) -> &'a WireValue {
        self.value
    }

    pub fn keyed(&mut self) -> Result<KeyedContainer<'a>, DecodeError> {
        self.claim()?;
        let record = match self.value {
            WireValue::Sequence(items) => PositionalRecord::from_sequence(items),
            WireValue::Mapping(entries) => PositionalRecord::from_mapping(entries).ok_or_else(
                || DecodeError::type_mismatch(self.path.clone(), "field-numbered mapping", self.value),
            )?,
            WireValue::Null => {
                return Err(DecodeError::value_not_found(self.path.clone(), "keyed container"))
            }
            other => return Err(DecodeError::type_mismatch(self.path.clone(), "sequence", other)),
        };
        Ok(KeyedContainer { record, path: self.path.clone(), options: self.options })
    }

    pub fn sequence(&mut self) -> Result<SequenceContainer<'a>, DecodeError> {
        self.claim()?;
        match self.value {
            WireValue::Sequence(items) => Ok(SequenceContainer {
                items,
                cursor: 0,
                path: self.path.clone(),
                options: self.options,
            }),
            WireValue::Null => {
                Err(DecodeError::value_not_found(self.path.clone(), "sequence container"))
            }
            other => Err(DecodeError::type_mismatch(self.path.clone(), "sequence", other)),
        }
    }

    pub fn single_value(&mut self) -> Result<SingleValueContainer<'a>, DecodeError> {
        self.claim()?;
        Ok(SingleValueContainer { value: self.value, path: self.path.clone(), options: self.options })
    }

    fn claim(&mut self) -> Result<(), DecodeError> {
        if self.opened && !self.options.multiple_root_containers {
            return Err(DecodeError::ContainerExhausted {
                path: self.path.clone(),
                message: "multiple containers not supported for one value".to_string(),
            });
        }
        self.opened = true;
        Ok(())
    }
}

/// Field-number addressed access to a message.
#[derive(Debug, Clone)]
pub struct KeyedContainer<'a> {
    record: PositionalRecord<'a>,
    path: CodingPath,
    options: DecoderOptions,
}

impl<'a> KeyedContainer<'a> {
    pub fn path(&self) -> &CodingPath {
        &self.path
    }

    pub fn record(&self) -> &PositionalRecord<'a> {
        &self.record
    }

    /// Field numbers holding a non-null value.
    pub fn fields(&self) -> Vec<u32> {
        self.record.fields().filter(|field| self.record.contains(*field)).collect()
    }

    pub fn contains(&self, field: u32) -> bool {
        self.record.contains(field)
    }

    /// True only when the field is stored as an explicit null.
    pub fn decode_nil(&self, field: u32) -> bool {
        matches!(self.record.get(field), Some(WireValue::Null))
    }

    /// Decode a field; absent or null falls back to [`Decode::absent`].
    pub fn decode<T: Decode>(&self, field: u32) -> Result<T, DecodeError> {
        match self.present(field) {
            Some(value) => T::decode(&mut self.child(field, value)),
            None => T::absent()
                .ok_or_else(|| DecodeError::value_not_found(self.field_path(field), type_name::<T>())),
        }
    }

    /// Decode a field, yielding `None` when it is absent or null.
    pub fn decode_optional<T: Decode>(&self, field: u32) -> Result<Option<T>, DecodeError> {
        self.present(field).map(|value| T::decode(&mut self.child(field, value))).transpose()
    }

    pub fn nested_keyed(&self, field: u32) -> Result<KeyedContainer<'a>, DecodeError> {
        let value = self.require(field, "keyed container")?;
        self.child(field, value).keyed()
    }

    pub fn nested_sequence(&self, field: u32) -> Result<SequenceContainer<'a>, DecodeError> {
        let value = self.require(field, "sequence container")?;
        self.child(field, value).sequence()
    }

    fn present(&self, field: u32) -> Option<&'a WireValue> {
        self.record.get(field).filter(|value| !value.is_null())
    }

    fn require(&self, field: u32, expected: &'static str) -> Result<&'a WireValue, DecodeError> {
        self.present(field).ok_or_else(|| DecodeError::value_not_found(self.field_path(field), expected))
    }

    fn field_path(&self, field: u32) -> CodingPath {
        self.path.child(PathSegment::Field(field))
    }

    fn child(&self, field: u32, value: &'a WireValue) -> Decoder<'a> {
        Decoder::new(value, self.field_path(field), self.options)
    }
}

/// Left-to-right access to the elements of a sequence.
#[derive(Debug, Clone)]
pub struct SequenceContainer<'a> {
    items: &'a [WireValue],
    cursor: usize,
    path: CodingPath,
    options: DecoderOptions,
}

impl<'a> SequenceContainer<'a> {
    pub fn path(&self) -> &CodingPath {
        &self.path
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn remaining(&self) -> usize {
        self.items.len() - self.cursor
    }

    pub fn current_index(&self) -> usize {
        self.cursor
    }

    pub fn is_at_end(&self) -> bool {
        self.cursor >= self.items.len()
    }

    pub fn decode<T: Decode>(&mut self) -> Result<T, DecodeError> {
        let (index, value) = self.advance(type_name::<T>())?;
        T::decode(&mut self.child(index, value))
    }

    /// Consume the current element if it is null.
    pub fn decode_nil(&mut self) -> Result<bool, DecodeError> {
        match self.items.get(self.cursor) {
            None => Err(self.exhausted("null")),
            Some(WireValue::Null) => {
                self.cursor += 1;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    pub fn nested_keyed(&mut self) -> Result<KeyedContainer<'a>, DecodeError> {
        let (index, value) = self.advance("keyed container")?;
        self.child(index, value).keyed()
    }

    pub fn nested_sequence(&mut self) -> Result<SequenceContainer<'a>, DecodeError> {
        let (index, value) = self.advance("sequence container")?;
        self.child(index, value).sequence()
    }

    fn advance(&mut self, expected: &str) -> Result<(usize, &'a WireValue), DecodeError> {
        let index = self.cursor;
        let value = self.items.get(index).ok_or_else(|| self.exhausted(expected))?;
        self.cursor += 1;
        Ok((index, value))
    }

    fn exhausted(&self, expected: &str) -> DecodeError {
        DecodeError::ContainerExhausted {
            path: self.path.clone(),
            message: format!(
                "expected {expected} at index {} but only {} elements exist",
                self.cursor,
                self.items.len()
            ),
        }
    }

    fn child(&self, index: usize, value: &'a WireValue) -> Decoder<'a> {
        Decoder::new(value, self.path.child(PathSegment::Index(index)), self.options)
    }
}

/// The whole current node as one value.
#[derive(Debug, Clone)]
pub struct SingleValueContainer<'a> {
    value: &'a WireValue,
    path: CodingPath,
    options: DecoderOptions,
}

impl<'a> SingleValueContainer<'a> {
    pub fn path(&self) -> &CodingPath {
        &self.path
    }

    pub fn value(&self) -> &'a WireValue {
        self.value
    }

    pub fn decode_nil(&self) -> bool {
        self.value.is_null()
    }

    pub fn decode_bool(&self) -> Result<bool, DecodeError> {
        match self.non_null("bool")? {
            WireValue::Bool(flag) => Ok(*flag),
            other => Err(DecodeError::type_mismatch(self.path.clone(), "bool", other)),
        }
    }

    pub fn decode_string(&self) -> Result<String, DecodeError> {
        match self.non_null("string")? {
            WireValue::String(text) => Ok(text.clone()),
            other => Err(DecodeError::type_mismatch(self.path.clone(), "string", other)),
        }
    }

    pub fn decode_float(&self) -> Result<f64, DecodeError> {
        match self.non_null("f64")? {
            WireValue::Number(number) => Ok(number.as_f64()),
            other => Err(DecodeError::type_mismatch(self.path.clone(), "f64", other)),
        }
    }

    /// Fixed-width integers accept JSON numbers and decimal strings.
    ///
    /// 64-bit values are sent as strings because JSON numbers lose precision
    /// above 2^53 on the producing side.
    pub fn decode_integer<T: WireInteger>(&self) -> Result<T, DecodeError> {
        let value = self.non_null(type_name::<T>())?;
        let parsed = match value {
            WireValue::Number(WireNumber::Int(number)) => <T as TryFrom<i64>>::try_from(*number).ok(),
            WireValue::Number(WireNumber::UInt(number)) => <T as TryFrom<u64>>::try_from(*number).ok(),
            WireValue::String(text) => text.parse::<T>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| DecodeError::type_mismatch(self.path.clone(), type_name::<T>(), value))
    }

    /// Decode a nested message from this node.
    pub fn decode<T: Decode>(&self) -> Result<T, DecodeError> {
        T::decode(&mut Decoder::new(self.value, self.path.clone(), self.options))
    }

    fn non_null(&self, expected: &'static str) -> Result<&'a WireValue, DecodeError> {
        if self.value.is_null() {
            return Err(DecodeError::value_not_found(self.path.clone(), expected));
        }
        Ok(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pblite::DecodeErrorKind;
    use serde_json::json;

    fn wire(value: serde_json::Value) -> WireValue {
        WireValue::from(value)
    }

    #[test]
    fn keyed_distinguishes_absent_null_and_present() {
        let value = wire(json!(["a", {"5": null, "6": 1}]));
        let mut decoder = Decoder::new(&value, CodingPath::root(), DecoderOptions::default());
        let keyed = decoder.keyed().expect("keyed");

        assert!(keyed.contains(1));
        assert!(!keyed.decode_nil(1));
        assert!(!keyed.contains(5));
        assert!(keyed.decode_nil(5));
        assert!(!keyed.contains(9));
        assert!(!keyed.decode_nil(9));
        assert_eq!(keyed.fields(), vec![1, 6]);
    }

    #[test]
    fn required_null_is_value_not_found() {
        let value = wire(json!([null, "x"]));
        let mut decoder = Decoder::new(&value, CodingPath::root(), DecoderOptions::default());
        let keyed = decoder.keyed().expect("keyed");

        let error = keyed.decode::<String>(1).expect_err("null field");
        assert_eq!(error.kind(), DecodeErrorKind::ValueNotFound);
        assert_eq!(error.path().to_string(), "$.1");
        assert_eq!(keyed.decode_optional::<String>(1).expect("optional"), None);
    }

    #[test]
    fn type_mismatch_reports_path_and_value() {
        let value = wire(json!([[1, "abc"]]));
        let mut decoder = Decoder::new(&value, CodingPath::root(), DecoderOptions::default());
        let keyed = decoder.keyed().expect("keyed");
        let mut inner = keyed.nested_sequence(1).expect("nested");

        assert_eq!(inner.decode::<u32>().expect("first"), 1);
        let error = inner.decode::<u32>().expect_err("second");
        match error {
            DecodeError::TypeMismatch { path, expected, found } => {
                assert_eq!(path.to_string(), "$.1[1]");
                assert_eq!(expected, "u32");
                assert!(found.contains("abc"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn nested_container_requires_sequence() {
        let value = wire(json!(["text"]));
        let mut decoder = Decoder::new(&value, CodingPath::root(), DecoderOptions::default());
        let keyed = decoder.keyed().expect("keyed");
        let error = keyed.nested_sequence(1).expect_err("string is not a sequence");
        assert_eq!(error.kind(), DecodeErrorKind::TypeMismatch);
    }

    #[test]
    fn sequence_past_end_is_exhausted() {
        let value = wire(json!([1]));
        let mut decoder = Decoder::new(&value, CodingPath::root(), DecoderOptions::default());
        let mut sequence = decoder.sequence().expect("sequence");
        assert_eq!(sequence.remaining(), 1);
        assert_eq!(sequence.decode::<i64>().expect("first"), 1);
        assert!(sequence.is_at_end());
        let error = sequence.decode::<i64>().expect_err("past end");
        assert_eq!(error.kind(), DecodeErrorKind::ContainerExhausted);
    }

    #[test]
    fn sequence_decode_nil_consumes_only_nulls() {
        let value = wire(json!([null, 2]));
        let mut decoder = Decoder::new(&value, CodingPath::root(), DecoderOptions::default());
        let mut sequence = decoder.sequence().expect("sequence");
        assert!(sequence.decode_nil().expect("null"));
        assert!(!sequence.decode_nil().expect("not null"));
        assert_eq!(sequence.current_index(), 1);
        assert_eq!(sequence.decode::<u8>().expect("value"), 2);
    }

    #[test]
    fn second_container_is_rejected_by_default() {
        let value = wire(json!([1]));
        let mut decoder = Decoder::new(&value, CodingPath::root(), DecoderOptions::default());
        decoder.keyed().expect("first container");
        let error = decoder.sequence().expect_err("second container");
        assert_eq!(error.kind(), DecodeErrorKind::ContainerExhausted);
        assert!(error.to_string().contains("multiple containers"));
    }

    #[test]
    fn relaxed_mode_allows_repeated_reads() {
        let value = wire(json!([1, 2]));
        let options = DecoderOptions { multiple_root_containers: true, ..Default::default() };
        let mut decoder = Decoder::new(&value, CodingPath::root(), options);
        let keyed = decoder.keyed().expect("keyed");
        let mut sequence = decoder.sequence().expect("sequence");
        assert_eq!(keyed.decode::<u8>(2).expect("field 2"), 2);
        assert_eq!(sequence.decode::<u8>().expect("index 0"), 1);
    }

    #[test]
    fn root_scalar_requires_primitive_mode() {
        let value = wire(json!("42"));
        let error = PbliteDecoder::new().decode::<u64>(&value).expect_err("scalar root");
        assert_eq!(error.kind(), DecodeErrorKind::DataCorrupted);

        let decoder = PbliteDecoder::with_options(DecoderOptions {
            primitive_root_values: true,
            ..Default::default()
        });
        assert_eq!(decoder.decode::<u64>(&value).expect("scalar"), 42);
    }

    #[test]
    fn integer_range_is_checked() {
        let value = wire(json!(300));
        let decoder = PbliteDecoder::with_options(DecoderOptions {
            primitive_root_values: true,
            ..Default::default()
        });
        let error = decoder.decode::<u8>(&value).expect_err("overflow");
        assert_eq!(error.kind(), DecodeErrorKind::TypeMismatch);
        assert_eq!(decoder.decode::<i16>(&value).expect("fits"), 300);
    }

    #[test]
    fn decode_response_drops_header_marker() {
        let fields: Vec<u64> = PbliteDecoder::new()
            .decode_response(r#"["csanerp",1,,"3"]"#)
            .map(|values: Vec<Option<u64>>| values.into_iter().flatten().collect())
            .expect("response");
        assert_eq!(fields, vec![1, 3]);
    }
}
