use std::str::FromStr;

use crate::wire::WireValue;

use super::decoder::Decoder;
use super::error::DecodeError;

/// A type that can be read out of a PBLite tree.
///
/// Message types implement this through `pblite_message!`, which maps each
/// field number to a keyed-container read.
pub trait Decode: Sized {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, DecodeError>;

    /// Value to use when a keyed field is absent or null.
    ///
    /// `None` makes the field required.
    fn absent() -> Option<Self> {
        None
    }
}

/// Fixed-width integers that may arrive as JSON numbers or decimal strings.
pub trait WireInteger: Copy + FromStr + TryFrom<i64> + TryFrom<u64> {}

macro_rules! impl_wire_integer {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WireInteger for $ty {}

            impl Decode for $ty {
                fn decode(decoder: &mut Decoder<'_>) -> Result<Self, DecodeError> {
                    decoder.single_value()?.decode_integer::<$ty>()
                }
            }
        )*
    };
}

impl_wire_integer!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

impl Decode for bool {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        decoder.single_value()?.decode_bool()
    }
}

impl Decode for String {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        decoder.single_value()?.decode_string()
    }
}

impl Decode for f64 {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        decoder.single_value()?.decode_float()
    }
}

impl Decode for f32 {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        decoder.single_value()?.decode_float().map(|value| value as f32)
    }
}

/// Raw passthrough for fields whose schema is not modelled.
impl Decode for WireValue {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        Ok(decoder.single_value()?.value().clone())
    }

    fn absent() -> Option<Self> {
        Some(WireValue::Null)
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        if decoder.value().is_null() {
            return Ok(None);
        }
        T::decode(decoder).map(Some)
    }

    fn absent() -> Option<Self> {
        Some(None)
    }
}

/// Repeated fields: an absent or null slot is an empty list.
impl<T: Decode> Decode for Vec<T> {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let mut sequence = decoder.sequence()?;
        let mut out = Vec::with_capacity(sequence.remaining());
        while !sequence.is_at_end() {
            out.push(sequence.decode::<T>()?);
        }
        Ok(out)
    }

    fn absent() -> Option<Self> {
        Some(Vec::new())
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode(decoder: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        T::decode(decoder).map(Box::new)
    }

    fn absent() -> Option<Self> {
        T::absent().map(Box::new)
    }
}
