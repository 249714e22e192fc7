// PBLite: protocol messages encoded as JSON arrays indexed by field number.
//
// A message `{1: "a", 3: 7}` travels as `["a", null, 7]`. High field numbers
// may be carried in a trailing `{"<field>": value}` extension block so that
// positions of the earlier fields never shift.

mod decode;
mod decoder;
mod encode;
mod error;
#[macro_use]
mod macros;
mod path;
mod record;

pub use decode::{Decode, WireInteger};
pub use decoder::{
    Decoder, DecoderOptions, KeyedContainer, PbliteDecoder, SequenceContainer,
    SingleValueContainer,
};
pub use encode::{Encode, PositionalWriter};
pub use error::{DecodeError, DecodeErrorKind};
pub use path::{CodingPath, PathSegment};
pub use record::PositionalRecord;
