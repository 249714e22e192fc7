// hangwire-common: wire format, positional decoding and protocol types.

pub mod pblite;
pub mod protocol;
pub mod wire;
