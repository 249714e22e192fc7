// Raw wire handling: the generic value tree and the sparse-array sanitizer.

pub mod sanitize;
pub mod value;

pub use sanitize::{parse_repaired, repair_sparse_slots, sanitize};
pub use value::{WireNumber, WireValue};
