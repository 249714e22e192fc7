use thiserror::Error;

use crate::wire::WireValue;

use super::path::CodingPath;

/// Failure while turning a wire tree into a typed message.
///
/// All variants abort the current decode call only; callers decide whether
/// the surrounding frame or request is dropped.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    /// Input could not be parsed, or the root had the wrong shape.
    #[error("data corrupted at {path}: {message}")]
    DataCorrupted { path: CodingPath, message: String },

    /// A value was present but of the wrong kind, and no coercion applied.
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch { path: CodingPath, expected: &'static str, found: String },

    /// A required value was null or absent.
    #[error("value not found at {path}: expected {expected}")]
    ValueNotFound { path: CodingPath, expected: &'static str },

    /// Sequential read past the end, or a second container from one decoder.
    #[error("container exhausted at {path}: {message}")]
    ContainerExhausted { path: CodingPath, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    DataCorrupted,
    TypeMismatch,
    ValueNotFound,
    ContainerExhausted,
}

impl DecodeError {
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            Self::DataCorrupted { .. } => DecodeErrorKind::DataCorrupted,
            Self::TypeMismatch { .. } => DecodeErrorKind::TypeMismatch,
            Self::ValueNotFound { .. } => DecodeErrorKind::ValueNotFound,
            Self::ContainerExhausted { .. } => DecodeErrorKind::ContainerExhausted,
        }
    }

    pub fn path(&self) -> &CodingPath {
        match self {
            Self::DataCorrupted { path, .. }
            | Self::TypeMismatch { path, .. }
            | Self::ValueNotFound { path, .. }
            | Self::ContainerExhausted { path, .. } => path,
        }
    }

    pub(crate) fn type_mismatch(path: CodingPath, expected: &'static str, found: &WireValue) -> Self {
        Self::TypeMismatch { path, expected, found: found.describe() }
    }

    pub(crate) fn value_not_found(path: CodingPath, expected: &'static str) -> Self {
        Self::ValueNotFound { path, expected }
    }
}
