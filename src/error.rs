//! Error and Result types.
use thiserror::Error;

use crate::geometry::GeometryType;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum GeometryCodecError {
    /// A geometry's flags disagree with the flags of its coordinates or of
    /// a child geometry. Raised by `encode`.
    #[error("dimension mismatch between geometry flags and coordinate/child flags")]
    DimensionMismatch,
    /// `encode` wrote a number of bytes different from `size_of`'s estimate.
    #[error("encoded size {actual} does not match computed size {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    /// A type tag outside the known range of `GeometryType`.
    #[error("unknown geometry type tag `{0}`")]
    UnknownType(u32),
    /// A collection's child kind is not allowed by its parent kind.
    #[error("{child:?} is not an allowed member of {parent:?}")]
    SubtypeNotAllowed {
        parent: GeometryType,
        child: GeometryType,
    },
    /// Not enough bytes remained to satisfy the next field read.
    #[error(
        "truncated record: expected at least {needed} bytes at offset {offset}, found {available}"
    )]
    TruncatedRecord {
        offset: usize,
        needed: usize,
        available: usize,
    },
    /// `peek_bbox` could not derive a box from the shape of the record
    /// without a full decode.
    #[error("bounding box is not derivable by peeking at this record")]
    PeekNotDerivable,
    /// `peek_first_point` was called on an empty point.
    #[error("point is empty, has no first coordinate")]
    EmptyPoint,
}

pub type Result<T> = std::result::Result<T, GeometryCodecError>;
