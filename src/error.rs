use thiserror::Error;

/// Rejected manual match request. Nothing is mutated when one is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("{a} and {b} belong to the same side")]
    SameSide { a: String, b: String },
    #[error("{0} is shared by both sides and always matches itself")]
    SharedEntity(String),
    #[error("array dimensions differ: {a} has {dims_a}, {b} has {dims_b}")]
    DimensionMismatch {
        a: String,
        dims_a: usize,
        b: String,
        dims_b: usize,
    },
    #[error("owners of {a} and {b} are not matched to each other")]
    OwnerMismatch { a: String, b: String },
    #[error("{a} and {b} differ in kind (argument vs local variable)")]
    VarKindMismatch { a: String, b: String },
    #[error("{0} is marked as not matchable")]
    NotMatchable(String),
}
