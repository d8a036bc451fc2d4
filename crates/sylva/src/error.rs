//! Error types for the Sylva value layer.
//!
//! Failures split into two classes. Catchable runtime exceptions are
//! ordinary [`Exception`] values returned through [`Result`]; the evaluator
//! may intercept and handle them. Fatal invariant violations (a wrong kind
//! reaching a scalar accessor, an impossible type-switch branch, corrupt
//! internal state) indicate the type-checker upstream failed and abort the
//! current execution via [`fault!`]; they are never represented as
//! `Exception` and never recovered here.

use thiserror::Error;

/// A catchable runtime exception.
///
/// Each variant carries the diagnostic context the evaluator surfaces to
/// user code (attempted index, violated bound, ...).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Exception {
    /// Index outside `[0, length)` for an array, slice, or string.
    #[error("index out of range [{index}] with length {length}")]
    IndexOutOfBounds {
        /// The attempted index.
        index: i64,
        /// The container length the index was checked against.
        length: usize,
    },

    /// Negative index in an index or slice expression.
    #[error("invalid index {index} (index must be non-negative)")]
    NegativeIndex {
        /// The attempted index.
        index: i64,
    },

    /// Slice expression with `low > high` (or `high > max`).
    #[error("invalid slice indices {low} > {high}")]
    InvertedSliceIndices {
        /// Lower bound of the slice expression.
        low: i64,
        /// Upper bound of the slice expression.
        high: i64,
    },

    /// Slice bounds exceeding the operand's capacity.
    #[error("slice bounds out of range [{low}:{high}] with capacity {cap}")]
    SliceOutOfBounds {
        /// Lower bound of the slice expression.
        low: i64,
        /// Upper bound (or max-capacity bound) of the slice expression.
        high: i64,
        /// Capacity of the sliced operand.
        cap: usize,
    },

    /// Indexing into a nil slice.
    #[error("nil slice index out of range")]
    NilSliceIndex,

    /// Read or write through a nil pointer.
    #[error("nil pointer dereference")]
    NilPointer,

    /// Keyed access into a map that was never made.
    #[error("uninitialized map index")]
    UninitializedMap,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Exception>;

/// Abort the current execution on a broken internal invariant.
///
/// Reserved for conditions the upstream type-checker must prevent; these
/// are not catchable and deliberately bypass [`Exception`].
macro_rules! fault {
    ($($arg:tt)*) => {
        panic!("invariant violation: {}", format_args!($($arg)*))
    };
}

pub(crate) use fault;
