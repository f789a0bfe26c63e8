//! Crate-wide error type.
//!
//! Every fallible operation returns [`Result`]. The variants follow the
//! four failure families of the crate: caller-contract violations,
//! corrupt input on load, fatal hash-table inconsistencies and resource
//! exhaustion. None of them is retried internally.

use crate::rtti::Category;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The element type of a container does not accept the descriptor it
    /// was bound to, or a value does not have the shape of its descriptor.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A descriptor could not be built (overlapping fields, bad width, ...).
    #[error("invalid type descriptor: {0}")]
    InvalidDescriptor(String),

    /// The dispatch table has no entry for this category.
    #[error("{operation} is not supported for {category:?}")]
    Unsupported {
        category: Category,
        operation: &'static str,
    },

    /// Input ended before the declared content did.
    #[error("truncated input: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// Input is malformed (unexpected tag, size mismatch, bad text).
    #[error("corrupt input: {0}")]
    Corrupt(String),

    /// The hash index lost its invariants. Not recoverable.
    #[error("hash index inconsistency: {0}")]
    HashTable(String),

    /// A requested size does not fit the address space.
    #[error("capacity overflow: {requested} elements")]
    CapacityOverflow { requested: usize },

    /// The allocator refused the request.
    #[error("out of memory allocating {bytes} bytes")]
    OutOfMemory { bytes: usize },

    /// A unique insert found an equal item already stored.
    #[error("an equal item is already stored")]
    DuplicateKey,
}

impl Error {
    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// True for errors raised while decoding input.
    pub fn is_load_failure(&self) -> bool {
        matches!(self, Error::Truncated { .. } | Error::Corrupt(_))
    }
}
