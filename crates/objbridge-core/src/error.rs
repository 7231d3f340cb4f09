//! Error types for the bridge.
//!
//! ## Error Hierarchy
//!
//! ```text
//! BridgeError (facade / coercion errors)
//! ├── TypeMismatch       - object does not satisfy the requested type
//! ├── Pointer(..)        - legacy pointer text could not be used
//! │   ├── PointerError::Malformed
//! │   └── PointerError::TypeMismatch
//! ├── Conversion         - recoverable error raised by a conversion constructor
//! └── ...                - lifecycle and lookup failures
//! ```
//!
//! Type errors (see [`BridgeError::is_type_error`]) are the only category a
//! speculative conversion attempt may swallow.

use thiserror::Error;

// ============================================================================
// Pointer Codec Errors
// ============================================================================

/// Errors produced while decoding legacy pointer text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointerError {
    /// No address could be extracted from the text.
    #[error("could not extract hexadecimal address from argument string")]
    Malformed,

    /// The text is a well-formed mangled pointer tagged with another type.
    #[error("mangled pointer is of type '{found}', expected '{expected}'")]
    TypeMismatch { expected: String, found: String },
}

// ============================================================================
// Bridge Errors
// ============================================================================

/// Errors surfaced by bridge operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// An object was passed where another type was required.
    ///
    /// Both names are rendered for display (pythonic names for templated
    /// classes).
    #[error("method requires a {expected}, a {actual} was provided.")]
    TypeMismatch { expected: String, actual: String },

    /// An address decoded from text refers to an object of the wrong class.
    #[error("method requires a {expected} address, a {actual} address was provided.")]
    AddressTypeMismatch { expected: String, actual: String },

    /// Instances of an abstract native class cannot be created.
    #[error("cannot create an instance of abstract class {0}")]
    Abstract(String),

    /// An adapter hook returned something other than a wrapper.
    #[error("wrapper adapter doesn't return a wrapped native object")]
    AdapterReturnedNonWrapper,

    /// A string argument was required.
    #[error("method requires a string argument")]
    ExpectedString,

    /// A temporary would have to be created for a mutable reference.
    #[error("cannot pass {actual} as a non-const {expected} reference")]
    NonConstReference { expected: String, actual: String },

    /// A conversion constructor rejected its argument.
    #[error("{0}")]
    Conversion(String),

    /// A non-recoverable error raised inside a callback.
    #[error("{0}")]
    Callback(String),

    /// Legacy pointer text could not be used.
    #[error(transparent)]
    Pointer(#[from] PointerError),

    /// The decoded address does not belong to an object the bridge knows.
    #[error("address {0:#x} does not refer to an object known to the bridge")]
    UnknownAddress(usize),

    /// The native class has no registered wrapper class or ancestor.
    #[error("no wrapper class registered for '{0}' or any of its bases")]
    NoRegisteredAncestor(String),

    /// A wrapper type of the wrong kind was registered, e.g. a type not
    /// flagged special in the special type table.
    #[error("{name} is not {kind} type")]
    WrongKind { name: String, kind: &'static str },

    /// A wrapper was used that is not bound to any native object.
    #[error("wrapper is not bound to a native object")]
    Unbound,

    /// The bridge was already torn down.
    #[error("bridge has been finalized")]
    Finalized,
}

impl BridgeError {
    /// Create a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        BridgeError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Whether this error belongs to the type-error category.
    ///
    /// Speculative conversions swallow these and keep searching; every other
    /// category aborts the search.
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            BridgeError::TypeMismatch { .. }
                | BridgeError::AddressTypeMismatch { .. }
                | BridgeError::Abstract(_)
                | BridgeError::AdapterReturnedNonWrapper
                | BridgeError::ExpectedString
                | BridgeError::NonConstReference { .. }
                | BridgeError::Conversion(_)
        )
    }
}

/// Result alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
