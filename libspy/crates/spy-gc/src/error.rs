//! Error Module - spy-gc Error Types
//!
//! Defines all error types used by the heap, the collector and the value
//! operations built on top of them.
//!
//! # Error Categories
//!
//! ## Fatal (allocation / collection)
//! - `OutOfMemory` - Heap exhausted after a full collection and a failed grow
//! - `HostMemory` - The host refused to provide or reserve backing memory
//! - `InvalidReference` - A root or traced field does not point at a live object
//! - `CorruptHeader` - A header failed validation during tracing or sweeping
//! - `RootSetVersion` - Generated code registered a root frame of another ABI version
//!
//! ## Recoverable (value operations)
//! - `OutOfBounds` / `IndexOutOfBounds` - String slice or buffer access outside the payload
//! - `InvalidUtf8` / `NotCharBoundary` - String payload would not be valid UTF-8
//! - `DescriptorMismatch` - A string operation was handed a buffer, etc.
//!
//! ## Setup
//! - `Configuration` - Invalid heap configuration
//! - `UnknownDescriptor` - Allocation with an unregistered type id
//! - `InvalidState` - Collector state machine violation

use thiserror::Error;

/// Main error type for all spy-gc operations
///
/// # Examples
///
/// ```rust
/// use spy_gc::GcError;
///
/// fn handle_error(err: GcError) {
///     match err {
///         GcError::OutOfBounds { start, end, length } => {
///             eprintln!("slice {}..{} of {} bytes", start, end, length);
///         }
///         e if e.is_fatal() => panic!("{}", e),
///         _ => {}
///     }
/// }
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GcError {
    /// Out of memory - no collection or growth can satisfy the request
    #[error("Out of memory: requested {requested} bytes, available {available} bytes")]
    OutOfMemory { requested: usize, available: usize },

    /// Host memory primitive failed (reserve, map or `memory.grow`)
    #[error("Host memory error: {0}")]
    HostMemory(String),

    /// Slice range outside the payload
    ///
    /// **When returned:** `start > end` or `end > length` in a string or buffer slice
    #[error("Range {start}..{end} out of bounds for length {length}")]
    OutOfBounds {
        start: usize,
        end: usize,
        length: usize,
    },

    /// Single index outside the payload
    #[error("Index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: usize, length: usize },

    /// Bytes handed to a string constructor are not UTF-8
    #[error("Invalid UTF-8: valid up to byte {valid_up_to}")]
    InvalidUtf8 { valid_up_to: usize },

    /// Slice bound splits a UTF-8 sequence
    #[error("Byte index {index} is not a UTF-8 character boundary")]
    NotCharBoundary { index: usize },

    /// Reference does not point at a live heap object
    ///
    /// **When returned:** root slot or traced field holds an address outside the
    /// allocated region, a misaligned address, or the address of a free chunk
    #[error("Invalid heap reference: {address:#x}")]
    InvalidReference { address: usize },

    /// Header failed validation
    #[error("Corrupt object header at {address:#x} (descriptor {descriptor}): {reason}")]
    CorruptHeader {
        address: usize,
        descriptor: usize,
        reason: String,
    },

    /// Allocation with a descriptor id that was never registered
    #[error("Unknown type descriptor id {0}")]
    UnknownDescriptor(u32),

    /// Object has a different type than the operation expects
    #[error("Object at {address:#x} has descriptor {actual}, expected {expected}")]
    DescriptorMismatch {
        address: usize,
        expected: u32,
        actual: u32,
    },

    /// Shadow frame registered with an unsupported layout version
    #[error("Root frame version mismatch: expected {expected}, found {found}")]
    RootSetVersion { expected: u32, found: u32 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Collector state machine violation
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },
}

impl GcError {
    /// Errors that end the program: allocation failure and broken invariants
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GcError::OutOfMemory { .. }
                | GcError::HostMemory(_)
                | GcError::InvalidReference { .. }
                | GcError::CorruptHeader { .. }
                | GcError::RootSetVersion { .. }
                | GcError::InvalidState { .. }
        )
    }

    /// Value-level errors handed back to generated code
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GcError::OutOfBounds { .. }
                | GcError::IndexOutOfBounds { .. }
                | GcError::InvalidUtf8 { .. }
                | GcError::NotCharBoundary { .. }
                | GcError::DescriptorMismatch { .. }
        )
    }
}

impl From<crate::config::ConfigError> for GcError {
    fn from(err: crate::config::ConfigError) -> Self {
        GcError::Configuration(err.to_string())
    }
}

/// Result type alias for spy-gc operations
pub type Result<T> = std::result::Result<T, GcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let oom = GcError::OutOfMemory {
            requested: 64,
            available: 0,
        };
        assert!(oom.is_fatal());
        assert!(!oom.is_recoverable());

        let bounds = GcError::OutOfBounds {
            start: 3,
            end: 1,
            length: 4,
        };
        assert!(bounds.is_recoverable());
        assert!(!bounds.is_fatal());
    }

    #[test]
    fn test_display_includes_context() {
        let err = GcError::CorruptHeader {
            address: 0x1000,
            descriptor: 7,
            reason: "mark bit set on free chunk".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("0x1000"));
        assert!(msg.contains("descriptor 7"));
    }
}
