//! Error types for the dwgcodec library.
//!
//! Two layers of error reporting exist side by side:
//!
//! - [`DwgError`] / [`Result`] for hard failures that abort an operation
//!   (I/O, malformed framing, checksum mismatch).
//! - [`ErrorFlags`], a combinable bit-mask accumulated on the document for
//!   recoverable problems. Field-level problems leave the field at its zero
//!   value and set a flag; object-level problems abort only that object.
//!   Callers inspect the mask to decide whether a best-effort decode is
//!   acceptable for their use case.

use std::io;
use thiserror::Error;

use bitflags::bitflags;

/// Main error type for dwgcodec operations
#[derive(Debug, Error)]
pub enum DwgError {
    /// IO error occurred during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Unsupported CAD file version
    #[error("Unsupported CAD version: {0:?}")]
    UnsupportedVersion(String),

    /// Error parsing file content
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid DXF group code encountered
    #[error("Invalid DXF code: {0}")]
    InvalidDxfCode(i32),

    /// Invalid handle reference
    #[error("Invalid handle: {0:#X}")]
    InvalidHandle(u64),

    /// Object not found in document
    #[error("Object not found: handle {0:#X}")]
    ObjectNotFound(u64),

    /// CRC checksum mismatch over a section or object
    #[error("CRC checksum mismatch: expected {expected:#X}, got {actual:#X}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// Invalid file header
    #[error("Invalid file header: {0}")]
    InvalidHeader(String),

    /// Invalid file format
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    /// Invalid sentinel in file
    #[error("Invalid sentinel: {0}")]
    InvalidSentinel(String),

    /// Read past the end of a stream or sub-stream
    #[error("Unexpected end of stream at bit {0}")]
    EndOfStream(u64),

    /// A declared array length exceeds the allocation sanity cap
    #[error("Array count {0} exceeds sanity cap")]
    CountTooLarge(u64),

    /// Text encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A symbolic name could not be resolved under the strict policy
    #[error("Unresolved name: {0}")]
    UnresolvedName(String),

    /// Generic error with custom message
    #[error("{0}")]
    Custom(String),
}

/// Result type alias for dwgcodec operations
pub type Result<T> = std::result::Result<T, DwgError>;

impl From<String> for DwgError {
    fn from(s: String) -> Self {
        DwgError::Custom(s)
    }
}

impl From<&str> for DwgError {
    fn from(s: &str) -> Self {
        DwgError::Custom(s.to_string())
    }
}

bitflags! {
    /// Combinable error bits accumulated on a [`crate::document::Document`]
    /// during decode or encode.
    ///
    /// A non-empty mask after a read does not mean the graph is unusable;
    /// only [`ErrorFlags::is_fatal`] bits indicate the document as a whole
    /// could not be decoded.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ErrorFlags: u32 {
        /// A section or object CRC did not match.
        const WRONG_CRC = 1 << 0;
        /// Class or fixed-type mismatch on an object.
        const INVALID_TYPE = 1 << 1;
        /// No registered schema for a DXF class; the object was parked as
        /// an unknown placeholder carrying its raw payload.
        const UNHANDLED_CLASS = 1 << 2;
        /// A handle reference could not be resolved.
        const INVALID_HANDLE = 1 << 3;
        /// An allocation request exceeded the sanity cap.
        const OUT_OF_MEM = 1 << 4;
        /// A structural precondition was violated (e.g. missing
        /// BLOCK_CONTROL table).
        const INVALID_DWG = 1 << 5;
        /// An expected section was not present.
        const SECTION_NOT_FOUND = 1 << 6;
        /// A field value was outside its legal range and was clamped or
        /// zeroed.
        const VALUE_OUT_OF_BOUNDS = 1 << 7;
        /// Internal inconsistency; always accompanied by a notification.
        const INTERNAL = 1 << 8;
    }
}

impl ErrorFlags {
    /// Whether the accumulated bits indicate the whole document failed.
    pub fn is_fatal(self) -> bool {
        self.intersects(ErrorFlags::OUT_OF_MEM | ErrorFlags::INVALID_DWG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DwgError::UnsupportedVersion("AC1003".to_string());
        assert_eq!(err.to_string(), "Unsupported CAD version: \"AC1003\"");
    }

    #[test]
    fn test_checksum_error() {
        let err = DwgError::ChecksumMismatch {
            expected: 0x1234,
            actual: 0x5678,
        };
        assert!(err.to_string().contains("0x1234"));
        assert!(err.to_string().contains("0x5678"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: DwgError = io_err.into();
        assert!(matches!(err, DwgError::Io(_)));
    }

    #[test]
    fn test_flags_combine() {
        let mut flags = ErrorFlags::empty();
        flags |= ErrorFlags::WRONG_CRC;
        flags |= ErrorFlags::INVALID_HANDLE;
        assert!(flags.contains(ErrorFlags::WRONG_CRC));
        assert!(!flags.is_fatal());
        flags |= ErrorFlags::INVALID_DWG;
        assert!(flags.is_fatal());
    }
}
