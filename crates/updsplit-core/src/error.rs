//! Error types for the updsplit-core library.
//!
//! Two layers are used: [`DecodeError`] describes why a single candidate
//! header was rejected by the scanner, and [`Error`] covers everything that
//! can go wrong while reading containers or writing partition images.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for updsplit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reason a candidate record header was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A fixed header field ran past the end of the input
    #[error("truncated {field} field: need {needed} bytes, {available} available")]
    TruncatedField {
        /// Name of the field being read
        field: &'static str,
        /// Bytes the field needs
        needed: u64,
        /// Bytes left in the input
        available: u64,
    },

    /// The declared header size is smaller than the fixed header
    #[error("header size {header_size} is smaller than the fixed header ({minimum} bytes)")]
    HeaderTooSmall {
        /// Header size as declared in the record
        header_size: u32,
        /// Smallest header size that is consistent
        minimum: u64,
    },

    /// Header remainder plus payload run past the end of the input
    #[error("payload of {size} bytes (after {skip} header bytes) exceeds the {available} bytes left")]
    PayloadOutOfBounds {
        /// Trailing header bytes to skip
        skip: u64,
        /// Declared payload size
        size: u64,
        /// Bytes left in the input
        available: u64,
    },

    /// Alignment padding after the payload runs past the end of the input
    #[error("alignment padding of {padding} bytes exceeds the {available} bytes left")]
    PaddingOutOfBounds {
        /// Required padding
        padding: u64,
        /// Bytes left in the input
        available: u64,
    },
}

/// Comprehensive error type for all updsplit operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to open or read an input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or write an output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create an output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A signature match did not lead to a consistent record
    #[error("malformed record at offset {offset:#x}: {reason}")]
    MalformedRecord {
        /// Offset of the matched signature
        offset: u64,
        /// Why the header was rejected
        #[source]
        reason: DecodeError,
    },

    /// The source file holds fewer payload bytes than the record declares
    #[error("truncated payload in '{path}': expected {expected} bytes at offset {offset:#x}, got {copied}")]
    TruncatedPayload {
        /// Source file of the record
        path: PathBuf,
        /// Payload offset within the source
        offset: u64,
        /// Declared payload size
        expected: u64,
        /// Bytes actually available or copied
        copied: u64,
    },

    /// The operation was stopped through a [`CancelFlag`](crate::CancelFlag)
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new malformed record error
    pub fn malformed_record(offset: u64, reason: DecodeError) -> Self {
        Self::MalformedRecord { offset, reason }
    }

    /// Creates a new truncated payload error
    pub fn truncated_payload(
        path: impl Into<PathBuf>,
        offset: u64,
        expected: u64,
        copied: u64,
    ) -> Self {
        Self::TruncatedPayload {
            path: path.into(),
            offset,
            expected,
            copied,
        }
    }

    /// Returns true if the batch should carry on past this error
    ///
    /// Only cancellation stops a batch; every other error is confined to the
    /// file or record it happened on.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}
