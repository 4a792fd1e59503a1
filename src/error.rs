//! Error types for archive recovery
//!
//! None of these cross the public `repair` boundary: the pipeline converts
//! each of them into a salvage attempt, a placeholder, or a report note.

use std::fmt;

/// Why an entry's compressed bytes could not be inflated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    /// Every raw, zlib and probe attempt failed without producing output
    Exhausted,
    /// Compression method other than store (0) or deflate (8)
    UnsupportedMethod(u16),
    /// Inflated output grew past the configured cap
    OutputLimit(usize),
}

/// Error from the entry decompressor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeError {
    pub reason: DecodeFailure,
}

impl DecodeError {
    pub fn new(reason: DecodeFailure) -> Self {
        Self { reason }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            DecodeFailure::Exhausted => write!(f, "deflate stream could not be recovered"),
            DecodeFailure::UnsupportedMethod(method) => {
                write!(f, "unsupported compression method {}", method)
            }
            DecodeFailure::OutputLimit(limit) => {
                write!(f, "inflated output exceeds {} bytes", limit)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// A local file header candidate that cannot describe a real entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedEntryError {
    /// Fewer than 30 bytes remain after the signature offset
    TruncatedHeader { offset: usize },
    /// The declared filename runs past the end of the buffer
    NameOverrun { offset: usize, name_len: usize },
    /// Zero-length filename
    EmptyName { offset: usize },
}

impl fmt::Display for MalformedEntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedEntryError::TruncatedHeader { offset } => {
                write!(f, "local header at offset {} is truncated", offset)
            }
            MalformedEntryError::NameOverrun { offset, name_len } => write!(
                f,
                "local header at offset {} declares a {}-byte name past end of buffer",
                offset, name_len
            ),
            MalformedEntryError::EmptyName { offset } => {
                write!(f, "local header at offset {} has an empty name", offset)
            }
        }
    }
}

impl std::error::Error for MalformedEntryError {}

/// The structured (central directory) reader rejected the archive
#[derive(Debug)]
pub struct StructuredOpenError(pub zip::result::ZipError);

impl fmt::Display for StructuredOpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "structured open failed: {}", self.0)
    }
}

impl std::error::Error for StructuredOpenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<zip::result::ZipError> for StructuredOpenError {
    fn from(err: zip::result::ZipError) -> Self {
        StructuredOpenError(err)
    }
}
