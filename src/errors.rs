//! Errors raised when parsing and extracting GPMF data.

use std::path::PathBuf;

/// Various GPMF parse and extraction errors.
///
/// `NotFound` is an expected control-flow result for exhausted searches,
/// not a failure: callers loop on `find_next` until it is returned.
#[derive(Debug, thiserror::Error)]
pub enum GpmfError {
    /// Declared record lengths are inconsistent with the enclosing
    /// container or buffer bounds.
    #[error("corrupt GPMF data at offset {offset}: {reason}")]
    Corrupt {
        /// Byte offset of the offending record header.
        offset: usize,
        reason: String,
    },
    /// Unrecognized type tag. Recoverable: tolerant searches skip
    /// records (or elements) carrying one.
    #[error("unknown GPMF type 0x{0:02x}")]
    UnknownType(u8),
    /// Search scope exhausted without a match.
    #[error("no matching GPMF record")]
    NotFound,
    /// Caller-supplied output buffer cannot hold the extracted samples.
    #[error("output buffer holds {got} values, {needed} required")]
    BufferTooSmall { needed: usize, got: usize },
    /// Caller-supplied sample range exceeds the record's repeat count.
    #[error("sample range {start}..{end} outside of 0..{repeat}")]
    InvalidRange { start: u32, end: u32, repeat: u32 },
    /// A `TYPE` descriptor or unit table names more entries than the
    /// documented cap.
    #[error("annotation table holds {got} entries, at most {max} supported")]
    TypeDescriptorExceeded { got: usize, max: usize },
    /// Raw GPMF file exceeds the in-memory size cap.
    #[error("{path} is {got} bytes, max size is {max} bytes")]
    MaxFileSizeExceeded { max: u64, got: u64, path: PathBuf },
    /// IO error at the payload source boundary.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    /// Failed to read binary data.
    #[error("failed to read binary data: {0}")]
    BinReadError(#[from] binrw::Error),
}

impl GpmfError {
    /// Shorthand for a `Corrupt` error where a record's declared
    /// data length overshoots the bytes that remain in its container.
    pub(crate) fn overrun(offset: usize, needed: usize, remaining: usize) -> Self {
        Self::Corrupt {
            offset,
            reason: format!("record needs {needed} bytes, {remaining} remain"),
        }
    }
}
