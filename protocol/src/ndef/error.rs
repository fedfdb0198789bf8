//! Error types for the NDEF record layer.

use thiserror::Error;

/// Errors raised while building or parsing NDEF messages.
///
/// The wallet-card codec never lets these escape on the decode path: a
/// blank or foreign tag is an ordinary "nothing here" result. They surface
/// only from the low-level [`NdefMessage`](super::NdefMessage) API and from
/// encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NdefError {
    /// The record or message could not be constructed.
    #[error("NDEF encoding failed: {0}")]
    EncodingFailure(String),

    /// The byte stream ended before the record it describes.
    #[error("truncated NDEF record at byte {offset}: needed {needed} more bytes")]
    Truncated {
        /// Offset at which the missing field starts.
        offset: usize,
        /// Number of bytes the header promised.
        needed: usize,
    },

    /// Chunked records (CF flag) are not produced by any wallet and are
    /// not reassembled.
    #[error("chunked NDEF records are not supported")]
    ChunkedRecord,

    /// The record is not a well-known text record.
    #[error("record is not an NDEF text record")]
    NotText,

    /// The text record payload is malformed (bad header or encoding).
    #[error("invalid text record: {0}")]
    InvalidText(String),
}
