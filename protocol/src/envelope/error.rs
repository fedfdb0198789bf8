//! Error types for envelope encoding and schema checking.

use thiserror::Error;

/// Errors from [`EnvelopeCodec`](super::EnvelopeCodec) and
/// [`ParsedEnvelope::into_envelope`](super::ParsedEnvelope::into_envelope).
///
/// Plain `parse` never returns these; text that isn't one of ours is
/// simply `None`.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The payload could not be serialized.
    #[error("envelope encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The `type` carries the reserved prefix but names no known kind.
    #[error("unknown envelope type: {0}")]
    UnknownType(String),

    /// `data` does not have the shape its `type` requires.
    #[error("malformed {envelope_type} payload: {reason}")]
    Decoding {
        /// Discriminator of the envelope being decoded.
        envelope_type: String,
        /// What the schema check tripped over.
        reason: String,
    },

    /// `data` is well-formed but a field violates its constraint.
    #[error("invalid envelope data: {0}")]
    Validation(String),
}
