//! Error types for the tag-session controller and the hardware seam.

use thiserror::Error;

use super::controller::ControllerState;
use super::hardware::TagTechnology;

/// Failures reported by an [`NfcHardware`](super::NfcHardware) backend.
///
/// These are the "transient" class: a tag pulled out of the field, a tag
/// that doesn't speak NDEF, a radio hiccup. Higher layers fold them into
/// `false` / `None` results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    /// No tag is in the field.
    #[error("no tag in the field")]
    NoTag,

    /// The tag left the field during the operation.
    #[error("tag was removed from the field")]
    TagLost,

    /// The tag does not support the requested technology.
    #[error("tag does not support {0}")]
    Incompatible(TagTechnology),

    /// The tag is locked against writes.
    #[error("tag is read-only")]
    ReadOnly,

    /// The call was abandoned through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// Any other reader or platform failure.
    #[error("reader failure: {0}")]
    Io(String),
}

/// Errors returned by [`TagSessionController`](super::TagSessionController).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    /// The device has no usable NFC reader (or support was never probed).
    #[error("NFC is not supported on this device")]
    UnsupportedHardware,

    /// A session operation was attempted before `start()` succeeded.
    #[error("NFC reader is not initialized")]
    NotInitialized,

    /// The reader did not come up within its deadline.
    #[error("NFC reader start timed out after {timeout_ms}ms")]
    SessionStartTimeout {
        /// Configured deadline in milliseconds.
        timeout_ms: u64,
    },

    /// No tag was acquired within the session deadline.
    #[error("tag session acquisition timed out after {timeout_ms}ms")]
    SessionAcquisitionTimeout {
        /// Configured deadline in milliseconds.
        timeout_ms: u64,
    },

    /// Another tag session is already open. Sessions are not queued.
    #[error("a tag session is already open")]
    SessionBusy,

    /// A tag listener is already registered; unregister it first.
    #[error("a tag listener is already registered")]
    ListenerAlreadyRegistered,

    /// The operation makes no sense in the controller's current state.
    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        /// State the controller was in.
        state: ControllerState,
        /// The operation that was refused.
        operation: &'static str,
    },

    /// The hardware backend failed.
    #[error(transparent)]
    Hardware(#[from] HardwareError),
}
