//! # Tag Sessions
//!
//! Exclusive, deadline-bounded access to the NFC reader.
//!
//! - [`NfcHardware`]: the platform seam.
//! - [`TagSessionController`]: lifecycle, one-session-at-a-time guard and
//!   the single tag-listener slot.
//! - [`SimulatedReader`]: an in-memory backend for tests and demos.

pub mod controller;
pub mod hardware;
pub mod simulated;

mod error;
mod listener;

pub use controller::{ControllerState, TagRead, TagSessionController};
pub use error::{HardwareError, TagError};
pub use hardware::{NfcHardware, TagHandle, TagListener, TagTechnology};
pub use listener::ListenerToken;
pub use simulated::{SimulatedReader, SimulatedTag};
