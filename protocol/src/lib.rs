// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SuiSend Protocol: Core Library
//!
//! Two phones, no signal, one payment. This crate is the part of SuiSend
//! that makes that work: wallet cards written to NFC tags, and typed JSON
//! envelopes passed around as QR codes.
//!
//! The library owns exactly one contended resource, the NFC reader, and
//! treats it accordingly: one session at a time, hard deadlines on every
//! call that can hang, and a guaranteed release on every error path.
//! Everything else is pure encoding.
//!
//! ## Architecture
//!
//! - **config**: Wire constants, id prefixes and reader deadlines.
//! - **logging**: Optional `tracing` subscriber for host apps.
//! - **ids**: Epoch-millisecond clock and `<prefix>_<ms>_<suffix>` ids.
//! - **ndef**: NDEF message framing and the wallet-card tag format.
//! - **envelope**: `SuiSend_*` envelopes: encode, recognize, validate.
//! - **tag**: Hardware seam and the tag-session controller.
//! - **card**: Wallet cards: create, write to tag, read from tag.
//! - **wallet**: What we need from the host wallet, and nothing more.
//! - **exchange**: QR payloads from the wallet, and scans back into it.
//!
//! ## Ground Rules
//!
//! 1. Foreign data is not an error. A transit card on the reader or a menu
//!    link in front of the camera yields `None`, never a panic.
//! 2. A session that was opened is closed before the call returns.
//! 3. No globals. Construct a controller, share it by `Arc`.

pub mod card;
pub mod config;
pub mod envelope;
pub mod exchange;
pub mod ids;
pub mod logging;
pub mod ndef;
pub mod tag;
pub mod wallet;

pub use card::{CardError, CardLifecycleManager, CardMode, WalletCardData};
pub use config::TagSessionConfig;
pub use envelope::{Envelope, EnvelopeCodec, EnvelopeError, EnvelopeKind, ParsedEnvelope};
pub use exchange::{ExchangeError, QrExchange, ScanOutcome, Settlement};
pub use ndef::{NdefError, NdefPayloadCodec};
pub use tag::{NfcHardware, TagError, TagSessionController};
pub use wallet::{AppMode, WalletContext, WalletError};
