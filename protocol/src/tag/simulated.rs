//! # Simulated Reader
//!
//! In-memory [`NfcHardware`] backend with one virtual tag slot. Tests and
//! the demo drive it directly: present or remove a tag, flip failure
//! knobs, and inspect how many technology requests were made or released.
//!
//! "Hang" knobs make the corresponding call wait on its cancellation token
//! forever, which is how the controller's deadlines are exercised.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::error::HardwareError;
use super::hardware::{NfcHardware, TagHandle, TagListener, TagTechnology};

// ---------------------------------------------------------------------------
// SimulatedTag
// ---------------------------------------------------------------------------

/// A virtual tag that can be placed in the simulated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedTag {
    /// Identity reported to the controller.
    pub handle: TagHandle,
    /// Stored NDEF message; `None` for an unformatted tag.
    pub memory: Option<Vec<u8>>,
    /// Writes fail with [`HardwareError::ReadOnly`].
    pub read_only: bool,
}

impl SimulatedTag {
    /// Empty NDEF-capable tag.
    pub fn blank(id: impl Into<Vec<u8>>) -> Self {
        Self {
            handle: TagHandle::new(id, vec![TagTechnology::Ndef, TagTechnology::NfcA]),
            memory: None,
            read_only: false,
        }
    }

    /// NDEF-capable tag already holding `message`.
    pub fn with_message(id: impl Into<Vec<u8>>, message: Vec<u8>) -> Self {
        Self {
            memory: Some(message),
            ..Self::blank(id)
        }
    }

    /// Tag declaring only the given technologies.
    pub fn with_technologies(id: impl Into<Vec<u8>>, tech_types: Vec<TagTechnology>) -> Self {
        Self {
            handle: TagHandle::new(id, tech_types),
            memory: None,
            read_only: false,
        }
    }

    /// Lock the tag against writes.
    pub fn locked(mut self) -> Self {
        self.read_only = true;
        self
    }
}

// ---------------------------------------------------------------------------
// SimulatedReader
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Knobs {
    unsupported: bool,
    fail_probe: bool,
    hang_probe: bool,
    hang_start: bool,
    fail_start: bool,
    fail_stop: bool,
    fail_cancel: bool,
    fail_reads: bool,
    fail_writes: bool,
}

#[derive(Default)]
struct ReaderState {
    knobs: Knobs,
    started: bool,
    tag: Option<SimulatedTag>,
    outstanding: bool,
    listener: Option<TagListener>,
    probe_calls: u64,
    technology_requests: u64,
    cancellations: u64,
}

/// Scriptable in-memory NFC reader.
#[derive(Default)]
pub struct SimulatedReader {
    state: Mutex<ReaderState>,
    arrival: Notify,
}

impl SimulatedReader {
    /// A working reader with an empty field.
    pub fn new() -> Self {
        Self::default()
    }

    /// A device without NFC.
    pub fn unsupported() -> Self {
        let reader = Self::new();
        reader.set_supported(false);
        reader
    }

    // -- Field --------------------------------------------------------------

    /// Place `tag` in the field, replacing any tag already there.
    ///
    /// Wakes pending technology requests and fires the tag listener.
    pub fn present_tag(&self, tag: SimulatedTag) {
        let (listener, handle) = {
            let mut state = self.state.lock();
            let handle = tag.handle.clone();
            state.tag = Some(tag);
            (state.listener.clone(), handle)
        };
        trace!(tag_id = %handle.id_hex(), "simulated tag presented");
        if let Some(listener) = listener {
            listener(handle);
        }
        self.arrival.notify_waiters();
    }

    /// Take the tag out of the field, returning it.
    pub fn remove_tag(&self) -> Option<SimulatedTag> {
        self.state.lock().tag.take()
    }

    /// NDEF memory of the tag currently in the field.
    pub fn tag_message(&self) -> Option<Vec<u8>> {
        self.state.lock().tag.as_ref().and_then(|t| t.memory.clone())
    }

    // -- Knobs --------------------------------------------------------------

    /// Change the answer of the capability probe.
    pub fn set_supported(&self, supported: bool) {
        self.state.lock().knobs.unsupported = !supported;
    }

    /// Make the capability probe return an error.
    pub fn fail_probe(&self, on: bool) {
        self.state.lock().knobs.fail_probe = on;
    }

    /// Make the capability probe never answer.
    pub fn hang_probe(&self, on: bool) {
        self.state.lock().knobs.hang_probe = on;
    }

    /// Make reader start-up never complete.
    pub fn hang_start(&self, on: bool) {
        self.state.lock().knobs.hang_start = on;
    }

    /// Make reader start-up fail.
    pub fn fail_start(&self, on: bool) {
        self.state.lock().knobs.fail_start = on;
    }

    /// Make reader shutdown fail.
    pub fn fail_stop(&self, on: bool) {
        self.state.lock().knobs.fail_stop = on;
    }

    /// Make releasing a technology request fail.
    pub fn fail_cancel(&self, on: bool) {
        self.state.lock().knobs.fail_cancel = on;
    }

    /// Make NDEF reads fail.
    pub fn fail_reads(&self, on: bool) {
        self.state.lock().knobs.fail_reads = on;
    }

    /// Make NDEF writes fail.
    pub fn fail_writes(&self, on: bool) {
        self.state.lock().knobs.fail_writes = on;
    }

    // -- Inspection ---------------------------------------------------------

    /// Number of capability probes answered or attempted.
    pub fn probe_calls(&self) -> u64 {
        self.state.lock().probe_calls
    }

    /// Number of technology requests received.
    pub fn technology_requests(&self) -> u64 {
        self.state.lock().technology_requests
    }

    /// Number of technology request releases received.
    pub fn cancellations(&self) -> u64 {
        self.state.lock().cancellations
    }

    /// Whether a technology request is currently held.
    pub fn technology_outstanding(&self) -> bool {
        self.state.lock().outstanding
    }

    /// Whether the reader subsystem is up.
    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    /// Whether a tag listener is installed.
    pub fn has_listener(&self) -> bool {
        self.state.lock().listener.is_some()
    }

    fn claimed_tag(state: &ReaderState) -> Result<&SimulatedTag, HardwareError> {
        if !state.outstanding {
            return Err(HardwareError::Io("no technology request outstanding".into()));
        }
        state.tag.as_ref().ok_or(HardwareError::TagLost)
    }
}

#[async_trait]
impl NfcHardware for SimulatedReader {
    async fn is_supported(&self, cancel: &CancellationToken) -> Result<bool, HardwareError> {
        let (hang, fail, supported) = {
            let mut state = self.state.lock();
            state.probe_calls += 1;
            let knobs = &state.knobs;
            (knobs.hang_probe, knobs.fail_probe, !knobs.unsupported)
        };
        if hang {
            cancel.cancelled().await;
            return Err(HardwareError::Cancelled);
        }
        if fail {
            return Err(HardwareError::Io("adapter query failed".into()));
        }
        Ok(supported)
    }

    async fn start(&self, cancel: &CancellationToken) -> Result<(), HardwareError> {
        let (hang, fail) = {
            let state = self.state.lock();
            (state.knobs.hang_start, state.knobs.fail_start)
        };
        if hang {
            cancel.cancelled().await;
            return Err(HardwareError::Cancelled);
        }
        if fail {
            return Err(HardwareError::Io("adapter refused to start".into()));
        }
        self.state.lock().started = true;
        Ok(())
    }

    async fn stop(&self) -> Result<(), HardwareError> {
        let mut state = self.state.lock();
        if state.knobs.fail_stop {
            return Err(HardwareError::Io("adapter refused to stop".into()));
        }
        state.started = false;
        Ok(())
    }

    async fn request_technology(
        &self,
        technology: TagTechnology,
        cancel: &CancellationToken,
    ) -> Result<(), HardwareError> {
        self.state.lock().technology_requests += 1;

        loop {
            let notified = self.arrival.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(tag) = &state.tag {
                    if !tag.handle.supports(technology) {
                        return Err(HardwareError::Incompatible(technology));
                    }
                    state.outstanding = true;
                    return Ok(());
                }
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => return Err(HardwareError::Cancelled),
            }
        }
    }

    async fn cancel_technology_request(&self) -> Result<(), HardwareError> {
        let mut state = self.state.lock();
        state.cancellations += 1;
        if state.knobs.fail_cancel {
            return Err(HardwareError::Io("cancel request rejected".into()));
        }
        state.outstanding = false;
        Ok(())
    }

    async fn get_tag(&self) -> Result<Option<TagHandle>, HardwareError> {
        let state = self.state.lock();
        if !state.outstanding {
            return Err(HardwareError::Io("no technology request outstanding".into()));
        }
        Ok(state.tag.as_ref().map(|t| t.handle.clone()))
    }

    async fn read_ndef_message(&self) -> Result<Option<Vec<u8>>, HardwareError> {
        let state = self.state.lock();
        let tag = Self::claimed_tag(&state)?;
        if state.knobs.fail_reads {
            return Err(HardwareError::Io("NDEF read failed".into()));
        }
        Ok(tag.memory.clone())
    }

    async fn write_ndef_message(&self, message: &[u8]) -> Result<(), HardwareError> {
        let mut state = self.state.lock();
        let fail = state.knobs.fail_writes;
        let tag = Self::claimed_tag(&state)?;
        if tag.read_only {
            return Err(HardwareError::ReadOnly);
        }
        if fail {
            return Err(HardwareError::Io("NDEF write failed".into()));
        }
        if let Some(tag) = state.tag.as_mut() {
            tag.memory = Some(message.to_vec());
        }
        Ok(())
    }

    async fn set_tag_listener(&self, listener: Option<TagListener>) -> Result<(), HardwareError> {
        self.state.lock().listener = listener;
        Ok(())
    }
}
