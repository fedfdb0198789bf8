//! # Tag Session Controller
//!
//! Owns the device's one NFC reader. Every read or write goes through a
//! *session*: a claimed tag-technology request that must be released
//! before anyone else can touch the radio.
//!
//! ```text
//! Uninitialized ──start()──► Starting ──► Active ◄──► ClosingSession
//!                               │           │
//!                               ▼           ▼ stop()
//!                            Stopped ◄──────┘
//! ```
//!
//! `Active` has two sub-states: session open (a technology request is
//! outstanding) and session closed. A second `open_session()` while one is
//! open fails with [`TagError::SessionBusy`]; there is no wait queue.
//!
//! ## Deadlines
//!
//! The capability probe, reader start-up and tag acquisition each race a
//! deadline from [`TagSessionConfig`]. When a deadline wins, the call's
//! cancellation token is cancelled and the controller releases whatever
//! it claimed *before* returning the timeout, so a timed-out call never
//! leaves a session open.
//!
//! ## Locking
//!
//! State sits behind a `parking_lot::Mutex` that is only held for
//! check-and-set sections, never across an `.await`.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TagSessionConfig;

use super::error::TagError;
use super::hardware::{NfcHardware, TagHandle, TagListener};
use super::listener::{ListenerRegistry, ListenerToken};

// ---------------------------------------------------------------------------
// Controller State
// ---------------------------------------------------------------------------

/// Lifecycle state of the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ControllerState {
    /// Constructed, never started.
    Uninitialized,
    /// `start()` is in flight.
    Starting,
    /// Reader is up. A session may or may not be open.
    Active,
    /// A session is being released; the reader stays up.
    ClosingSession,
    /// Reader was stopped (or failed to start). `start()` may be retried.
    Stopped,
}

/// Result of a guarded tag read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRead {
    /// The tag that was in the field.
    pub handle: TagHandle,
    /// Its NDEF message bytes, `None` for a blank or unreadable tag.
    pub message: Option<Vec<u8>>,
}

/// An outstanding technology request and the call that opened it.
#[derive(Debug)]
struct OpenSession {
    id: u64,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct ControllerInner {
    state: ControllerState,
    /// Cached probe result; `None` until probed.
    support: Option<bool>,
    /// `Some` == session open.
    session: Option<OpenSession>,
    /// Last session id handed out.
    session_seq: u64,
}

// ---------------------------------------------------------------------------
// TagSessionController
// ---------------------------------------------------------------------------

/// Exclusive owner of the NFC reader.
///
/// Construct one per reader and pass it (usually as an `Arc`) to whatever
/// needs tag access; there is no global instance.
pub struct TagSessionController {
    hardware: Arc<dyn NfcHardware>,
    config: TagSessionConfig,
    inner: Mutex<ControllerInner>,
    listeners: ListenerRegistry,
}

impl TagSessionController {
    /// Controller with default deadlines.
    pub fn new(hardware: Arc<dyn NfcHardware>) -> Self {
        Self::with_config(hardware, TagSessionConfig::default())
    }

    /// Controller with custom deadlines.
    pub fn with_config(hardware: Arc<dyn NfcHardware>, config: TagSessionConfig) -> Self {
        Self {
            hardware,
            config,
            inner: Mutex::new(ControllerInner {
                state: ControllerState::Uninitialized,
                support: None,
                session: None,
                session_seq: 0,
            }),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &TagSessionConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerState {
        self.inner.lock().state
    }

    /// Cached capability flag. `false` until [`probe_support`](Self::probe_support) says otherwise.
    pub fn is_supported(&self) -> bool {
        self.inner.lock().support == Some(true)
    }

    /// Whether the reader has been started and not stopped since.
    pub fn is_initialized(&self) -> bool {
        matches!(
            self.inner.lock().state,
            ControllerState::Active | ControllerState::ClosingSession
        )
    }

    /// Whether a technology request is outstanding.
    pub fn has_open_session(&self) -> bool {
        self.inner.lock().session.is_some()
    }

    /// Whether a tag listener is registered.
    pub fn has_listener(&self) -> bool {
        self.listeners.is_registered()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Ask the hardware whether NFC is available.
    ///
    /// Never fails: an error or a probe that outlives its deadline counts as
    /// "unsupported". The first answer is cached; later calls return it
    /// without touching the hardware.
    pub async fn probe_support(&self) -> bool {
        if let Some(cached) = self.inner.lock().support {
            return cached;
        }

        let cancel = CancellationToken::new();
        let deadline = self.config.probe_timeout();
        let supported =
            match tokio::time::timeout(deadline, self.hardware.is_supported(&cancel)).await {
                Ok(Ok(supported)) => supported,
                Ok(Err(e)) => {
                    warn!(error = %e, "NFC support probe failed");
                    false
                }
                Err(_) => {
                    cancel.cancel();
                    warn!(
                        timeout_ms = self.config.probe_timeout_ms,
                        "NFC support probe timed out"
                    );
                    false
                }
            };

        self.inner.lock().support = Some(supported);
        info!(supported, "NFC support resolved");
        supported
    }

    /// Bring the reader up.
    ///
    /// A no-op when already active.
    ///
    /// # Errors
    ///
    /// - [`TagError::UnsupportedHardware`] unless a probe reported support.
    /// - [`TagError::SessionStartTimeout`] if the hardware missed the start
    ///   deadline; the controller is left `Stopped`.
    /// - [`TagError::Hardware`] if the hardware refused; also `Stopped`.
    pub async fn start(&self) -> Result<(), TagError> {
        {
            let mut inner = self.inner.lock();
            if inner.support != Some(true) {
                debug!("refusing to start: NFC not supported");
                return Err(TagError::UnsupportedHardware);
            }
            match inner.state {
                ControllerState::Active | ControllerState::ClosingSession => return Ok(()),
                ControllerState::Starting => {
                    return Err(TagError::InvalidState {
                        state: ControllerState::Starting,
                        operation: "start",
                    })
                }
                ControllerState::Uninitialized | ControllerState::Stopped => {
                    inner.state = ControllerState::Starting;
                }
            }
        }

        let cancel = CancellationToken::new();
        let deadline = self.config.start_timeout();
        match tokio::time::timeout(deadline, self.hardware.start(&cancel)).await {
            Ok(Ok(())) => {
                if self.leave_starting(ControllerState::Active) {
                    info!("NFC reader started");
                    Ok(())
                } else {
                    // stop() won the race while the hardware was starting.
                    self.release_reader().await;
                    Err(TagError::InvalidState {
                        state: ControllerState::Stopped,
                        operation: "start",
                    })
                }
            }
            Ok(Err(e)) => {
                self.leave_starting(ControllerState::Stopped);
                warn!(error = %e, "NFC reader failed to start");
                Err(e.into())
            }
            Err(_) => {
                cancel.cancel();
                self.release_reader().await;
                self.leave_starting(ControllerState::Stopped);
                warn!(
                    timeout_ms = self.config.start_timeout_ms,
                    "NFC reader start timed out"
                );
                Err(TagError::SessionStartTimeout {
                    timeout_ms: self.config.start_timeout_ms,
                })
            }
        }
    }

    /// Shut the reader down.
    ///
    /// Safe from any state. Removes the tag listener, abandons any open
    /// session and stops the hardware. Hardware errors are logged and
    /// swallowed: shutdown must not fail its caller.
    pub async fn stop(&self) {
        let (previous, session) = {
            let mut inner = self.inner.lock();
            let previous = inner.state;
            inner.state = ControllerState::Stopped;
            (previous, inner.session.take().map(|open| open.cancel))
        };

        if self.listeners.clear().is_some() {
            if let Err(e) = self.hardware.set_tag_listener(None).await {
                warn!(error = %e, "failed to remove tag listener during stop");
            }
        }

        if let Some(cancel) = session {
            cancel.cancel();
            if let Err(e) = self.hardware.cancel_technology_request().await {
                warn!(error = %e, "failed to release tag session during stop");
            }
        }

        if matches!(
            previous,
            ControllerState::Starting | ControllerState::Active | ControllerState::ClosingSession
        ) {
            self.release_reader().await;
            info!("NFC reader stopped");
        }
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Claim the reader for one tag operation.
    ///
    /// Waits for a tag supporting the configured technology, up to the
    /// session deadline. On any failure the half-open session is released
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// - [`TagError::NotInitialized`] before a successful `start()`.
    /// - [`TagError::SessionBusy`] while another session is open; the
    ///   existing session is untouched.
    /// - [`TagError::SessionAcquisitionTimeout`] if no tag arrived in time.
    /// - [`TagError::Hardware`] if the platform rejected the request.
    pub async fn open_session(&self) -> Result<(), TagError> {
        self.claim_session().await.map(|_| ())
    }

    /// [`open_session`](Self::open_session), returning the id of the
    /// session this call now owns.
    async fn claim_session(&self) -> Result<u64, TagError> {
        let (id, cancel) = {
            let mut inner = self.inner.lock();
            match inner.state {
                ControllerState::Active if inner.session.is_none() => {}
                ControllerState::Active | ControllerState::ClosingSession => {
                    return Err(TagError::SessionBusy)
                }
                _ => return Err(TagError::NotInitialized),
            }
            inner.session_seq += 1;
            let id = inner.session_seq;
            let cancel = CancellationToken::new();
            inner.session = Some(OpenSession {
                id,
                cancel: cancel.clone(),
            });
            (id, cancel)
        };

        let technology = self.config.technology;
        let deadline = self.config.session_timeout();
        let request = self.hardware.request_technology(technology, &cancel);

        match tokio::time::timeout(deadline, request).await {
            Ok(_) if cancel.is_cancelled() => {
                // Released by stop() while we waited for the tag. Whatever
                // session exists now belongs to someone else.
                self.close_session_if(id).await;
                Err(TagError::NotInitialized)
            }
            Ok(Ok(())) => {
                debug!(%technology, session_id = id, "tag session opened");
                Ok(id)
            }
            Ok(Err(e)) => {
                self.close_session_if(id).await;
                debug!(error = %e, "tag technology request failed");
                Err(e.into())
            }
            Err(_) => {
                cancel.cancel();
                self.close_session_if(id).await;
                warn!(
                    timeout_ms = self.config.session_timeout_ms,
                    "no tag presented before the session deadline"
                );
                Err(TagError::SessionAcquisitionTimeout {
                    timeout_ms: self.config.session_timeout_ms,
                })
            }
        }
    }

    /// Release the current session. A no-op when none is open.
    ///
    /// Hardware errors are logged, not returned: after this call the
    /// controller considers the session closed regardless.
    pub async fn close_session(&self) {
        self.release_session(None).await;
    }

    /// Release the session only if it is still the one `id` opened.
    async fn close_session_if(&self, id: u64) {
        self.release_session(Some(id)).await;
    }

    async fn release_session(&self, owner: Option<u64>) {
        let cancel = {
            let mut inner = self.inner.lock();
            let owned = inner
                .session
                .as_ref()
                .is_some_and(|open| owner.map_or(true, |id| open.id == id));
            if !owned {
                if inner.session.is_some() {
                    debug!(
                        stale_session_id = owner,
                        "session belongs to another caller; left open"
                    );
                }
                return;
            }
            let Some(open) = inner.session.take() else {
                return;
            };
            if inner.state == ControllerState::Active {
                inner.state = ControllerState::ClosingSession;
            }
            open.cancel
        };

        cancel.cancel();
        if let Err(e) = self.hardware.cancel_technology_request().await {
            warn!(error = %e, "failed to release tag technology request");
        }

        let mut inner = self.inner.lock();
        if inner.state == ControllerState::ClosingSession {
            inner.state = ControllerState::Active;
        }
        debug!("tag session closed");
    }

    /// Open a session, read the tag in the field, close the session.
    ///
    /// Returns `Ok(None)` when the reader reports no tag. A tag whose NDEF
    /// content can't be read comes back with `message: None`.
    pub async fn read_tag(&self) -> Result<Option<TagRead>, TagError> {
        let id = self.claim_session().await?;
        let outcome = self.read_claimed_tag().await;
        self.close_session_if(id).await;
        outcome
    }

    /// Open a session, overwrite the tag's NDEF message, close the session.
    pub async fn write_ndef(&self, message: &[u8]) -> Result<(), TagError> {
        let id = self.claim_session().await?;
        let outcome = self
            .hardware
            .write_ndef_message(message)
            .await
            .map_err(TagError::from);
        self.close_session_if(id).await;

        if outcome.is_ok() {
            debug!(bytes = message.len(), "NDEF message written");
        }
        outcome
    }

    async fn read_claimed_tag(&self) -> Result<Option<TagRead>, TagError> {
        let Some(handle) = self.hardware.get_tag().await? else {
            debug!("session opened but no tag reported");
            return Ok(None);
        };

        let message = match self.hardware.read_ndef_message().await {
            Ok(message) => message,
            Err(e) => {
                debug!(tag_id = %handle.id_hex(), error = %e, "no NDEF data read from tag");
                None
            }
        };

        debug!(
            tag_id = %handle.id_hex(),
            has_message = message.is_some(),
            "tag read"
        );
        Ok(Some(TagRead { handle, message }))
    }

    // -----------------------------------------------------------------------
    // Tag listener
    // -----------------------------------------------------------------------

    /// Subscribe to tag-discovery events.
    ///
    /// # Errors
    ///
    /// - [`TagError::NotInitialized`] before `start()`, or if `stop()` ran
    ///   while the callback was being installed.
    /// - [`TagError::ListenerAlreadyRegistered`] if another subscriber holds
    ///   the slot.
    /// - [`TagError::Hardware`] if the platform refused the callback; the
    ///   slot is freed again.
    pub async fn register_tag_listener(
        &self,
        listener: TagListener,
    ) -> Result<ListenerToken, TagError> {
        if !self.is_initialized() {
            return Err(TagError::NotInitialized);
        }

        let token = self.listeners.reserve()?;
        if let Err(e) = self.hardware.set_tag_listener(Some(listener)).await {
            self.listeners.release(&token);
            warn!(error = %e, "failed to register tag listener");
            return Err(e.into());
        }

        // stop() may have cleared the slot while the install was in flight,
        // in which case our callback landed after its removal.
        if !self.listeners.holds(&token) || !self.is_initialized() {
            self.listeners.release(&token);
            if !self.listeners.is_registered() {
                if let Err(e) = self.hardware.set_tag_listener(None).await {
                    warn!(error = %e, "failed to remove late tag listener");
                }
            }
            debug!(listener_id = token.id(), "reader stopped during listener registration");
            return Err(TagError::NotInitialized);
        }

        debug!(listener_id = token.id(), "tag listener registered");
        Ok(token)
    }

    /// Give back a listener registration.
    ///
    /// Returns `false` if `token` no longer owns the slot (e.g. `stop()`
    /// already cleared it).
    pub async fn unregister_tag_listener(&self, token: ListenerToken) -> bool {
        if !self.listeners.holds(&token) {
            return false;
        }

        if let Err(e) = self.hardware.set_tag_listener(None).await {
            warn!(error = %e, "failed to remove tag listener");
        }
        let released = self.listeners.release(&token);
        debug!(listener_id = token.id(), "tag listener unregistered");
        released
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Move out of `Starting`. Returns `false` if something else (stop)
    /// already moved the state on.
    fn leave_starting(&self, next: ControllerState) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == ControllerState::Starting {
            inner.state = next;
            true
        } else {
            false
        }
    }

    async fn release_reader(&self) {
        if let Err(e) = self.hardware.stop().await {
            warn!(error = %e, "failed to stop NFC reader");
        }
    }
}

impl std::fmt::Debug for TagSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TagSessionController")
            .field("state", &inner.state)
            .field("support", &inner.support)
            .field("session_open", &inner.session.is_some())
            .field("listener", &self.listeners.is_registered())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::error::HardwareError;
    use crate::tag::hardware::TagTechnology;
    use crate::tag::simulated::{SimulatedReader, SimulatedTag};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn controller(reader: &Arc<SimulatedReader>) -> TagSessionController {
        TagSessionController::new(reader.clone())
    }

    async fn started(reader: &Arc<SimulatedReader>) -> TagSessionController {
        let controller = controller(reader);
        assert!(controller.probe_support().await);
        controller.start().await.unwrap();
        controller
    }

    /// Simulated reader whose listener install parks until `gate` fires.
    struct GatedListenerReader {
        reader: Arc<SimulatedReader>,
        gate: Notify,
    }

    #[async_trait]
    impl NfcHardware for GatedListenerReader {
        async fn is_supported(&self, cancel: &CancellationToken) -> Result<bool, HardwareError> {
            self.reader.is_supported(cancel).await
        }

        async fn start(&self, cancel: &CancellationToken) -> Result<(), HardwareError> {
            self.reader.start(cancel).await
        }

        async fn stop(&self) -> Result<(), HardwareError> {
            self.reader.stop().await
        }

        async fn request_technology(
            &self,
            technology: TagTechnology,
            cancel: &CancellationToken,
        ) -> Result<(), HardwareError> {
            self.reader.request_technology(technology, cancel).await
        }

        async fn cancel_technology_request(&self) -> Result<(), HardwareError> {
            self.reader.cancel_technology_request().await
        }

        async fn get_tag(&self) -> Result<Option<TagHandle>, HardwareError> {
            self.reader.get_tag().await
        }

        async fn read_ndef_message(&self) -> Result<Option<Vec<u8>>, HardwareError> {
            self.reader.read_ndef_message().await
        }

        async fn write_ndef_message(&self, message: &[u8]) -> Result<(), HardwareError> {
            self.reader.write_ndef_message(message).await
        }

        async fn set_tag_listener(
            &self,
            listener: Option<TagListener>,
        ) -> Result<(), HardwareError> {
            if listener.is_some() {
                self.gate.notified().await;
            }
            self.reader.set_tag_listener(listener).await
        }
    }

    #[tokio::test]
    async fn lifecycle_start_stop() {
        let reader = Arc::new(SimulatedReader::new());
        let controller = controller(&reader);
        assert_eq!(controller.state(), ControllerState::Uninitialized);
        assert!(!controller.is_initialized());

        assert!(controller.probe_support().await);
        controller.start().await.unwrap();
        assert_eq!(controller.state(), ControllerState::Active);
        assert!(controller.is_initialized());
        assert!(reader.is_started());

        controller.stop().await;
        assert_eq!(controller.state(), ControllerState::Stopped);
        assert!(!controller.is_initialized());
        assert!(!reader.is_started());

        // Restart after stop is allowed.
        controller.start().await.unwrap();
        assert_eq!(controller.state(), ControllerState::Active);
    }

    #[tokio::test]
    async fn start_requires_support() {
        let reader = Arc::new(SimulatedReader::unsupported());
        let controller = controller(&reader);
        assert!(!controller.probe_support().await);
        assert_eq!(
            controller.start().await.unwrap_err(),
            TagError::UnsupportedHardware
        );
        assert_eq!(controller.state(), ControllerState::Uninitialized);
    }

    #[tokio::test]
    async fn start_without_probe_is_unsupported() {
        let reader = Arc::new(SimulatedReader::new());
        let controller = controller(&reader);
        assert_eq!(
            controller.start().await.unwrap_err(),
            TagError::UnsupportedHardware
        );
    }

    #[tokio::test]
    async fn probe_result_is_cached() {
        let reader = Arc::new(SimulatedReader::new());
        let controller = controller(&reader);
        assert!(controller.probe_support().await);
        reader.set_supported(false);
        assert!(controller.probe_support().await);
        assert_eq!(reader.probe_calls(), 1);
    }

    #[tokio::test]
    async fn probe_error_means_unsupported() {
        let reader = Arc::new(SimulatedReader::new());
        reader.fail_probe(true);
        let controller = controller(&reader);
        assert!(!controller.probe_support().await);
        assert!(!controller.is_supported());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_probe_resolves_to_unsupported() {
        let reader = Arc::new(SimulatedReader::new());
        reader.hang_probe(true);
        let controller = controller(&reader);

        assert!(!controller.probe_support().await);
        assert!(!controller.is_supported());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_start_times_out_and_stops() {
        let reader = Arc::new(SimulatedReader::new());
        reader.hang_start(true);
        let controller = controller(&reader);
        assert!(controller.probe_support().await);

        assert_eq!(
            controller.start().await.unwrap_err(),
            TagError::SessionStartTimeout { timeout_ms: 10_000 }
        );
        assert_eq!(controller.state(), ControllerState::Stopped);
        assert!(!controller.has_open_session());
    }

    #[tokio::test]
    async fn failed_start_leaves_stopped() {
        let reader = Arc::new(SimulatedReader::new());
        reader.fail_start(true);
        let controller = controller(&reader);
        assert!(controller.probe_support().await);

        assert!(matches!(
            controller.start().await,
            Err(TagError::Hardware(HardwareError::Io(_)))
        ));
        assert_eq!(controller.state(), ControllerState::Stopped);
    }

    #[tokio::test]
    async fn open_session_before_start_is_not_initialized() {
        let reader = Arc::new(SimulatedReader::new());
        let controller = controller(&reader);
        assert_eq!(
            controller.open_session().await.unwrap_err(),
            TagError::NotInitialized
        );
        assert_eq!(reader.technology_requests(), 0);
    }

    #[tokio::test]
    async fn second_open_session_is_busy() {
        let reader = Arc::new(SimulatedReader::new());
        reader.present_tag(SimulatedTag::blank(vec![1, 2, 3, 4]));
        let controller = started(&reader).await;

        controller.open_session().await.unwrap();
        assert!(controller.has_open_session());

        assert_eq!(
            controller.open_session().await.unwrap_err(),
            TagError::SessionBusy
        );
        // The original session survives the rejected attempt.
        assert!(controller.has_open_session());
        assert!(reader.technology_outstanding());
        assert_eq!(reader.technology_requests(), 1);

        controller.close_session().await;
        assert!(!controller.has_open_session());
        assert!(!reader.technology_outstanding());
        assert_eq!(controller.state(), ControllerState::Active);
    }

    #[tokio::test]
    async fn stale_acquisition_leaves_newer_session_open() {
        let reader = Arc::new(SimulatedReader::new());
        let controller = Arc::new(started(&reader).await);

        // No tag yet, so the first caller parks waiting for one.
        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.open_session().await })
        };
        tokio::task::yield_now().await;
        assert!(controller.has_open_session());

        controller.stop().await;
        controller.start().await.unwrap();
        reader.present_tag(SimulatedTag::blank(vec![1]));
        controller.open_session().await.unwrap();

        assert_eq!(first.await.unwrap(), Err(TagError::NotInitialized));
        assert!(controller.has_open_session());
        assert!(reader.technology_outstanding());
        assert_eq!(controller.state(), ControllerState::Active);

        controller.close_session().await;
        assert!(!reader.technology_outstanding());
    }

    #[tokio::test]
    async fn read_tag_does_not_close_a_session_it_lost() {
        let reader = Arc::new(SimulatedReader::new());
        let controller = Arc::new(started(&reader).await);

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.read_tag().await })
        };
        tokio::task::yield_now().await;

        controller.stop().await;
        controller.start().await.unwrap();
        reader.present_tag(SimulatedTag::blank(vec![2]));
        controller.open_session().await.unwrap();

        assert_eq!(first.await.unwrap(), Err(TagError::NotInitialized));
        assert!(controller.has_open_session());
        assert!(reader.technology_outstanding());
    }

    #[tokio::test]
    async fn close_without_session_is_noop() {
        let reader = Arc::new(SimulatedReader::new());
        let controller = started(&reader).await;
        controller.close_session().await;
        assert_eq!(reader.cancellations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn acquisition_timeout_releases_session() {
        let reader = Arc::new(SimulatedReader::new());
        let controller = started(&reader).await;

        assert_eq!(
            controller.open_session().await.unwrap_err(),
            TagError::SessionAcquisitionTimeout { timeout_ms: 30_000 }
        );
        assert!(!controller.has_open_session());
        assert!(!reader.technology_outstanding());
        assert_eq!(controller.state(), ControllerState::Active);

        // The reader is usable again afterwards.
        reader.present_tag(SimulatedTag::blank(vec![9]));
        controller.open_session().await.unwrap();
        controller.close_session().await;
    }

    #[tokio::test]
    async fn failing_cancel_still_closes_session() {
        let reader = Arc::new(SimulatedReader::new());
        reader.present_tag(SimulatedTag::blank(vec![1]));
        reader.fail_cancel(true);
        let controller = started(&reader).await;

        controller.open_session().await.unwrap();
        controller.close_session().await;
        assert!(!controller.has_open_session());
        assert_eq!(controller.state(), ControllerState::Active);
    }

    #[tokio::test]
    async fn read_tag_returns_message_and_closes() {
        let reader = Arc::new(SimulatedReader::new());
        reader.present_tag(SimulatedTag::with_message(vec![0xAB, 0xCD], vec![0xD1, 0x01, 0x00, b'T']));
        let controller = started(&reader).await;

        let read = controller.read_tag().await.unwrap().unwrap();
        assert_eq!(read.handle.id_hex(), "abcd");
        assert_eq!(read.message, Some(vec![0xD1, 0x01, 0x00, b'T']));
        assert!(!controller.has_open_session());
        assert_eq!(reader.cancellations(), 1);
    }

    #[tokio::test]
    async fn unreadable_ndef_is_reported_as_blank() {
        let reader = Arc::new(SimulatedReader::new());
        reader.present_tag(SimulatedTag::with_message(vec![7], vec![1, 2, 3]));
        reader.fail_reads(true);
        let controller = started(&reader).await;

        let read = controller.read_tag().await.unwrap().unwrap();
        assert_eq!(read.message, None);
        assert!(!controller.has_open_session());
    }

    #[tokio::test]
    async fn write_failure_closes_session_before_returning() {
        let reader = Arc::new(SimulatedReader::new());
        reader.present_tag(SimulatedTag::blank(vec![1]));
        reader.fail_writes(true);
        let controller = started(&reader).await;

        assert!(matches!(
            controller.write_ndef(&[1, 2, 3]).await,
            Err(TagError::Hardware(_))
        ));
        assert!(!controller.has_open_session());
        assert!(!reader.technology_outstanding());
    }

    #[tokio::test]
    async fn write_lands_on_tag() {
        let reader = Arc::new(SimulatedReader::new());
        reader.present_tag(SimulatedTag::blank(vec![1]));
        let controller = started(&reader).await;

        controller.write_ndef(&[0xD1, 0x01, 0x00, b'T']).await.unwrap();
        assert_eq!(reader.tag_message(), Some(vec![0xD1, 0x01, 0x00, b'T']));
    }

    #[tokio::test]
    async fn stop_releases_open_session_and_listener() {
        let reader = Arc::new(SimulatedReader::new());
        reader.present_tag(SimulatedTag::blank(vec![1]));
        let controller = started(&reader).await;

        controller.open_session().await.unwrap();
        let _token = controller
            .register_tag_listener(Arc::new(|_| {}))
            .await
            .unwrap();

        controller.stop().await;
        assert!(!controller.has_open_session());
        assert!(!controller.has_listener());
        assert!(!reader.has_listener());
        assert!(!reader.technology_outstanding());
        assert_eq!(controller.state(), ControllerState::Stopped);
    }

    #[tokio::test]
    async fn stop_swallows_hardware_errors() {
        let reader = Arc::new(SimulatedReader::new());
        let controller = started(&reader).await;
        reader.fail_stop(true);
        controller.stop().await;
        assert_eq!(controller.state(), ControllerState::Stopped);
    }

    #[tokio::test]
    async fn stop_from_uninitialized_is_safe() {
        let reader = Arc::new(SimulatedReader::new());
        let controller = controller(&reader);
        controller.stop().await;
        assert_eq!(controller.state(), ControllerState::Stopped);
    }

    #[tokio::test]
    async fn listener_slot_is_exclusive() {
        let reader = Arc::new(SimulatedReader::new());
        let controller = started(&reader).await;
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        let token = controller
            .register_tag_listener(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .await
            .unwrap();

        assert_eq!(
            controller
                .register_tag_listener(Arc::new(|_| {}))
                .await
                .unwrap_err(),
            TagError::ListenerAlreadyRegistered
        );

        reader.present_tag(SimulatedTag::blank(vec![5]));
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        assert!(controller.unregister_tag_listener(token).await);
        assert!(!reader.has_listener());

        let again = controller.register_tag_listener(Arc::new(|_| {})).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn stale_token_after_stop_is_rejected() {
        let reader = Arc::new(SimulatedReader::new());
        let controller = started(&reader).await;
        let token = controller
            .register_tag_listener(Arc::new(|_| {}))
            .await
            .unwrap();

        controller.stop().await;
        controller.start().await.unwrap();
        assert!(!controller.unregister_tag_listener(token).await);
    }

    #[tokio::test]
    async fn stop_during_listener_install_leaves_no_callback() {
        let reader = Arc::new(SimulatedReader::new());
        let hardware = Arc::new(GatedListenerReader {
            reader: reader.clone(),
            gate: Notify::new(),
        });
        let controller = Arc::new(TagSessionController::new(hardware.clone()));
        assert!(controller.probe_support().await);
        controller.start().await.unwrap();

        let pending = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.register_tag_listener(Arc::new(|_| {})).await })
        };
        tokio::task::yield_now().await;
        assert!(controller.has_listener());

        controller.stop().await;
        hardware.gate.notify_one();

        assert_eq!(
            pending.await.unwrap().unwrap_err(),
            TagError::NotInitialized
        );
        assert!(!controller.has_listener());
        assert!(!reader.has_listener());
    }

    #[tokio::test]
    async fn listener_install_that_completes_is_kept() {
        let reader = Arc::new(SimulatedReader::new());
        let hardware = Arc::new(GatedListenerReader {
            reader: reader.clone(),
            gate: Notify::new(),
        });
        let controller = TagSessionController::new(hardware.clone());
        assert!(controller.probe_support().await);
        controller.start().await.unwrap();

        hardware.gate.notify_one();
        let token = controller
            .register_tag_listener(Arc::new(|_| {}))
            .await
            .unwrap();
        assert!(reader.has_listener());
        assert!(controller.unregister_tag_listener(token).await);
        assert!(!reader.has_listener());
    }

    #[tokio::test]
    async fn listener_requires_start() {
        let reader = Arc::new(SimulatedReader::new());
        let controller = controller(&reader);
        assert_eq!(
            controller
                .register_tag_listener(Arc::new(|_| {}))
                .await
                .unwrap_err(),
            TagError::NotInitialized
        );
    }
}
