//! Single-slot tag listener registry.
//!
//! Only one tag-discovery callback can be live. Registering hands out a
//! [`ListenerToken`]; the slot stays taken until that token is given back.
//! A second registration is refused instead of silently replacing the
//! first subscriber.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::error::TagError;

/// Proof of an active listener registration.
///
/// Not `Clone`: exactly one holder can unregister.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping the token leaves the listener registered"]
pub struct ListenerToken {
    id: u64,
}

impl ListenerToken {
    /// Registration id, unique per registry.
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Default)]
pub(crate) struct ListenerRegistry {
    active: Mutex<Option<u64>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Claim the slot. Fails if a listener is already registered.
    pub(crate) fn reserve(&self) -> Result<ListenerToken, TagError> {
        let mut active = self.active.lock();
        if active.is_some() {
            return Err(TagError::ListenerAlreadyRegistered);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        *active = Some(id);
        Ok(ListenerToken { id })
    }

    /// Whether `token` owns the slot.
    pub(crate) fn holds(&self, token: &ListenerToken) -> bool {
        *self.active.lock() == Some(token.id)
    }

    /// Free the slot if `token` owns it.
    pub(crate) fn release(&self, token: &ListenerToken) -> bool {
        let mut active = self.active.lock();
        if *active == Some(token.id) {
            *active = None;
            true
        } else {
            false
        }
    }

    /// Free the slot unconditionally, returning the evicted id.
    pub(crate) fn clear(&self) -> Option<u64> {
        self.active.lock().take()
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.active.lock().is_some()
    }
}
