//! Single-writer gate over the note creation workflow.
//!
//! # Responsibility
//! - Admit at most one in-flight note (awaiting text, scanning or uploading).
//! - Drop, never queue, taps that arrive while a note is in flight.
//!
//! # Invariants
//! - Each successful acquire is matched by exactly one release.
//! - `GatePermit` releases on drop, so unwinding paths release too.

use log::debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Boolean flag behind its own lock.
#[derive(Debug, Default)]
pub struct CreationGate {
    held: Mutex<bool>,
}

impl CreationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-set. Returns `false` without side effects when already held.
    pub fn try_acquire(&self) -> bool {
        let mut held = self.lock();
        if *held {
            return false;
        }
        *held = true;
        true
    }

    pub fn release(&self) {
        *self.lock() = false;
    }

    pub fn is_held(&self) -> bool {
        *self.lock()
    }

    /// Acquires and wraps the hold in a permit that releases on drop.
    pub fn try_enter(self: &Arc<Self>) -> Option<GatePermit> {
        if !self.try_acquire() {
            return None;
        }
        Some(GatePermit {
            gate: Arc::clone(self),
        })
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof of holding the creation gate.
#[derive(Debug)]
#[must_use = "dropping the permit releases the creation gate"]
pub struct GatePermit {
    gate: Arc<CreationGate>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.release();
        debug!("event=creation_gate module=session status=released");
    }
}
