//! Scan-quality progress monitor.
//!
//! # Responsibility
//! - Hold the latest scan-quality value reported by the tracking engine.
//! - Let the upload worker wait for the save threshold without spinning.
//!
//! # Invariants
//! - The value is always finite and `>= 0.0`.
//! - The lock guards one read or one write, never a collaborator call.
//! - Waiters re-check at least once per poll interval.
//! - Once closed, every wait returns `Closed`.

use log::{debug, trace};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Receiver for the tracking engine's per-frame scan-quality updates.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, value: f32);
}

/// Scan-quality wait that ended without reaching the threshold.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanWaitError {
    TimedOut { waited: Duration, last_progress: f32 },
    /// The monitor was closed; no further reports will arrive.
    Closed,
}

impl Display for ScanWaitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimedOut {
                waited,
                last_progress,
            } => write!(
                f,
                "scan quality stayed at {:.2} for {} ms",
                last_progress,
                waited.as_millis()
            ),
            Self::Closed => write!(f, "scan progress monitor closed"),
        }
    }
}

impl Error for ScanWaitError {}

#[derive(Debug, Default)]
struct ScanState {
    value: f32,
    closed: bool,
}

/// Last-write-wins scalar shared between the frame callback and the uploader.
#[derive(Debug, Default)]
pub struct ProgressMonitor {
    state: Mutex<ScanState>,
    changed: Condvar,
}

impl ProgressMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the current value; negative or non-finite input becomes 0.
    pub fn report(&self, value: f32) {
        let sanitized = if value.is_finite() && value > 0.0 {
            value
        } else {
            0.0
        };
        self.lock().value = sanitized;
        self.changed.notify_all();
        trace!("event=scan_progress module=session value={sanitized:.3}");
    }

    pub fn snapshot(&self) -> f32 {
        self.lock().value
    }

    /// Back to 0.0 for a fresh tracking session.
    pub fn reset(&self) {
        self.lock().value = 0.0;
        debug!("event=scan_progress_reset module=session status=ok");
    }

    /// Ends every current and future wait with [`ScanWaitError::Closed`].
    ///
    /// A closed monitor stays closed; reports still update the value.
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_all();
        debug!("event=scan_progress_close module=session status=ok");
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Blocks until the value reaches `threshold`.
    ///
    /// Wakes on every report and at least once per `interval`. With
    /// `timeout = None` the wait is bounded only by [`ProgressMonitor::close`].
    pub fn wait_until(
        &self,
        threshold: f32,
        interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<f32, ScanWaitError> {
        let started = Instant::now();
        let deadline = timeout.map(|limit| started + limit);
        let mut guard = self.lock();

        loop {
            if guard.closed {
                return Err(ScanWaitError::Closed);
            }
            if guard.value >= threshold {
                return Ok(guard.value);
            }

            let mut step = interval;
            if let Some(limit) = deadline {
                let now = Instant::now();
                if now >= limit {
                    return Err(ScanWaitError::TimedOut {
                        waited: now - started,
                        last_progress: guard.value,
                    });
                }
                step = step.min(limit - now);
            }

            guard = self
                .changed
                .wait_timeout(guard, step)
                .map(|(next, _)| next)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScanState> {
        // Fields are plain values set by single assignments; a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProgressObserver for ProgressMonitor {
    fn on_progress(&self, value: f32) {
        self.report(value);
    }
}
