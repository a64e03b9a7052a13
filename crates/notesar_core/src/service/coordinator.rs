//! Anchor lifecycle coordinator.
//!
//! # Responsibility
//! - Own the per-session progress monitor, creation gate and pending record.
//! - Route taps, note answers, progress reports and located events to the
//!   upload and locate workflows.
//!
//! # Invariants
//! - At most one record is between `AwaitingNote` and `Uploading`.
//! - No lock is held while a collaborator is called.
//! - Calls return without waiting on scan quality or network I/O, except
//!   `start_locate`, which performs the directory lookup inline.

use crate::config::{ConfigError, CoordinatorConfig};
use crate::directory::client::AnchorDirectory;
use crate::engine::cloud::{CloudAnchorService, LocateEvent, WatchError};
use crate::engine::presenter::{Presenter, Visual};
use crate::model::anchor::{
    AnchorRecord, AnchorState, AnchorStateError, LocalAnchorHandle, RecordId,
};
use crate::service::locate::{LocateOutcome, LocateStart, LocateWorkflow};
use crate::service::upload::{UploadJob, UploadSettings, UploadTicket};
use crate::session::gate::{CreationGate, GatePermit};
use crate::session::progress::{ProgressMonitor, ProgressObserver};
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Coordinator call rejected.
#[derive(Debug)]
pub enum CoordinatorError {
    /// No record is waiting for note text.
    NoPendingRecord(RecordId),
    /// A different record is waiting for note text.
    RecordMismatch {
        expected: RecordId,
        received: RecordId,
    },
    Spawn(std::io::Error),
    State(AnchorStateError),
}

impl Display for CoordinatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPendingRecord(id) => write!(f, "no record awaiting a note: {id}"),
            Self::RecordMismatch { expected, received } => write!(
                f,
                "note answered for {received} while {expected} is awaiting a note"
            ),
            Self::Spawn(err) => write!(f, "failed to start upload worker: {err}"),
            Self::State(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn(err) => Some(err),
            Self::State(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AnchorStateError> for CoordinatorError {
    fn from(value: AnchorStateError) -> Self {
        Self::State(value)
    }
}

/// What happened to a note answer.
#[derive(Debug)]
pub enum NoteDisposition {
    /// Empty or absent note; the record was discarded and the gate released.
    Cancelled,
    Uploading(UploadTicket),
}

struct PendingNote {
    record: AnchorRecord,
    permit: GatePermit,
}

/// Session-scoped coordinator; one per tracking session.
pub struct AnchorCoordinator {
    config: CoordinatorConfig,
    monitor: Arc<ProgressMonitor>,
    gate: Arc<CreationGate>,
    pending: Mutex<Option<PendingNote>>,
    directory: Arc<dyn AnchorDirectory>,
    cloud: Arc<dyn CloudAnchorService>,
    presenter: Arc<dyn Presenter>,
    locate: LocateWorkflow,
}

impl AnchorCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        directory: Arc<dyn AnchorDirectory>,
        cloud: Arc<dyn CloudAnchorService>,
        presenter: Arc<dyn Presenter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let locate = LocateWorkflow::new(
            Arc::clone(&directory),
            Arc::clone(&cloud),
            Arc::clone(&presenter),
            config.note_property_key.as_str(),
        );
        Ok(Self {
            config,
            monitor: Arc::new(ProgressMonitor::new()),
            gate: Arc::new(CreationGate::new()),
            pending: Mutex::new(None),
            directory,
            cloud,
            presenter,
            locate,
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Marks a (re)initialized tracking session: scan quality starts over.
    pub fn begin_session(&self) {
        self.monitor.reset();
        info!(
            "event=session_begin module=coordinator status=ok grouping_key={}",
            self.config.grouping_key
        );
    }

    /// Tears the tracking session down for good.
    ///
    /// An upload still waiting for scan quality ends as `Interrupted` and
    /// later taps are ignored. Uploads already past the scan wait finish on
    /// their own.
    pub fn end_session(&self) {
        self.monitor.close();
        info!(
            "event=session_end module=coordinator status=ok creating={}",
            self.gate.is_held()
        );
    }

    /// Runs the locate workflow for the configured grouping key.
    pub fn start_locate(&self) -> Result<LocateStart, WatchError> {
        self.locate
            .start(&self.config.grouping_key)
            .inspect_err(|err| {
                error!("event=locate_start module=coordinator status=error error={err}");
            })
    }

    /// Observer to register with the tracking engine's frame callback.
    pub fn progress_observer(&self) -> Arc<dyn ProgressObserver> {
        Arc::clone(&self.monitor) as Arc<dyn ProgressObserver>
    }

    pub fn report_progress(&self, value: f32) {
        self.monitor.report(value);
    }

    pub fn scan_progress(&self) -> f32 {
        self.monitor.snapshot()
    }

    /// True while a note is awaiting text, scanning or uploading.
    pub fn is_creating(&self) -> bool {
        self.gate.is_held()
    }

    /// Starts a new note if none is in flight.
    ///
    /// `create_local_anchor` runs only after the gate is taken, so an ignored
    /// tap never creates an engine anchor. Returns the new record's id.
    pub fn handle_tap<F>(&self, create_local_anchor: F) -> Option<RecordId>
    where
        F: FnOnce() -> LocalAnchorHandle,
    {
        if self.monitor.is_closed() {
            debug!("event=tap module=coordinator status=ignored reason=session_ended");
            return None;
        }
        let Some(permit) = self.gate.try_enter() else {
            debug!("event=tap module=coordinator status=ignored reason=note_in_flight");
            return None;
        };

        let mut record = AnchorRecord::created(create_local_anchor());
        let record_id = record.id();
        self.presenter.show(&record, Visual::Created);
        if let Err(err) = record.transition(AnchorState::AwaitingNote) {
            error!("event=tap module=coordinator status=error record_id={record_id} error={err}");
            return None;
        }

        *self.lock_pending() = Some(PendingNote { record, permit });
        info!("event=tap module=coordinator status=awaiting_note record_id={record_id}");
        self.presenter.request_note(record_id);
        Some(record_id)
    }

    /// Accepts the user's answer for the record awaiting a note.
    ///
    /// `None` or blank text cancels. Otherwise the note is attached and the
    /// upload worker is started; this call does not wait for it.
    pub fn submit_note(
        &self,
        record_id: RecordId,
        note: Option<String>,
    ) -> Result<NoteDisposition, CoordinatorError> {
        let PendingNote { mut record, permit } = self.take_pending(record_id)?;

        let note = note.filter(|text| !text.trim().is_empty());
        let Some(note) = note else {
            record.transition(AnchorState::Cancelled)?;
            info!("event=note_input module=coordinator status=cancelled record_id={record_id}");
            self.presenter.discard(record);
            drop(permit);
            return Ok(NoteDisposition::Cancelled);
        };

        record.attach_note(note, &self.config.note_property_key)?;
        record.transition(AnchorState::Scanning)?;
        info!(
            "event=note_input module=coordinator status=ok record_id={} note_chars={}",
            record_id,
            record.note().chars().count()
        );

        let job = UploadJob {
            record,
            permit,
            monitor: Arc::clone(&self.monitor),
            cloud: Arc::clone(&self.cloud),
            directory: Arc::clone(&self.directory),
            presenter: Arc::clone(&self.presenter),
            settings: self.upload_settings(),
        };
        let ticket = job.spawn().map_err(CoordinatorError::Spawn)?;
        Ok(NoteDisposition::Uploading(ticket))
    }

    pub fn handle_locate_event(
        &self,
        event: LocateEvent,
    ) -> Result<LocateOutcome, AnchorStateError> {
        self.locate.handle_event(event)
    }

    /// Forwards a cloud SDK debug message to the log.
    pub fn report_session_log(&self, message: &str) {
        debug!("event=cloud_session_log module=coordinator message={message}");
    }

    /// Forwards a cloud SDK error to the log. Does not change any state.
    pub fn report_session_error(&self, code: &str, message: &str) {
        error!("event=cloud_session_error module=coordinator code={code} message={message}");
    }

    fn upload_settings(&self) -> UploadSettings {
        UploadSettings {
            grouping_key: self.config.grouping_key.clone(),
            scan_threshold: self.config.scan_threshold,
            poll_interval: self.config.scan_poll_interval(),
            scan_timeout: self.config.scan_timeout(),
        }
    }

    fn take_pending(&self, record_id: RecordId) -> Result<PendingNote, CoordinatorError> {
        let mut slot = self.lock_pending();
        match slot.as_ref().map(|pending| pending.record.id()) {
            None => Err(CoordinatorError::NoPendingRecord(record_id)),
            Some(expected) if expected != record_id => Err(CoordinatorError::RecordMismatch {
                expected,
                received: record_id,
            }),
            Some(_) => slot
                .take()
                .ok_or(CoordinatorError::NoPendingRecord(record_id)),
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<PendingNote>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
