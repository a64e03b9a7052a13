//! Upload workflow: scan wait, cloud create, directory registration.
//!
//! # Responsibility
//! - Drive one record from `Scanning` to `Saved` on a background worker.
//! - Release the creation gate on every exit path before any best-effort work.
//!
//! # Invariants
//! - Registration happens only after the record reaches `Saved`.
//! - A failed upload is never retried; the record is dropped.

use crate::directory::client::AnchorDirectory;
use crate::engine::cloud::{CloudAnchorService, UploadError};
use crate::engine::presenter::{Presenter, Visual};
use crate::model::anchor::{AnchorRecord, AnchorState, RecordId};
use crate::session::gate::GatePermit;
use crate::session::progress::{ProgressMonitor, ScanWaitError};
use log::{error, info};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const WORKER_THREAD_NAME: &str = "notesar-upload";

/// Scan and registration parameters for one upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSettings {
    pub grouping_key: String,
    pub scan_threshold: f32,
    pub poll_interval: Duration,
    pub scan_timeout: Option<Duration>,
}

/// How an upload workflow ended.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Saved { identifier: String, registered: bool },
    Failed(UploadError),
}

/// Handle to a running upload worker.
#[derive(Debug)]
pub struct UploadTicket {
    record_id: RecordId,
    handle: JoinHandle<UploadOutcome>,
}

impl UploadTicket {
    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker. Hosts normally detach instead of joining.
    pub fn join(self) -> UploadOutcome {
        self.handle
            .join()
            .unwrap_or(UploadOutcome::Failed(UploadError::WorkerPanicked))
    }
}

/// Everything the background worker owns for one record.
pub(crate) struct UploadJob {
    pub record: AnchorRecord,
    pub permit: GatePermit,
    pub monitor: Arc<ProgressMonitor>,
    pub cloud: Arc<dyn CloudAnchorService>,
    pub directory: Arc<dyn AnchorDirectory>,
    pub presenter: Arc<dyn Presenter>,
    pub settings: UploadSettings,
}

impl UploadJob {
    /// Moves the job onto its own worker thread.
    ///
    /// On spawn failure the job, and with it the gate permit, is dropped.
    pub fn spawn(self) -> io::Result<UploadTicket> {
        let record_id = self.record.id();
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || self.run())?;
        Ok(UploadTicket { record_id, handle })
    }

    fn run(self) -> UploadOutcome {
        let UploadJob {
            mut record,
            permit,
            monitor,
            cloud,
            directory,
            presenter,
            settings,
        } = self;
        let record_id = record.id();

        let identifier = match scan_and_upload(
            &mut record,
            &monitor,
            cloud.as_ref(),
            presenter.as_ref(),
            &settings,
        ) {
            Ok(identifier) => identifier,
            Err(err) => {
                error!(
                    "event=anchor_upload module=upload status=error record_id={} state={} error={}",
                    record_id,
                    record.state(),
                    err
                );
                drop(permit);
                return UploadOutcome::Failed(err);
            }
        };

        info!(
            "event=anchor_upload module=upload status=ok record_id={} identifier={}",
            record_id, identifier
        );
        drop(permit);
        presenter.show(&record, Visual::Saved);
        presenter.adopt(record);

        let registered = directory.register_identifier(&identifier, &settings.grouping_key);
        if !registered {
            info!(
                "event=anchor_register module=upload status=skipped identifier={} reason=directory_unavailable",
                identifier
            );
        }
        UploadOutcome::Saved {
            identifier,
            registered,
        }
    }
}

fn scan_and_upload(
    record: &mut AnchorRecord,
    monitor: &ProgressMonitor,
    cloud: &dyn CloudAnchorService,
    presenter: &dyn Presenter,
    settings: &UploadSettings,
) -> Result<String, UploadError> {
    presenter.show(record, Visual::Scanning);
    let progress = monitor
        .wait_until(
            settings.scan_threshold,
            settings.poll_interval,
            settings.scan_timeout,
        )
        .map_err(|err| match err {
            ScanWaitError::TimedOut {
                waited,
                last_progress,
            } => UploadError::ScanTimedOut {
                waited_ms: waited.as_millis(),
                last_progress,
            },
            ScanWaitError::Closed => UploadError::Interrupted,
        })?;
    info!(
        "event=scan_ready module=upload status=ok record_id={} progress={:.2}",
        record.id(),
        progress
    );

    record.transition(AnchorState::Uploading)?;
    presenter.show(record, Visual::Uploading);

    let (local, cloud_anchor) = record.upload_parts();
    cloud.create_anchor(local, cloud_anchor)?;

    let identifier = record
        .adopt_cloud_identifier()
        .map(str::to_string)
        .ok_or(UploadError::MissingIdentifier)?;
    record.transition(AnchorState::Saved)?;
    Ok(identifier)
}
