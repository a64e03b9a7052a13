//! Host-side collaborator adapter.
//!
//! # Responsibility
//! - Implement the core's cloud and presenter contracts by queueing commands
//!   for the host shell to execute.
//! - Park upload workers until the host reports the remote create result.
//!
//! # Invariants
//! - Commands are drained in the order they were queued.
//! - Every parked upload ends: completed by the host, or `Interrupted` once
//!   the bridge abandons it.
//! - An abandoned bridge parks nothing new.

use crate::api::{AnchorProperty, HostCommand};
use log::{debug, warn};
use notesar_core::{
    AnchorRecord, CloudAnchorRef, CloudAnchorService, LocalAnchorHandle, Presenter, RecordId,
    UploadError, Visual, WatchCriteria, WatchError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};

type UploadReply = Result<Option<String>, String>;

#[derive(Default)]
struct ParkedUploads {
    senders: HashMap<u64, Sender<UploadReply>>,
    closed: bool,
}

#[derive(Default)]
pub(crate) struct HostBridge {
    outbox: Mutex<VecDeque<HostCommand>>,
    parked: Mutex<ParkedUploads>,
    last_request_id: AtomicU64,
}

impl HostBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<HostCommand> {
        lock(&self.outbox).drain(..).collect()
    }

    /// Wakes the worker parked on `request_id`. Returns `false` if none is.
    pub fn complete_upload(&self, request_id: u64, reply: UploadReply) -> bool {
        let Some(sender) = lock(&self.parked).senders.remove(&request_id) else {
            warn!("event=upload_reply module=ffi status=unknown_request request_id={request_id}");
            return false;
        };
        sender.send(reply).is_ok()
    }

    /// Drops every parked upload; their workers fail as `Interrupted`.
    ///
    /// The bridge stays closed: later uploads fail the same way without
    /// queueing a command.
    pub fn abandon_uploads(&self) {
        let abandoned = {
            let mut parked = lock(&self.parked);
            parked.closed = true;
            parked.senders.drain().count()
        };
        if abandoned > 0 {
            warn!("event=upload_reply module=ffi status=abandoned count={abandoned}");
        }
    }

    fn push(&self, command: HostCommand) {
        lock(&self.outbox).push_back(command);
    }
}

impl CloudAnchorService for HostBridge {
    fn create_anchor(
        &self,
        local: &LocalAnchorHandle,
        anchor: &mut CloudAnchorRef,
    ) -> Result<(), UploadError> {
        let request_id = self.last_request_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, receiver) = mpsc::channel();
        {
            let mut parked = lock(&self.parked);
            if parked.closed {
                warn!("event=upload_parked module=ffi status=closed request_id={request_id}");
                return Err(UploadError::Interrupted);
            }
            parked.senders.insert(request_id, sender);
        }

        self.push(HostCommand::CreateCloudAnchor {
            request_id,
            local_anchor: local.raw(),
            properties: anchor
                .app_properties()
                .iter()
                .map(|(key, value)| AnchorProperty {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        });
        debug!("event=upload_parked module=ffi status=waiting request_id={request_id}");

        match receiver.recv() {
            Ok(Ok(Some(identifier))) => {
                anchor.assign_identifier(identifier);
                Ok(())
            }
            Ok(Ok(None)) => Ok(()),
            Ok(Err(message)) => Err(UploadError::Rejected(message)),
            Err(_) => Err(UploadError::Interrupted),
        }
    }

    fn start_watch(&self, criteria: &WatchCriteria) -> Result<(), WatchError> {
        self.push(HostCommand::StartWatch {
            identifiers: criteria.identifiers().to_vec(),
        });
        Ok(())
    }
}

impl Presenter for HostBridge {
    fn show(&self, record: &AnchorRecord, visual: Visual) {
        self.push(HostCommand::Render {
            record_id: record.id().to_string(),
            local_anchor: record.local_anchor().raw(),
            visual: visual.as_str().to_string(),
            note: record.note().to_string(),
        });
    }

    fn request_note(&self, record_id: RecordId) {
        self.push(HostCommand::RequestNote {
            record_id: record_id.to_string(),
        });
    }

    fn discard(&self, record: AnchorRecord) {
        self.push(HostCommand::Discard {
            record_id: record.id().to_string(),
            local_anchor: record.local_anchor().raw(),
        });
    }

    fn adopt(&self, record: AnchorRecord) {
        self.push(HostCommand::PinNote {
            record_id: record.id().to_string(),
            local_anchor: record.local_anchor().raw(),
            note: record.note().to_string(),
            identifier: record.identifier().to_string(),
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::HostBridge;
    use crate::api::HostCommand;
    use notesar_core::{CloudAnchorRef, CloudAnchorService, LocalAnchorHandle, UploadError};
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::{Duration, Instant};

    fn wait_for_request(bridge: &HostBridge) -> u64 {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            for command in bridge.drain() {
                if let HostCommand::CreateCloudAnchor { request_id, .. } = command {
                    return request_id;
                }
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("upload request was never queued");
    }

    #[test]
    fn completed_upload_assigns_identifier() {
        let bridge = Arc::new(HostBridge::new());
        let worker = {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || {
                let mut anchor = CloudAnchorRef::new();
                let result = bridge.create_anchor(&LocalAnchorHandle::new(4), &mut anchor);
                (result, anchor.identifier().map(str::to_string))
            })
        };

        let request_id = wait_for_request(&bridge);
        assert!(bridge.complete_upload(request_id, Ok(Some("abc".to_string()))));

        let (result, identifier) = worker.join().expect("worker thread");
        assert_eq!(result, Ok(()));
        assert_eq!(identifier.as_deref(), Some("abc"));
    }

    #[test]
    fn abandoned_upload_is_interrupted() {
        let bridge = Arc::new(HostBridge::new());
        let worker = {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || {
                let mut anchor = CloudAnchorRef::new();
                bridge.create_anchor(&LocalAnchorHandle::new(5), &mut anchor)
            })
        };

        let request_id = wait_for_request(&bridge);
        bridge.abandon_uploads();

        assert_eq!(
            worker.join().expect("worker thread"),
            Err(UploadError::Interrupted)
        );
        assert!(!bridge.complete_upload(request_id, Ok(Some("late".to_string()))));
    }

    #[test]
    fn upload_after_abandon_fails_without_parking() {
        let bridge = Arc::new(HostBridge::new());
        bridge.abandon_uploads();

        let (done_tx, done_rx) = mpsc::channel();
        {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || {
                let mut anchor = CloudAnchorRef::new();
                let result = bridge.create_anchor(&LocalAnchorHandle::new(6), &mut anchor);
                let _ = done_tx.send(result);
            });
        }

        let result = done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("upload on a closed bridge should return at once");
        assert_eq!(result, Err(UploadError::Interrupted));
        assert!(bridge.drain().is_empty());
    }
}
