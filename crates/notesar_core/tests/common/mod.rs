#![allow(dead_code)]

use notesar_core::{
    AnchorCoordinator, AnchorDirectory, AnchorRecord, AnchorState, CloudAnchorRef,
    CloudAnchorService, CoordinatorConfig, LocalAnchorHandle, Presenter, RecordId, UploadError,
    Visual, WatchCriteria, WatchError,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const GROUPING_KEY: &str = "helloworld";

/// In-memory directory that records every call.
#[derive(Default)]
pub struct RecordingDirectory {
    listing: Vec<String>,
    pub list_calls: Mutex<Vec<String>>,
    pub registrations: Mutex<Vec<(String, String)>>,
}

impl RecordingDirectory {
    pub fn with_listing(identifiers: &[&str]) -> Self {
        Self {
            listing: identifiers.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn registrations(&self) -> Vec<(String, String)> {
        self.registrations.lock().unwrap().clone()
    }
}

impl AnchorDirectory for RecordingDirectory {
    fn list_identifiers(&self, grouping_key: &str) -> Vec<String> {
        self.list_calls
            .lock()
            .unwrap()
            .push(grouping_key.to_string());
        self.listing.clone()
    }

    fn register_identifier(&self, identifier: &str, grouping_key: &str) -> bool {
        self.registrations
            .lock()
            .unwrap()
            .push((identifier.to_string(), grouping_key.to_string()));
        true
    }
}

/// Scripted answer for one `create_anchor` call.
pub enum CloudScript {
    Assign(&'static str),
    SucceedWithoutIdentifier,
    Fail(UploadError),
}

/// Cloud service double answering uploads from a script.
#[derive(Default)]
pub struct ScriptedCloud {
    pub script: Mutex<VecDeque<CloudScript>>,
    pub uploads: Mutex<Vec<(u64, CloudAnchorRef)>>,
    pub watches: Mutex<Vec<Vec<String>>>,
    pub reject_watch: bool,
}

impl ScriptedCloud {
    pub fn answering(script: Vec<CloudScript>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn watches(&self) -> Vec<Vec<String>> {
        self.watches.lock().unwrap().clone()
    }
}

impl CloudAnchorService for ScriptedCloud {
    fn create_anchor(
        &self,
        local: &LocalAnchorHandle,
        anchor: &mut CloudAnchorRef,
    ) -> Result<(), UploadError> {
        self.uploads
            .lock()
            .unwrap()
            .push((local.raw(), anchor.clone()));
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(CloudScript::Fail(UploadError::Interrupted));
        match next {
            CloudScript::Assign(identifier) => {
                anchor.assign_identifier(identifier);
                Ok(())
            }
            CloudScript::SucceedWithoutIdentifier => Ok(()),
            CloudScript::Fail(err) => Err(err),
        }
    }

    fn start_watch(&self, criteria: &WatchCriteria) -> Result<(), WatchError> {
        if self.reject_watch {
            return Err(WatchError::Rejected("session not started".to_string()));
        }
        self.watches
            .lock()
            .unwrap()
            .push(criteria.identifiers().to_vec());
        Ok(())
    }
}

/// Snapshot of an adopted record, taken when the presenter receives it.
#[derive(Debug, Clone, PartialEq)]
pub struct AdoptedRecord {
    pub id: RecordId,
    pub state: AnchorState,
    pub note: String,
    pub identifier: String,
    pub local_anchor: u64,
}

/// Presenter double that records every call.
#[derive(Default)]
pub struct RecordingPresenter {
    pub shown: Mutex<Vec<(RecordId, Visual)>>,
    pub note_requests: Mutex<Vec<RecordId>>,
    pub discarded: Mutex<Vec<(RecordId, u64)>>,
    pub adopted: Mutex<Vec<AdoptedRecord>>,
    /// `show` panics on this visual, before recording anything.
    pub panic_on: Option<Visual>,
}

impl RecordingPresenter {
    pub fn visuals_for(&self, record_id: RecordId) -> Vec<Visual> {
        self.shown
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == record_id)
            .map(|(_, visual)| *visual)
            .collect()
    }

    pub fn adopted(&self) -> Vec<AdoptedRecord> {
        self.adopted.lock().unwrap().clone()
    }

    pub fn discarded(&self) -> Vec<(RecordId, u64)> {
        self.discarded.lock().unwrap().clone()
    }
}

impl Presenter for RecordingPresenter {
    fn show(&self, record: &AnchorRecord, visual: Visual) {
        if self.panic_on == Some(visual) {
            panic!("presenter failed to show {}", visual.as_str());
        }
        self.shown.lock().unwrap().push((record.id(), visual));
    }

    fn request_note(&self, record_id: RecordId) {
        self.note_requests.lock().unwrap().push(record_id);
    }

    fn discard(&self, record: AnchorRecord) {
        self.discarded
            .lock()
            .unwrap()
            .push((record.id(), record.local_anchor().raw()));
    }

    fn adopt(&self, record: AnchorRecord) {
        self.adopted.lock().unwrap().push(AdoptedRecord {
            id: record.id(),
            state: record.state(),
            note: record.note().to_string(),
            identifier: record.identifier().to_string(),
            local_anchor: record.local_anchor().raw(),
        });
    }
}

pub struct Harness {
    pub coordinator: AnchorCoordinator,
    pub directory: Arc<RecordingDirectory>,
    pub cloud: Arc<ScriptedCloud>,
    pub presenter: Arc<RecordingPresenter>,
}

pub fn fast_config() -> CoordinatorConfig {
    let mut config = CoordinatorConfig::with_directory("http://127.0.0.1:9/api/anchors");
    config.grouping_key = GROUPING_KEY.to_string();
    config.scan_poll_interval_ms = 10;
    config
}

pub fn harness_with(
    config: CoordinatorConfig,
    directory: RecordingDirectory,
    cloud: ScriptedCloud,
) -> Harness {
    harness_with_presenter(config, directory, cloud, RecordingPresenter::default())
}

pub fn harness_with_presenter(
    config: CoordinatorConfig,
    directory: RecordingDirectory,
    cloud: ScriptedCloud,
    presenter: RecordingPresenter,
) -> Harness {
    let directory = Arc::new(directory);
    let cloud = Arc::new(cloud);
    let presenter = Arc::new(presenter);
    let coordinator = AnchorCoordinator::new(
        config,
        Arc::clone(&directory) as Arc<dyn AnchorDirectory>,
        Arc::clone(&cloud) as Arc<dyn CloudAnchorService>,
        Arc::clone(&presenter) as Arc<dyn Presenter>,
    )
    .expect("test config should be valid");
    Harness {
        coordinator,
        directory,
        cloud,
        presenter,
    }
}

pub fn harness(cloud: ScriptedCloud) -> Harness {
    harness_with(fast_config(), RecordingDirectory::default(), cloud)
}
