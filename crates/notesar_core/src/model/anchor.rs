//! Anchor record domain model.
//!
//! # Responsibility
//! - Define the record threaded through the creation and retrieval workflows.
//! - Own the lifecycle state table and reject illegal transitions.
//!
//! # Invariants
//! - `local_anchor` is owned by exactly one record and is never cloned.
//! - `note` cannot change once the record has left `AwaitingNote`.
//! - `identifier` stays empty until the cloud service assigns one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Process-local identity used to correlate host callbacks with a record.
pub type RecordId = Uuid;

/// Opaque ownership token for an anchor held by the tracking engine.
///
/// Neither `Clone` nor `Copy`, so one record owns it at a time. Dropping it
/// does not touch the engine; the host learns a record's fate only through
/// `Presenter::discard` or `Presenter::adopt`. A failed upload does neither,
/// so its local anchor and marker stay as last shown.
#[derive(Debug, PartialEq, Eq)]
pub struct LocalAnchorHandle(u64);

impl LocalAnchorHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Engine-defined token, for adapters that address anchors by number.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Local view of the remote anchor representation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudAnchorRef {
    app_properties: BTreeMap<String, String>,
    identifier: Option<String>,
}

impl CloudAnchorRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ref for an anchor the cloud service already knows about.
    pub fn existing(
        identifier: impl Into<String>,
        app_properties: BTreeMap<String, String>,
    ) -> Self {
        Self {
            app_properties,
            identifier: Some(identifier.into()),
        }
    }

    pub fn app_properties(&self) -> &BTreeMap<String, String> {
        &self.app_properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.app_properties.get(key).map(String::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.app_properties.insert(key.into(), value.into());
    }

    /// Identifier assigned by the remote service, if the upload has completed.
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Called by cloud adapters once the remote create call succeeds.
    pub fn assign_identifier(&mut self, identifier: impl Into<String>) {
        self.identifier = Some(identifier.into());
    }
}

/// Lifecycle of one anchor record.
///
/// Creation path: `Created -> AwaitingNote -> Scanning -> Uploading -> Saved`.
/// Retrieval path: `Located -> Rendered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorState {
    Created,
    AwaitingNote,
    Scanning,
    Uploading,
    Saved,
    Located,
    Rendered,
    Cancelled,
}

impl AnchorState {
    pub fn can_transition_to(self, next: AnchorState) -> bool {
        use AnchorState::*;
        matches!(
            (self, next),
            (Created, AwaitingNote)
                | (AwaitingNote, Scanning)
                | (Scanning, Uploading)
                | (Uploading, Saved)
                | (Located, Rendered)
                | (Created | AwaitingNote | Scanning, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AnchorState::Saved | AnchorState::Rendered | AnchorState::Cancelled
        )
    }

    /// States during which the record holds the creation gate.
    pub fn holds_creation_gate(self) -> bool {
        matches!(
            self,
            AnchorState::AwaitingNote | AnchorState::Scanning | AnchorState::Uploading
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnchorState::Created => "created",
            AnchorState::AwaitingNote => "awaiting_note",
            AnchorState::Scanning => "scanning",
            AnchorState::Uploading => "uploading",
            AnchorState::Saved => "saved",
            AnchorState::Located => "located",
            AnchorState::Rendered => "rendered",
            AnchorState::Cancelled => "cancelled",
        }
    }
}

impl Display for AnchorState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected lifecycle mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorStateError {
    InvalidTransition {
        from: AnchorState,
        to: AnchorState,
    },
    /// Note edits are only accepted while awaiting input.
    NoteLocked(AnchorState),
    EmptyNote,
}

impl Display for AnchorStateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { from, to } => {
                write!(f, "invalid anchor transition: {from} -> {to}")
            }
            Self::NoteLocked(state) => write!(f, "note cannot change in state {state}"),
            Self::EmptyNote => write!(f, "note must not be empty"),
        }
    }
}

impl Error for AnchorStateError {}

/// One note bound to one physical anchor.
#[derive(Debug)]
pub struct AnchorRecord {
    id: RecordId,
    local_anchor: LocalAnchorHandle,
    cloud_anchor: CloudAnchorRef,
    identifier: String,
    note: String,
    state: AnchorState,
}

impl AnchorRecord {
    /// Starts the creation path for a freshly placed anchor.
    pub fn created(local_anchor: LocalAnchorHandle) -> Self {
        Self {
            id: Uuid::new_v4(),
            local_anchor,
            cloud_anchor: CloudAnchorRef::new(),
            identifier: String::new(),
            note: String::new(),
            state: AnchorState::Created,
        }
    }

    /// Starts the retrieval path for an anchor reported by a watch.
    ///
    /// `note` is read from `cloud_anchor`'s properties under `note_key`; a
    /// missing property leaves the note empty.
    pub fn located(
        local_anchor: LocalAnchorHandle,
        cloud_anchor: CloudAnchorRef,
        note_key: &str,
    ) -> Self {
        let note = cloud_anchor.property(note_key).unwrap_or_default().to_string();
        let identifier = cloud_anchor.identifier().unwrap_or_default().to_string();
        Self {
            id: Uuid::new_v4(),
            local_anchor,
            cloud_anchor,
            identifier,
            note,
            state: AnchorState::Located,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn state(&self) -> AnchorState {
        self.state
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn local_anchor(&self) -> &LocalAnchorHandle {
        &self.local_anchor
    }

    pub fn cloud_anchor(&self) -> &CloudAnchorRef {
        &self.cloud_anchor
    }

    /// Splits borrows for the remote create call, which reads the local
    /// handle while writing the assigned identifier into the cloud ref.
    pub(crate) fn upload_parts(&mut self) -> (&LocalAnchorHandle, &mut CloudAnchorRef) {
        (&self.local_anchor, &mut self.cloud_anchor)
    }

    pub fn transition(&mut self, next: AnchorState) -> Result<(), AnchorStateError> {
        if !self.state.can_transition_to(next) {
            return Err(AnchorStateError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Stores the note on the record and in the cloud anchor's properties.
    pub fn attach_note(
        &mut self,
        note: impl Into<String>,
        property_key: &str,
    ) -> Result<(), AnchorStateError> {
        if self.state != AnchorState::AwaitingNote {
            return Err(AnchorStateError::NoteLocked(self.state));
        }
        let note = note.into();
        if note.trim().is_empty() {
            return Err(AnchorStateError::EmptyNote);
        }
        self.cloud_anchor.set_property(property_key, note.as_str());
        self.note = note;
        Ok(())
    }

    /// Copies the identifier the cloud service wrote into the cloud ref.
    ///
    /// Returns `None` when the service reported success without assigning one.
    pub fn adopt_cloud_identifier(&mut self) -> Option<&str> {
        let identifier = self.cloud_anchor.identifier()?.to_string();
        self.identifier = identifier;
        Some(self.identifier.as_str())
    }
}
