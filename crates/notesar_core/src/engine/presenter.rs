//! Presentation collaborator contract.

use crate::model::anchor::{AnchorRecord, RecordId};
use serde::{Deserialize, Serialize};

/// Visual state the presentation layer should show for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visual {
    Created,
    Scanning,
    Uploading,
    Saved,
    Located,
}

impl Visual {
    pub fn as_str(self) -> &'static str {
        match self {
            Visual::Created => "created",
            Visual::Scanning => "scanning",
            Visual::Uploading => "uploading",
            Visual::Saved => "saved",
            Visual::Located => "located",
        }
    }
}

/// Rendering and note-input side of the host application.
///
/// Methods are called from the tapping thread, the upload worker or the
/// cloud SDK's event thread. Implementations must not block for long and may
/// call back into the coordinator.
pub trait Presenter: Send + Sync {
    fn show(&self, record: &AnchorRecord, visual: Visual);

    /// Asks the user for note text; the answer goes to
    /// `AnchorCoordinator::submit_note` with the same id.
    fn request_note(&self, record_id: RecordId);

    /// Removes a cancelled record's rendering. Dropping `record` returns the
    /// local anchor to the engine.
    fn discard(&self, record: AnchorRecord);

    /// Final handoff of a `Saved` or `Rendered` record.
    fn adopt(&self, record: AnchorRecord);
}
