//! Anchor lifecycle core for NotesAR.
//! Serializes note creation, gates uploads on scan quality, and drives the
//! directory-backed locate watch. Rendering and SDK internals stay outside.

pub mod config;
pub mod directory;
pub mod engine;
pub mod logging;
pub mod model;
pub mod service;
pub mod session;

pub use config::{ConfigError, CoordinatorConfig};
pub use directory::client::{
    parse_identifier_list, AnchorDirectory, DirectoryError, HttpDirectoryClient,
    MAX_WATCH_IDENTIFIERS,
};
pub use engine::cloud::{CloudAnchorService, LocateEvent, UploadError, WatchCriteria, WatchError};
pub use engine::presenter::{Presenter, Visual};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::anchor::{
    AnchorRecord, AnchorState, AnchorStateError, CloudAnchorRef, LocalAnchorHandle, RecordId,
};
pub use service::coordinator::{AnchorCoordinator, CoordinatorError, NoteDisposition};
pub use service::locate::{LocateOutcome, LocateStart, LocateWorkflow};
pub use service::upload::{UploadOutcome, UploadSettings, UploadTicket};
pub use session::gate::{CreationGate, GatePermit};
pub use session::progress::{ProgressMonitor, ProgressObserver, ScanWaitError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
