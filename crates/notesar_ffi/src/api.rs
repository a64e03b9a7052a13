//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the anchor coordinator to Dart via FRB as one process-wide session.
//! - Translate host callbacks (taps, frames, SDK results) into core calls and
//!   core requests into drainable [`HostCommand`]s.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Action functions return an empty string on success and an error message
//!   otherwise.
//! - At most one session is live; starting a new one stops the previous one.

use crate::bridge::HostBridge;
use log::{info, warn};
use notesar_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, AnchorCoordinator,
    AnchorDirectory, CloudAnchorService, CoordinatorConfig, HttpDirectoryClient,
    LocalAnchorHandle, LocateEvent, LocateOutcome, LocateStart, NoteDisposition, Presenter,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

static SESSION: Mutex<Option<BridgeSession>> = Mutex::new(None);

#[derive(Clone)]
struct BridgeSession {
    coordinator: Arc<AnchorCoordinator>,
    bridge: Arc<HostBridge>,
}

impl BridgeSession {
    /// Ends scan waits and parked uploads; both workers finish as interrupted.
    fn shut_down(&self) {
        self.coordinator.end_session();
        self.bridge.abandon_uploads();
    }
}

/// Cloud anchor app property as a key/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorProperty {
    pub key: String,
    pub value: String,
}

/// Work the host shell must perform on behalf of the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// Draw or refresh the marker of a record (`created|scanning|uploading|saved|located`).
    Render {
        record_id: String,
        local_anchor: u64,
        visual: String,
        note: String,
    },
    /// Open the note prompt; answer with [`session_submit_note`].
    RequestNote { record_id: String },
    /// Remove the marker and destroy the local anchor.
    Discard { record_id: String, local_anchor: u64 },
    /// Keep the anchor and its note on screen for the rest of the session.
    PinNote {
        record_id: String,
        local_anchor: u64,
        note: String,
        identifier: String,
    },
    /// Create the remote anchor; answer with [`session_complete_upload`].
    CreateCloudAnchor {
        request_id: u64,
        local_anchor: u64,
        properties: Vec<AnchorProperty>,
    },
    /// Start a cloud watch over these identifiers.
    StartWatch { identifiers: Vec<String> },
}

/// Result envelope for [`session_start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStartResponse {
    /// Whether a session is now live.
    pub ok: bool,
    /// Identifiers the locate watch was opened for (empty when none).
    pub watching: Vec<String>,
    /// Human-readable response message for diagnostics.
    pub message: String,
}

impl SessionStartResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            watching: Vec::new(),
            message: message.into(),
        }
    }
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Starts a tracking session and opens the locate watch.
///
/// `config_json` is a `CoordinatorConfig` document; only `directory_url` is
/// required.
///
/// # FFI contract
/// - Async call; performs the directory listing over HTTP.
/// - Replaces any live session. Its scanning and parked uploads end as
///   interrupted.
/// - Never panics; a failed watch still leaves the session live.
pub fn session_start(config_json: String) -> SessionStartResponse {
    let config = match CoordinatorConfig::from_json(&config_json) {
        Ok(config) => config,
        Err(err) => return SessionStartResponse::failure(format!("session_start failed: {err}")),
    };
    let directory = match HttpDirectoryClient::from_config(&config) {
        Ok(client) => client,
        Err(err) => return SessionStartResponse::failure(format!("session_start failed: {err}")),
    };

    let bridge = Arc::new(HostBridge::new());
    let coordinator = match AnchorCoordinator::new(
        config,
        Arc::new(directory) as Arc<dyn AnchorDirectory>,
        Arc::clone(&bridge) as Arc<dyn CloudAnchorService>,
        Arc::clone(&bridge) as Arc<dyn Presenter>,
    ) {
        Ok(coordinator) => Arc::new(coordinator),
        Err(err) => return SessionStartResponse::failure(format!("session_start failed: {err}")),
    };
    coordinator.begin_session();

    let session = BridgeSession {
        coordinator: Arc::clone(&coordinator),
        bridge,
    };
    if let Some(previous) = lock_session().replace(session) {
        previous.shut_down();
        info!("event=session_start module=ffi status=replaced_previous");
    }

    match coordinator.start_locate() {
        Ok(LocateStart::Watching { identifiers }) => SessionStartResponse {
            ok: true,
            message: format!("Watching {} anchor(s).", identifiers.len()),
            watching: identifiers,
        },
        Ok(LocateStart::NoAnchors) => SessionStartResponse {
            ok: true,
            watching: Vec::new(),
            message: "No shared anchors.".to_string(),
        },
        Err(err) => SessionStartResponse {
            ok: true,
            watching: Vec::new(),
            message: format!("locate watch failed: {err}"),
        },
    }
}

/// Drops the live session. Returns `false` when none was running.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Upload workers waiting for scan quality or a cloud result end as
///   interrupted.
#[flutter_rust_bridge::frb(sync)]
pub fn session_stop() -> bool {
    let Some(session) = lock_session().take() else {
        return false;
    };
    session.shut_down();
    info!("event=session_stop module=ffi status=ok");
    true
}

/// Handles a placement tap on a detected surface.
///
/// `local_anchor` is the engine handle the host will create for this tap.
/// Returns the new record id, or `None` while another note is in flight or no
/// session is live. In that case the host must not keep the local anchor.
///
/// # FFI contract
/// - Sync call, non-blocking.
#[flutter_rust_bridge::frb(sync)]
pub fn session_tap(local_anchor: u64) -> Option<String> {
    let session = current_session()?;
    session
        .coordinator
        .handle_tap(|| LocalAnchorHandle::new(local_anchor))
        .map(|record_id| record_id.to_string())
}

/// Answers a `RequestNote` command. `None` or blank text cancels the note.
///
/// # FFI contract
/// - Sync call; starts the upload worker and returns without waiting for it.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn session_submit_note(record_id: String, note: Option<String>) -> String {
    let Some(session) = current_session() else {
        return "session_submit_note failed: no live session".to_string();
    };
    let record_id = match Uuid::parse_str(record_id.trim()) {
        Ok(id) => id,
        Err(err) => return format!("session_submit_note failed: invalid record id: {err}"),
    };
    match session.coordinator.submit_note(record_id, note) {
        // The ticket is detached; the outcome reaches the host as commands.
        Ok(NoteDisposition::Uploading(_)) => String::new(),
        Ok(NoteDisposition::Cancelled) => String::new(),
        Err(err) => format!("session_submit_note failed: {err}"),
    }
}

/// Forwards the per-frame scan-quality scalar.
///
/// # FFI contract
/// - Sync call, non-blocking; safe to call every frame.
/// - Ignored when no session is live.
#[flutter_rust_bridge::frb(sync)]
pub fn session_report_progress(value: f32) {
    if let Some(session) = current_session() {
        session.coordinator.report_progress(value);
    }
}

/// Answers a `CreateCloudAnchor` command.
///
/// Exactly one of `identifier` and `error` is expected. A success without an
/// identifier fails the upload as missing identifier.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn session_complete_upload(
    request_id: u64,
    identifier: Option<String>,
    error: Option<String>,
) -> String {
    let Some(session) = current_session() else {
        return "session_complete_upload failed: no live session".to_string();
    };
    let reply = match error {
        Some(message) => Err(message),
        None => Ok(identifier.filter(|id| !id.trim().is_empty())),
    };
    if session.bridge.complete_upload(request_id, reply) {
        String::new()
    } else {
        format!("session_complete_upload failed: unknown request {request_id}")
    }
}

/// Forwards one watch result.
///
/// `status` is one of `located|not_located|already_tracked|does_not_exist`;
/// `located` requires `local_anchor`.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn session_anchor_located(
    identifier: String,
    status: String,
    local_anchor: Option<u64>,
    properties: Vec<AnchorProperty>,
) -> String {
    let event = match to_locate_event(identifier, &status, local_anchor, properties) {
        Ok(event) => event,
        Err(message) => return format!("session_anchor_located failed: {message}"),
    };
    let Some(session) = current_session() else {
        return "session_anchor_located failed: no live session".to_string();
    };
    match session.coordinator.handle_locate_event(event) {
        Ok(LocateOutcome::Rendered(_))
        | Ok(LocateOutcome::Pending)
        | Ok(LocateOutcome::AlreadyTracked)
        | Ok(LocateOutcome::DoesNotExist) => String::new(),
        Err(err) => format!("session_anchor_located failed: {err}"),
    }
}

/// Forwards a cloud SDK error to the core log.
#[flutter_rust_bridge::frb(sync)]
pub fn session_report_error(code: String, message: String) {
    match current_session() {
        Some(session) => session.coordinator.report_session_error(&code, &message),
        None => warn!("event=cloud_session_error module=ffi status=no_session code={code}"),
    }
}

/// Forwards a cloud SDK debug message to the core log.
#[flutter_rust_bridge::frb(sync)]
pub fn session_report_log(message: String) {
    if let Some(session) = current_session() {
        session.coordinator.report_session_log(&message);
    }
}

/// Drains queued host commands in issue order.
///
/// # FFI contract
/// - Sync call, non-blocking; intended to be polled from the frame loop.
/// - Returns an empty list when no session is live.
#[flutter_rust_bridge::frb(sync)]
pub fn session_poll_commands() -> Vec<HostCommand> {
    current_session()
        .map(|session| session.bridge.drain())
        .unwrap_or_default()
}

/// True while a note is awaiting text, scanning or uploading.
#[flutter_rust_bridge::frb(sync)]
pub fn session_is_creating() -> bool {
    current_session().is_some_and(|session| session.coordinator.is_creating())
}

fn to_locate_event(
    identifier: String,
    status: &str,
    local_anchor: Option<u64>,
    properties: Vec<AnchorProperty>,
) -> Result<LocateEvent, String> {
    match status.trim().to_ascii_lowercase().as_str() {
        "located" => {
            let Some(local_anchor) = local_anchor else {
                return Err("located status requires local_anchor".to_string());
            };
            let properties = properties
                .into_iter()
                .map(|property| (property.key, property.value))
                .collect::<BTreeMap<_, _>>();
            Ok(LocateEvent::Located {
                identifier,
                local_anchor: LocalAnchorHandle::new(local_anchor),
                properties,
            })
        }
        "not_located" => Ok(LocateEvent::NotLocated { identifier }),
        "already_tracked" => Ok(LocateEvent::AlreadyTracked { identifier }),
        "does_not_exist" => Ok(LocateEvent::NotLocatedAnchorDoesNotExist { identifier }),
        other => Err(format!("unsupported status `{other}`")),
    }
}

fn current_session() -> Option<BridgeSession> {
    lock_session().clone()
}

fn lock_session() -> MutexGuard<'static, Option<BridgeSession>> {
    SESSION.lock().unwrap_or_else(PoisonError::into_inner)
}
