//! Cloud anchor subsystem contract.
//!
//! # Responsibility
//! - Describe what the core needs from the spatial-anchor cloud SDK.
//! - Model the SDK's located callbacks as one tagged event type.
//!
//! # Invariants
//! - A watch criteria holds between 1 and `MAX_WATCH_IDENTIFIERS` identifiers.
//! - `create_anchor` is only called from a background worker; it may block.

use crate::directory::client::MAX_WATCH_IDENTIFIERS;
use crate::model::anchor::{AnchorStateError, CloudAnchorRef, LocalAnchorHandle};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Spatial-anchor cloud service as seen by the coordinator.
pub trait CloudAnchorService: Send + Sync {
    /// Uploads `local` and writes the assigned identifier into `anchor`.
    ///
    /// Blocks the calling worker until the remote call resolves.
    fn create_anchor(
        &self,
        local: &LocalAnchorHandle,
        anchor: &mut CloudAnchorRef,
    ) -> Result<(), UploadError>;

    /// Starts an asynchronous watch; results arrive as `LocateEvent`s.
    fn start_watch(&self, criteria: &WatchCriteria) -> Result<(), WatchError>;
}

/// Identifiers a single watch should look for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchCriteria {
    identifiers: Vec<String>,
}

impl WatchCriteria {
    pub fn new(identifiers: Vec<String>) -> Result<Self, WatchError> {
        if identifiers.is_empty() {
            return Err(WatchError::EmptyCriteria);
        }
        if identifiers.len() > MAX_WATCH_IDENTIFIERS {
            return Err(WatchError::TooManyIdentifiers(identifiers.len()));
        }
        Ok(Self { identifiers })
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }
}

/// Outcome reported for one watched identifier.
#[derive(Debug)]
pub enum LocateEvent {
    Located {
        identifier: String,
        local_anchor: LocalAnchorHandle,
        properties: BTreeMap<String, String>,
    },
    /// Not found yet; more events may follow.
    NotLocated { identifier: String },
    AlreadyTracked { identifier: String },
    /// Terminal: the service has no such anchor.
    NotLocatedAnchorDoesNotExist { identifier: String },
}

impl LocateEvent {
    pub fn identifier(&self) -> &str {
        match self {
            Self::Located { identifier, .. }
            | Self::NotLocated { identifier }
            | Self::AlreadyTracked { identifier }
            | Self::NotLocatedAnchorDoesNotExist { identifier } => identifier,
        }
    }
}

/// Failure that ends one upload workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadError {
    /// The cloud service refused the anchor.
    Rejected(String),
    /// The wait for the remote call was cut short.
    Interrupted,
    /// The service reported success without assigning an identifier.
    MissingIdentifier,
    ScanTimedOut { waited_ms: u128, last_progress: f32 },
    State(AnchorStateError),
    WorkerPanicked,
}

impl Display for UploadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(message) => write!(f, "cloud anchor rejected: {message}"),
            Self::Interrupted => write!(f, "cloud anchor upload interrupted"),
            Self::MissingIdentifier => {
                write!(f, "cloud anchor saved without an identifier")
            }
            Self::ScanTimedOut {
                waited_ms,
                last_progress,
            } => write!(
                f,
                "scan quality stuck at {last_progress:.2} after {waited_ms} ms"
            ),
            Self::State(err) => write!(f, "{err}"),
            Self::WorkerPanicked => write!(f, "upload worker panicked"),
        }
    }
}

impl Error for UploadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::State(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AnchorStateError> for UploadError {
    fn from(value: AnchorStateError) -> Self {
        Self::State(value)
    }
}

/// Watch could not be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    EmptyCriteria,
    TooManyIdentifiers(usize),
    Rejected(String),
}

impl Display for WatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCriteria => write!(f, "watch criteria has no identifiers"),
            Self::TooManyIdentifiers(count) => write!(
                f,
                "watch criteria has {count} identifiers; at most {MAX_WATCH_IDENTIFIERS} allowed"
            ),
            Self::Rejected(message) => write!(f, "watch rejected: {message}"),
        }
    }
}

impl Error for WatchError {}

#[cfg(test)]
mod tests {
    use super::{WatchCriteria, WatchError};

    #[test]
    fn criteria_bounds_are_enforced() {
        assert_eq!(
            WatchCriteria::new(Vec::new()).unwrap_err(),
            WatchError::EmptyCriteria
        );

        let eleven: Vec<String> = (0..11).map(|i| format!("id{i}")).collect();
        assert_eq!(
            WatchCriteria::new(eleven).unwrap_err(),
            WatchError::TooManyIdentifiers(11)
        );

        let criteria = WatchCriteria::new(vec!["id1".to_string()]).expect("one id is valid");
        assert_eq!(criteria.identifiers(), ["id1".to_string()]);
    }
}
