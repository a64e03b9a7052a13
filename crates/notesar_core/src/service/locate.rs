//! Locate workflow: directory lookup, watch, located-event handling.
//!
//! # Responsibility
//! - Open one watch over the identifiers stored for a grouping key.
//! - Turn `Located` events into rendered anchor records.
//!
//! # Invariants
//! - Never touches the creation gate; runs alongside any upload.
//! - Negative outcomes are logged and never retried.

use crate::directory::client::AnchorDirectory;
use crate::engine::cloud::{CloudAnchorService, LocateEvent, WatchCriteria, WatchError};
use crate::engine::presenter::{Presenter, Visual};
use crate::model::anchor::{
    AnchorRecord, AnchorState, AnchorStateError, CloudAnchorRef, RecordId,
};
use log::{debug, info, warn};
use std::sync::Arc;

/// Result of starting the locate workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateStart {
    /// The directory returned nothing; no watch was opened.
    NoAnchors,
    Watching { identifiers: Vec<String> },
}

/// Reaction to one located-event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateOutcome {
    Rendered(RecordId),
    Pending,
    AlreadyTracked,
    DoesNotExist,
}

pub struct LocateWorkflow {
    directory: Arc<dyn AnchorDirectory>,
    cloud: Arc<dyn CloudAnchorService>,
    presenter: Arc<dyn Presenter>,
    note_property_key: String,
}

impl LocateWorkflow {
    pub fn new(
        directory: Arc<dyn AnchorDirectory>,
        cloud: Arc<dyn CloudAnchorService>,
        presenter: Arc<dyn Presenter>,
        note_property_key: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            cloud,
            presenter,
            note_property_key: note_property_key.into(),
        }
    }

    /// Lists identifiers for `grouping_key` and watches them, if any.
    pub fn start(&self, grouping_key: &str) -> Result<LocateStart, WatchError> {
        let identifiers = self.directory.list_identifiers(grouping_key);
        if identifiers.is_empty() {
            info!(
                "event=locate_start module=locate status=skipped grouping_key={} reason=no_identifiers",
                grouping_key
            );
            return Ok(LocateStart::NoAnchors);
        }

        let criteria = WatchCriteria::new(identifiers)?;
        info!(
            "event=locate_start module=locate status=watching identifiers={:?}",
            criteria.identifiers()
        );
        self.cloud.start_watch(&criteria)?;
        Ok(LocateStart::Watching {
            identifiers: criteria.identifiers().to_vec(),
        })
    }

    pub fn handle_event(&self, event: LocateEvent) -> Result<LocateOutcome, AnchorStateError> {
        match event {
            LocateEvent::Located {
                identifier,
                local_anchor,
                properties,
            } => {
                let cloud_anchor = CloudAnchorRef::existing(identifier, properties);
                let mut record =
                    AnchorRecord::located(local_anchor, cloud_anchor, &self.note_property_key);
                info!(
                    "event=anchor_located module=locate status=ok identifier={} record_id={} note_chars={}",
                    record.identifier(),
                    record.id(),
                    record.note().chars().count()
                );
                self.presenter.show(&record, Visual::Located);
                record.transition(AnchorState::Rendered)?;
                let record_id = record.id();
                self.presenter.adopt(record);
                Ok(LocateOutcome::Rendered(record_id))
            }
            LocateEvent::NotLocated { identifier } => {
                debug!("event=anchor_located module=locate status=pending identifier={identifier}");
                Ok(LocateOutcome::Pending)
            }
            LocateEvent::AlreadyTracked { identifier } => {
                info!(
                    "event=anchor_located module=locate status=already_tracked identifier={identifier}"
                );
                Ok(LocateOutcome::AlreadyTracked)
            }
            LocateEvent::NotLocatedAnchorDoesNotExist { identifier } => {
                warn!(
                    "event=anchor_located module=locate status=does_not_exist identifier={identifier}"
                );
                Ok(LocateOutcome::DoesNotExist)
            }
        }
    }
}
