//! Domain model shared by the creation and retrieval workflows.
//!
//! # Responsibility
//! - Define the anchor record and its lifecycle states.
//! - Keep engine-owned resources behind opaque handles.
//!
//! # Invariants
//! - Every record carries a process-local `RecordId`.
//! - A local anchor handle is owned by exactly one record.

pub mod anchor;
