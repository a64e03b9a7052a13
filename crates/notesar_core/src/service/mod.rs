//! Use-case workflows and the coordinator facade.
//!
//! # Responsibility
//! - Orchestrate the note creation and anchor retrieval workflows.
//! - Keep host/FFI layers decoupled from threading and collaborator wiring.

pub mod coordinator;
pub mod locate;
pub mod upload;
