//! Flutter-facing bridge for the NotesAR anchor core.

pub mod api;
mod bridge;
