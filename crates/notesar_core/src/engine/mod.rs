//! Contracts consumed from the tracking engine and the host UI.
//!
//! # Responsibility
//! - Define the seams the coordinator drives: cloud anchors, located events,
//!   rendering and note input.
//! - Stay free of any SDK or UI toolkit types.

pub mod cloud;
pub mod presenter;
