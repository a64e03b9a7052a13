//! Sharing directory access.
//!
//! # Responsibility
//! - Map grouping keys to previously uploaded anchor identifiers.
//! - Keep HTTP details out of the workflows.

pub mod client;
