//! Per-coordinator shared state.
//!
//! # Responsibility
//! - Hold the scan-quality scalar and the creation gate flag.
//!
//! # Invariants
//! - Each value has its own lock; neither is ever process-global.

pub mod gate;
pub mod progress;
