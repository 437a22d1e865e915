//! Command orchestration layer.
//!
//! Provides high-level command functions that coordinate between
//! the tracking kernel and the persistence layer.

pub mod audit;
pub mod tracked_write;
