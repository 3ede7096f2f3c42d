//! Shared utilities for filehistory.
//!
//! This crate provides common utilities used across the filehistory workspace:
//! - Platform directories (data, config, logs, default store root)
//! - Path helpers for display and relativization
//! - RAII-based timing for operation measurement

pub mod path;
pub mod timing;

pub use timing::TimingGuard;
