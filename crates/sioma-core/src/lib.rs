//! Foundational low-level utilities shared across SIOMA crates.
//!
//! Provides clock helpers for cache expiry, display-timezone resolution used
//! when normalizing store timestamps, and atomic report writes.

pub mod display_timezone;
pub mod report_io;
pub mod time_utils;

pub use display_timezone::DisplayTimezone;
pub use report_io::write_json_report;
pub use time_utils::{current_unix_timestamp_ms, elapsed_at_least};
