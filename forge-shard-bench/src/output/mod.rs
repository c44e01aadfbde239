//! Output modules for rendering benchmark results.
//!
//! Supports an appending CSV log, a JSON report, comfy-table summaries and a
//! progress spinner.

pub mod csv;
pub mod json;
pub mod progress;
pub mod table;
