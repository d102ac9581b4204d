//! Report output
//!
//! Renders run reports for the terminal and exports them to files.

mod formatter;

pub use formatter::{export_report, OutputFormat, ReportFormatter};
