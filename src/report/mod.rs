//! Report output.
//!
//! This module persists generated report parts as markdown files.

pub mod writer;

pub use writer::ReportWriter;
