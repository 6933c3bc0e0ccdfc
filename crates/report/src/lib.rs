//! I/O plumbing around the `traffic` analysis engine: run
//! configuration, the candidate artifact store, and the data
//! warehouse.
//!
//! The two binaries mirror the two scheduler tasks of the pipeline:
//! `detect-candidates` turns a match day into one candidate artifact
//! per fixture, and `piracy-report` turns each artifact into
//! attributed rows in the match-traffic table.

#![deny(unused_import_braces, unused_qualifications)]

pub mod artifact;
pub mod config;
pub mod store;
pub mod warehouse;
