//! Per-endpoint bandwidth analysis for live-event piracy detection.
//!
//! The crate is pure computation over already-materialized traffic
//! samples. It has two halves, run strictly in order:
//!
//! 1. Detection: build an endpoint x bucket bandwidth matrix for a
//!    match day, normalize and smooth every series, difference it into
//!    a rate-of-rise signal, and flag endpoints whose rise exceeds a
//!    threshold often enough inside a match window.
//! 2. Attribution: for the flagged endpoints, estimate a quiet
//!    pre-match noise baseline and subtract it from in-match traffic,
//!    producing one [`AttributedRecord`] per endpoint per 5-minute
//!    bucket.
//!
//! Fetching samples and persisting results belongs to the caller.

#![deny(unused_import_braces, unused_qualifications)]

pub mod attribution;
pub mod baseline;
pub mod config;
pub mod detect;
pub mod error;
pub mod output;
pub mod series;
pub mod window;

pub use config::EngineConfig;
pub use error::EngineError;

use chrono::{DateTime, Utc};
use std::net::IpAddr;

/// One raw bandwidth measurement.
///
/// `timestamp` is already floored to a 5-minute boundary by the
/// producing query, which also sums duplicate raw records inside the
/// boundary.
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrafficSample {
    pub ip: IpAddr,
    pub timestamp: DateTime<Utc>,
    pub gigabits: f64,
}

/// Ownership and classification info for one endpoint.
///
/// Raw data may contain several rows per endpoint with inconsistent
/// `asn`/`as_name` nullability; [`output::canonical_metadata`] reduces
/// them to one row each.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EndpointMetadata {
    pub ip: IpAddr,
    pub asn: Option<i64>,
    pub as_name: Option<String>,
    pub analyse: bool,
    pub vpn: bool,
    pub vpn_name: Option<String>,
}

/// Scheduling context for one match, resolved by the caller.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MatchContext {
    pub ko_timestamp: DateTime<Utc>,
    pub season: String,
    pub game_week: i32,
}

/// A detected candidate endpoint with the number of window buckets in
/// which its rate-of-rise exceeded the threshold.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CandidateIp {
    pub ip: IpAddr,
    pub exceed_count: u32,
}

/// Final output row: one candidate endpoint in one in-match bucket,
/// joined with its canonical metadata and the match context.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AttributedRecord {
    pub ip: IpAddr,
    pub asn: Option<i64>,
    pub as_name: Option<String>,
    pub analyse: bool,
    pub vpn: bool,
    pub vpn_name: Option<String>,
    pub season: String,
    pub game_week: i32,
    pub ko_timestamp: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub gigabits: f64,
    pub piracy_gigabits: f64,
    pub gbps: f64,
    pub piracy_gbps: f64,
}
