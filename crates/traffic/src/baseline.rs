//! Pre-match noise baseline estimation.

use crate::{EngineConfig, TrafficSample};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Deduplicated attribution traffic: one summed value per (endpoint,
/// bucket timestamp).
///
/// The narrow query can return two rows for one endpoint and bucket
/// (one with ASN columns populated, one without); summing them here
/// restores the per-bucket totals.
pub type CleanSeries = BTreeMap<(IpAddr, DateTime<Utc>), f64>;

pub fn clean_samples(samples: &[TrafficSample]) -> CleanSeries {
    let mut clean = CleanSeries::new();
    for sample in samples {
        *clean.entry((sample.ip, sample.timestamp)).or_insert(0.0) += sample.gigabits;
    }
    clean
}

/// Estimate each endpoint's ordinary bandwidth from the quiet
/// pre-match window (`[ko - 90min, ko - 30min)` by default).
///
/// The mean uses the window length in buckets as a fixed denominator
/// rather than the number of present samples, so endpoints with sparse
/// pre-match data are not inflated: absent buckets count as zero.
/// Endpoints with no samples at all in the window are simply missing
/// from the map, which the attribution join treats as zero noise.
pub fn noise_baselines(
    clean: &CleanSeries,
    ko_timestamp: DateTime<Utc>,
    cfg: &EngineConfig,
) -> BTreeMap<IpAddr, f64> {
    let start = ko_timestamp + Duration::minutes(cfg.baseline_start_mins);
    let end = ko_timestamp + Duration::minutes(cfg.baseline_end_mins);
    let denominator = cfg.baseline_bucket_count() as f64;

    let mut noise: BTreeMap<IpAddr, f64> = BTreeMap::new();
    for (&(ip, timestamp), &gigabits) in clean {
        if timestamp >= start && timestamp < end {
            *noise.entry(ip).or_insert(0.0) += gigabits;
        }
    }
    for value in noise.values_mut() {
        *value /= denominator;
    }
    noise
}
