//! In-match piracy bandwidth attribution.

use crate::baseline::CleanSeries;
use crate::EngineConfig;
use chrono::{DateTime, Duration, Utc};
use itertools::{EitherOrBoth, Itertools as _};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// One candidate endpoint in one in-match bucket, with total and
/// above-baseline bandwidth in both volume and rate form.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributedBucket {
    pub ip: IpAddr,
    pub timestamp: DateTime<Utc>,
    pub gigabits: f64,
    pub noise_gigabits: f64,
    pub piracy_gigabits: f64,
    pub gbps: f64,
    pub piracy_gbps: f64,
}

/// Restrict cleaned traffic to the in-match window (`[ko, ko + 110min)`
/// by default) and subtract each endpoint's noise baseline, clipped at
/// zero so noisier-than-usual quiet periods never produce negative
/// piracy volume.
///
/// The noise join is a left join: endpoints with traffic but no
/// baseline entry get zero noise. Baseline entries without in-match
/// traffic contribute nothing.
pub fn attribute(
    clean: &CleanSeries,
    noise: &BTreeMap<IpAddr, f64>,
    ko_timestamp: DateTime<Utc>,
    cfg: &EngineConfig,
) -> Vec<AttributedBucket> {
    let start = ko_timestamp + Duration::minutes(cfg.attribution_start_mins);
    let end = ko_timestamp + Duration::minutes(cfg.attribution_end_mins);
    let bucket_seconds = cfg.bucket_seconds();

    // Group the in-match buckets per endpoint; both sides of the join
    // are then ordered by endpoint address.
    let mut in_match: BTreeMap<IpAddr, Vec<(DateTime<Utc>, f64)>> = BTreeMap::new();
    for (&(ip, timestamp), &gigabits) in clean {
        if timestamp >= start && timestamp < end {
            in_match.entry(ip).or_default().push((timestamp, gigabits));
        }
    }

    in_match
        .into_iter()
        .merge_join_by(noise, |(ip, _), (noise_ip, _)| ip.cmp(*noise_ip))
        .filter_map(|joined| match joined {
            EitherOrBoth::Both((ip, buckets), (_, &noise_gigabits)) => {
                Some((ip, buckets, noise_gigabits))
            }
            EitherOrBoth::Left((ip, buckets)) => Some((ip, buckets, 0.0)),
            // Baseline for an endpoint without in-match traffic
            EitherOrBoth::Right(_) => None,
        })
        .flat_map(|(ip, buckets, noise_gigabits)| {
            buckets.into_iter().map(move |(timestamp, gigabits)| {
                let piracy_gigabits = (gigabits - noise_gigabits).max(0.0);
                AttributedBucket {
                    ip,
                    timestamp,
                    gigabits,
                    noise_gigabits,
                    piracy_gigabits,
                    gbps: gigabits / bucket_seconds,
                    piracy_gbps: piracy_gigabits / bucket_seconds,
                }
            })
        })
        .collect()
}
