//! Candidate detection: threshold counting over the rate-of-rise
//! matrix inside a match window.

use crate::series::RiseMatrix;
use crate::window::MatchWindow;
use crate::{CandidateIp, EngineConfig};

/// Count, per endpoint, the window buckets whose rate-of-rise exceeds
/// `rise_threshold`, and keep endpoints with strictly more than
/// `min_exceed_count` of them.
///
/// Absent values (series edges, out-of-day buckets) never exceed. The
/// result is ranked descending by count; ties keep ascending endpoint
/// address order, so identical inputs always produce an identical
/// list.
pub fn detect_candidates(
    rise: &RiseMatrix,
    window: &MatchWindow,
    cfg: &EngineConfig,
) -> Vec<CandidateIp> {
    let mut candidates: Vec<CandidateIp> = rise
        .endpoints()
        .filter_map(|ip| {
            let exceed_count = window
                .buckets()
                .filter(|&bucket| {
                    rise.value(ip, bucket)
                        .map_or(false, |diff| diff > cfg.rise_threshold)
                })
                .count() as u32;
            (exceed_count > cfg.min_exceed_count).then_some(CandidateIp { ip, exceed_count })
        })
        .collect();
    candidates.sort_by(|a, b| b.exceed_count.cmp(&a.exceed_count));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::DayMatrix;
    use crate::window::match_window;
    use crate::TrafficSample;
    use chrono::{NaiveTime, TimeZone as _, Utc};
    use std::net::IpAddr;

    /// Build a day of samples for one endpoint from a bucket -> value
    /// closure.
    fn day(ip: &str, value: impl Fn(i64) -> f64) -> Vec<TrafficSample> {
        let start = Utc.ymd(2021, 4, 12).and_hms(0, 0, 0);
        (0..288)
            .map(|b| TrafficSample {
                ip: ip.parse().unwrap(),
                timestamp: start + chrono::Duration::minutes(b * 5),
                gigabits: value(b),
            })
            .collect()
    }

    /// A step from `low` to `high` at `at`, which the differencer
    /// turns into a burst of large positive values around the step.
    fn step(at: i64, low: f64, high: f64) -> impl Fn(i64) -> f64 {
        move |b| if b < at { low } else { high }
    }

    #[test]
    fn rising_endpoint_detected_flat_endpoint_not() {
        let cfg = EngineConfig::default();
        let window = match_window(NaiveTime::from_hms(18, 0, 0), &cfg);
        // Endpoint A steps up right at kickoff (bucket 216); endpoint
        // B stays flat at a high level all day.
        let mut samples = day("10.0.0.1", step(216, 1.0, 10.0));
        samples.extend(day("10.0.0.2", |_| 5.0));

        let mut matrix = DayMatrix::from_samples(
            Utc.ymd(2021, 4, 12).and_hms(0, 0, 0),
            &cfg,
            &samples,
        );
        matrix.retain_top_talkers(cfg.top_talker_threshold);
        let rise = RiseMatrix::compute(&matrix, &cfg);
        let candidates = detect_candidates(&rise, &window, &cfg);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].ip, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert!(candidates[0].exceed_count > cfg.min_exceed_count);
        assert!(candidates[0].exceed_count as i64 <= window.len());
    }

    #[test]
    fn detection_is_deterministic_and_ranked() {
        let cfg = EngineConfig::default();
        let window = match_window(NaiveTime::from_hms(15, 0, 0), &cfg);
        // Two steppers whose exceed bursts both fall inside the scan
        // window; equal counts keep ascending address order.
        let mut samples = day("10.0.0.1", step(180, 0.5, 8.0));
        samples.extend(day("10.0.0.2", step(186, 0.5, 8.0)));

        let matrix = DayMatrix::from_samples(
            Utc.ymd(2021, 4, 12).and_hms(0, 0, 0),
            &cfg,
            &samples,
        );
        let rise = RiseMatrix::compute(&matrix, &cfg);
        let first = detect_candidates(&rise, &window, &cfg);
        let second = detect_candidates(&rise, &window, &cfg);
        assert_eq!(first, second);
        for pair in first.windows(2) {
            assert!(pair[0].exceed_count >= pair[1].exceed_count);
        }
    }

    #[test]
    fn empty_matrix_yields_zero_candidates() {
        let cfg = EngineConfig::default();
        let window = match_window(NaiveTime::from_hms(15, 0, 0), &cfg);
        let mut matrix = DayMatrix::from_samples(
            Utc.ymd(2021, 4, 12).and_hms(0, 0, 0),
            &cfg,
            &day("10.0.0.1", |_| 0.01),
        );
        matrix.retain_top_talkers(cfg.top_talker_threshold);
        assert!(matrix.is_empty());
        let rise = RiseMatrix::compute(&matrix, &cfg);
        assert!(detect_candidates(&rise, &window, &cfg).is_empty());
    }
}
