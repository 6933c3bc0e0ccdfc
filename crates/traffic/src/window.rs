//! Kickoff time-of-day to day-relative bucket index range.

use crate::EngineConfig;
use chrono::{NaiveTime, Timelike as _};

/// Half-open bucket index range `[start, end)` to scan for anomalous
/// rise, relative to the start of the match day (bucket 0 =
/// 00:00-00:05).
///
/// Indices are signed: an early kickoff can push `start` below zero.
/// Out-of-day indices simply have no data, they never wrap.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MatchWindow {
    pub start: i64,
    pub end: i64,
}

impl MatchWindow {
    pub fn buckets(&self) -> impl Iterator<Item = i64> {
        self.start..self.end
    }

    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Compute the scan window for a kickoff time-of-day.
///
/// With the default config this is kickoff - 30 minutes to kickoff
/// + 105 minutes: `12*HH + MM/5 - 6 .. 12*HH + MM/5 + 21`.
pub fn match_window(kickoff: NaiveTime, cfg: &EngineConfig) -> MatchWindow {
    let minutes_since_midnight = i64::from(kickoff.hour()) * 60 + i64::from(kickoff.minute());
    let kickoff_bucket = minutes_since_midnight / cfg.bucket_mins;
    MatchWindow {
        start: kickoff_bucket + cfg.scan_start_offset_buckets,
        end: kickoff_bucket + cfg.scan_end_offset_buckets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn afternoon_kickoff() {
        let w = match_window(
            NaiveTime::from_hms(15, 0, 0),
            &EngineConfig::default(),
        );
        assert_eq!(w, MatchWindow { start: 174, end: 201 });
        assert_eq!(w.len(), 27);
    }

    #[test]
    fn evening_kickoff() {
        let w = match_window(
            NaiveTime::from_hms(20, 30, 0),
            &EngineConfig::default(),
        );
        assert_eq!(w, MatchWindow { start: 240, end: 267 });
    }

    #[test]
    fn early_kickoff_goes_negative_instead_of_wrapping() {
        let w = match_window(
            NaiveTime::from_hms(0, 10, 0),
            &EngineConfig::default(),
        );
        assert_eq!(w.start, -4);
        assert_eq!(w.end, 23);
    }
}
