use crate::EngineError;

/// All tuning constants of the detection and attribution stages.
///
/// Every threshold is an explicit named field with the production
/// default; a run configuration may override any of them. The
/// smoothing/differencing defaults were tuned together with
/// `rise_threshold`, so changing one usually means re-tuning the rest.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Endpoints whose peak raw bandwidth never exceeds this are
    /// dropped before normalization.
    pub top_talker_threshold: f64,
    /// Width of the trailing moving average, in buckets.
    pub smoothing_window: usize,
    /// How far the averaged series is shifted backward so the value
    /// sits at the center of its window rather than the trailing edge.
    pub smoothing_shift: usize,
    /// Lag of the rate-of-rise difference, in buckets.
    pub diff_lag: usize,
    /// A window bucket counts as anomalous when the differenced series
    /// exceeds this.
    pub rise_threshold: f64,
    /// Endpoints need strictly more exceeding buckets than this to
    /// become candidates.
    pub min_exceed_count: u32,
    /// Scan window start relative to the kickoff bucket (negative =
    /// before kickoff).
    pub scan_start_offset_buckets: i64,
    /// Scan window end relative to the kickoff bucket (half-open).
    pub scan_end_offset_buckets: i64,
    /// Quiet pre-match period for the noise baseline, minutes relative
    /// to kickoff. Half-open `[start, end)`.
    pub baseline_start_mins: i64,
    pub baseline_end_mins: i64,
    /// In-match attribution period, minutes relative to kickoff.
    /// Half-open `[start, end)`.
    pub attribution_start_mins: i64,
    pub attribution_end_mins: i64,
    /// Time series resolution. The producing queries floor and
    /// aggregate to this width.
    pub bucket_mins: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_talker_threshold: 0.02,
            smoothing_window: 8,
            smoothing_shift: 4,
            diff_lag: 4,
            rise_threshold: 0.1,
            min_exceed_count: 10,
            scan_start_offset_buckets: -6,
            scan_end_offset_buckets: 21,
            baseline_start_mins: -90,
            baseline_end_mins: -30,
            attribution_start_mins: 0,
            attribution_end_mins: 110,
            bucket_mins: 5,
        }
    }
}

impl EngineConfig {
    /// Check the configuration once at load time.
    pub fn validate(&self) -> Result<(), EngineError> {
        let fail = |msg: String| Err(EngineError::InvalidConfig(msg));

        if !(self.top_talker_threshold.is_finite() && self.top_talker_threshold > 0.0) {
            return fail(format!(
                "top_talker_threshold must be finite and positive, got {}",
                self.top_talker_threshold
            ));
        }
        if !self.rise_threshold.is_finite() {
            return fail(format!(
                "rise_threshold must be finite, got {}",
                self.rise_threshold
            ));
        }
        if self.smoothing_window == 0 {
            return fail("smoothing_window must be at least 1".into());
        }
        if self.diff_lag == 0 {
            return fail("diff_lag must be at least 1".into());
        }
        if self.bucket_mins <= 0 || 60 % self.bucket_mins != 0 {
            return fail(format!(
                "bucket_mins must be positive and divide an hour, got {}",
                self.bucket_mins
            ));
        }
        if self.scan_start_offset_buckets >= self.scan_end_offset_buckets {
            return fail(format!(
                "scan window is empty: offsets {}..{}",
                self.scan_start_offset_buckets, self.scan_end_offset_buckets
            ));
        }
        if self.baseline_start_mins >= self.baseline_end_mins || self.baseline_end_mins > 0 {
            return fail(format!(
                "baseline window must be a non-empty pre-kickoff range, got {}..{}",
                self.baseline_start_mins, self.baseline_end_mins
            ));
        }
        if (self.baseline_end_mins - self.baseline_start_mins) % self.bucket_mins != 0 {
            return fail(format!(
                "baseline window {}..{} is not a whole number of {}-minute buckets",
                self.baseline_start_mins, self.baseline_end_mins, self.bucket_mins
            ));
        }
        if self.attribution_start_mins >= self.attribution_end_mins {
            return fail(format!(
                "attribution window is empty: {}..{}",
                self.attribution_start_mins, self.attribution_end_mins
            ));
        }
        Ok(())
    }

    pub fn buckets_per_day(&self) -> i64 {
        24 * 60 / self.bucket_mins
    }

    /// Fixed denominator of the noise mean: the baseline window length
    /// in buckets, regardless of how many samples are present.
    pub fn baseline_bucket_count(&self) -> i64 {
        (self.baseline_end_mins - self.baseline_start_mins) / self.bucket_mins
    }

    /// Bucket width in seconds, for gigabits -> gigabits-per-second.
    pub fn bucket_seconds(&self) -> f64 {
        (self.bucket_mins * 60) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = EngineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.buckets_per_day(), 288);
        assert_eq!(cfg.baseline_bucket_count(), 12);
        assert_eq!(cfg.bucket_seconds(), 300.0);
    }

    #[test]
    fn rejects_zero_top_talker_threshold() {
        let cfg = EngineConfig {
            top_talker_threshold: 0.0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_post_kickoff_baseline() {
        let cfg = EngineConfig {
            baseline_start_mins: -30,
            baseline_end_mins: 30,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_uneven_bucket_width() {
        let cfg = EngineConfig {
            bucket_mins: 7,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
