//! Candidate artifact naming.
//!
//! One artifact per match, named `ips_<YYYYMMDD>_<HHMM>_UTC.csv`:
//! match date without separators, 24-hour kickoff time without a
//! separator. The kickoff instant is recoverable from the name alone,
//! which is what `piracy-report` relies on.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike as _, Utc};

pub const ARTIFACT_EXTENSION: &str = ".csv";

#[derive(Debug, thiserror::Error)]
#[error("artifact name {name:?} does not match ips_<YYYYMMDD>_<HHMM>_UTC.csv")]
pub struct InvalidArtifactName {
    pub name: String,
}

/// Format the artifact file name for a match.
pub fn artifact_name(match_date: NaiveDate, ko_time: NaiveTime) -> String {
    format!(
        "ips_{}_{:02}{:02}_UTC{}",
        match_date.format("%Y%m%d"),
        ko_time.hour(),
        ko_time.minute(),
        ARTIFACT_EXTENSION,
    )
}

/// Recover the kickoff timestamp from an artifact file name.
///
/// The name is parsed against the fixed pattern, never fuzzily; the
/// `_UTC` suffix makes the timezone explicit, so the result is UTC by
/// construction. The extension is optional.
pub fn parse_kickoff(name: &str) -> Result<DateTime<Utc>, InvalidArtifactName> {
    let invalid = || InvalidArtifactName {
        name: name.to_owned(),
    };

    let stem = name.strip_suffix(ARTIFACT_EXTENSION).unwrap_or(name);
    let stamp = stem
        .strip_prefix("ips_")
        .and_then(|rest| rest.strip_suffix("_UTC"))
        .ok_or_else(invalid)?;
    let naive = NaiveDateTime::parse_from_str(stamp, "%Y%m%d_%H%M").map_err(|_| invalid())?;
    Ok(DateTime::from_utc(naive, Utc))
}
