//! Final output assembly: canonical endpoint metadata joined with
//! attributed buckets and match context.

use crate::attribution::AttributedBucket;
use crate::{AttributedRecord, EndpointMetadata, EngineError, MatchContext};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Reduce raw metadata rows to one canonical row per endpoint.
///
/// The raw feed often has several rows per endpoint, some with ASN
/// columns populated and some without. Preferring the row with the
/// highest non-null `asn` (later rows win ties) reproduces the
/// sort-nulls-first, keep-last dedup of the source data.
pub fn canonical_metadata(rows: &[EndpointMetadata]) -> BTreeMap<IpAddr, EndpointMetadata> {
    let mut canonical: BTreeMap<IpAddr, EndpointMetadata> = BTreeMap::new();
    for row in rows {
        match canonical.get(&row.ip) {
            Some(existing) if row.asn < existing.asn => {}
            _ => {
                canonical.insert(row.ip, row.clone());
            }
        }
    }
    canonical
}

/// Join every attributed bucket to its endpoint's canonical metadata
/// and the match context.
///
/// An endpoint with attributed traffic but no metadata row at all is
/// an error: silently dropping it or null-filling its ASN context
/// would hide the endpoint from the report.
pub fn assemble(
    buckets: Vec<AttributedBucket>,
    metadata: &BTreeMap<IpAddr, EndpointMetadata>,
    context: &MatchContext,
) -> Result<Vec<AttributedRecord>, EngineError> {
    buckets
        .into_iter()
        .map(|bucket| {
            let meta = metadata
                .get(&bucket.ip)
                .ok_or(EngineError::MissingMetadata { ip: bucket.ip })?;
            Ok(AttributedRecord {
                ip: bucket.ip,
                asn: meta.asn,
                as_name: meta.as_name.clone(),
                analyse: meta.analyse,
                vpn: meta.vpn,
                vpn_name: meta.vpn_name.clone(),
                season: context.season.clone(),
                game_week: context.game_week,
                ko_timestamp: context.ko_timestamp,
                timestamp: bucket.timestamp,
                gigabits: bucket.gigabits,
                piracy_gigabits: bucket.piracy_gigabits,
                gbps: bucket.gbps,
                piracy_gbps: bucket.piracy_gbps,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone as _, Utc};

    fn meta(ip: &str, asn: Option<i64>, as_name: Option<&str>) -> EndpointMetadata {
        EndpointMetadata {
            ip: ip.parse().unwrap(),
            asn,
            as_name: as_name.map(str::to_owned),
            analyse: true,
            vpn: false,
            vpn_name: None,
        }
    }

    fn context() -> MatchContext {
        MatchContext {
            ko_timestamp: Utc.ymd(2021, 4, 12).and_hms(18, 0, 0),
            season: "2020/21".to_owned(),
            game_week: 31,
        }
    }

    fn bucket(ip: &str) -> AttributedBucket {
        AttributedBucket {
            ip: ip.parse().unwrap(),
            timestamp: Utc.ymd(2021, 4, 12).and_hms(18, 0, 0),
            gigabits: 5.0,
            noise_gigabits: 2.0,
            piracy_gigabits: 3.0,
            gbps: 5.0 / 300.0,
            piracy_gbps: 3.0 / 300.0,
        }
    }

    #[test]
    fn canonical_prefers_non_null_asn() {
        let rows = vec![
            meta("10.0.0.1", Some(64500), Some("Example AS")),
            meta("10.0.0.1", None, None),
        ];
        let canonical = canonical_metadata(&rows);
        assert_eq!(canonical.len(), 1);
        let row = &canonical[&"10.0.0.1".parse::<IpAddr>().unwrap()];
        assert_eq!(row.asn, Some(64500));
        assert_eq!(row.as_name.as_deref(), Some("Example AS"));
    }

    #[test]
    fn canonical_keeps_last_row_on_equal_asn() {
        let rows = vec![
            meta("10.0.0.1", Some(64500), Some("first")),
            meta("10.0.0.1", Some(64500), Some("second")),
        ];
        let canonical = canonical_metadata(&rows);
        let row = &canonical[&"10.0.0.1".parse::<IpAddr>().unwrap()];
        assert_eq!(row.as_name.as_deref(), Some("second"));
    }

    #[test]
    fn assemble_joins_metadata_and_context() {
        let metadata = canonical_metadata(&[meta("10.0.0.1", Some(64500), Some("Example AS"))]);
        let records = assemble(vec![bucket("10.0.0.1")], &metadata, &context()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].asn, Some(64500));
        assert_eq!(records[0].season, "2020/21");
        assert_eq!(records[0].game_week, 31);
        assert_eq!(records[0].piracy_gigabits, 3.0);
    }

    #[test]
    fn assemble_fails_for_endpoint_without_metadata() {
        let err = assemble(vec![bucket("10.0.0.9")], &BTreeMap::new(), &context()).unwrap_err();
        assert!(matches!(err, EngineError::MissingMetadata { .. }));
    }
}
