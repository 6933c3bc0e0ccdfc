//! Postgres traffic warehouse: fixtures, raw traffic, season/game-week
//! resolution, and the attributed-rows table.
//!
//! Endpoint addresses are stored as `INET` and travel through
//! [`ipnetwork::IpNetwork`]; the host address is extracted at the row
//! boundary so the rest of the pipeline only sees [`std::net::IpAddr`].

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use color_eyre::eyre::{Context as _, Result};
use futures::stream::{self, StreamExt as _, TryStreamExt as _};
use ipnetwork::IpNetwork;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::ConnectOptions as _;
use std::net::IpAddr;
use std::str::FromStr as _;
use std::time::Duration as StdDuration;
use traffic::{AttributedRecord, EndpointMetadata, EngineConfig, TrafficSample};

/// Fatal resolution failures. Ambiguity is reported with the
/// conflicting rows, absence with the kickoff that found nothing.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("no season/game week matches kickoff {ko_timestamp}")]
    NoGameWeek { ko_timestamp: DateTime<Utc> },
    #[error("multiple season/game weeks match kickoff {ko_timestamp}: {matches:?}")]
    MultipleGameWeeks {
        ko_timestamp: DateTime<Utc>,
        matches: Vec<(String, i32)>,
    },
}

pub async fn connect(database_url: &str, application_name: &str) -> Result<PgPool> {
    let mut options =
        PgConnectOptions::from_str(database_url)?.application_name(application_name);
    options
        .log_statements(log::LevelFilter::Debug)
        .log_slow_statements(log::LevelFilter::Info, StdDuration::new(60, 0));
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(StdDuration::new(60, 0))
        .idle_timeout(StdDuration::new(30, 0))
        .test_before_acquire(true)
        .connect_with(options)
        .await?;
    Ok(pool)
}

#[derive(Debug, sqlx::FromRow)]
pub struct Fixture {
    pub match_date: NaiveDate,
    pub ko_time: NaiveTime,
}

/// All fixtures on one date. An empty result is a no-match day, not an
/// error.
pub async fn fixtures_for_date(pool: &PgPool, date: NaiveDate) -> Result<Vec<Fixture>> {
    let fixtures = sqlx::query_as::<_, Fixture>(
        "SELECT match_date, ko_time FROM pl_fixtures \
         WHERE match_date = $1 \
         ORDER BY ko_time",
    )
    .bind(date)
    .fetch_all(pool)
    .await
    .wrap_err_with(|| format!("Fixtures for {date}"))?;
    Ok(fixtures)
}

#[derive(Debug, sqlx::FromRow)]
struct TrafficRow {
    bucket_time: DateTime<Utc>,
    ip: IpNetwork,
    gigabits: f64,
}

impl From<TrafficRow> for TrafficSample {
    fn from(row: TrafficRow) -> Self {
        Self {
            ip: row.ip.ip(),
            timestamp: row.bucket_time,
            gigabits: row.gigabits,
        }
    }
}

/// Broad detection traffic: every endpoint's 5-minute buckets for the
/// whole day, coarsely prefiltered to endpoints that moved more than
/// one gbps-day so the pivot stays tractable.
pub async fn day_traffic(
    pool: &PgPool,
    day_start: DateTime<Utc>,
    day_end: DateTime<Utc>,
) -> Result<Vec<TrafficSample>> {
    let rows = sqlx::query_as::<_, TrafficRow>(
        "SELECT bucket_time, ip, gigabits FROM ip_traffic \
         WHERE bucket_time >= $1 AND bucket_time < $2 \
           AND gbps_day > 1 \
         ORDER BY ip, bucket_time",
    )
    .bind(day_start)
    .bind(day_end)
    .fetch_all(pool)
    .await
    .wrap_err_with(|| format!("Day traffic {day_start}..{day_end}"))?;
    Ok(rows.into_iter().map(Into::into).collect())
}

#[derive(Debug, sqlx::FromRow)]
struct MatchTrafficRow {
    bucket_time: DateTime<Utc>,
    ip: IpNetwork,
    asn: Option<i64>,
    as_name: Option<String>,
    analyse: bool,
    vpn: bool,
    vpn_name: Option<String>,
    gigabits: f64,
}

/// Narrow attribution traffic: only the candidate endpoints, over the
/// pre-match baseline window through the end of the attribution
/// window. Each row carries the metadata columns; the same fetch feeds
/// both the numeric stages (as cleaned 3-field samples) and the output
/// assembler (as metadata rows).
pub async fn match_traffic(
    pool: &PgPool,
    ips: &[IpAddr],
    ko_timestamp: DateTime<Utc>,
    cfg: &EngineConfig,
) -> Result<(Vec<TrafficSample>, Vec<EndpointMetadata>)> {
    let nets: Vec<IpNetwork> = ips.iter().map(|&ip| IpNetwork::from(ip)).collect();
    let start = ko_timestamp + Duration::minutes(cfg.baseline_start_mins);
    let end = ko_timestamp + Duration::minutes(cfg.attribution_end_mins);

    let rows = sqlx::query_as::<_, MatchTrafficRow>(
        "SELECT bucket_time, ip, asn, as_name, analyse, vpn, vpn_name, gigabits \
         FROM ip_traffic \
         WHERE ip = ANY($1) \
           AND bucket_time >= $2 AND bucket_time < $3 \
         ORDER BY ip, bucket_time",
    )
    .bind(&nets)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
    .wrap_err_with(|| format!("Candidate traffic around kickoff {ko_timestamp}"))?;

    let mut samples = Vec::with_capacity(rows.len());
    let mut metadata = Vec::with_capacity(rows.len());
    for row in rows {
        let ip = row.ip.ip();
        samples.push(TrafficSample {
            ip,
            timestamp: row.bucket_time,
            gigabits: row.gigabits,
        });
        metadata.push(EndpointMetadata {
            ip,
            asn: row.asn,
            as_name: row.as_name,
            analyse: row.analyse,
            vpn: row.vpn,
            vpn_name: row.vpn_name,
        });
    }
    Ok((samples, metadata))
}

/// Resolve the season and game week a kickoff belongs to. Exactly one
/// row must match; zero and several are both fatal.
pub async fn season_and_game_week(
    pool: &PgPool,
    ko_timestamp: DateTime<Utc>,
) -> Result<(String, i32)> {
    let matches: Vec<(String, i32)> = sqlx::query_as(
        "SELECT season, game_week FROM game_weeks \
         WHERE $1 >= gw_start AND $1 < gw_end \
         ORDER BY season, game_week",
    )
    .bind(ko_timestamp)
    .fetch_all(pool)
    .await
    .wrap_err_with(|| format!("Season/game week for kickoff {ko_timestamp}"))?;

    if matches.len() > 1 {
        return Err(WarehouseError::MultipleGameWeeks {
            ko_timestamp,
            matches,
        }
        .into());
    }
    matches
        .into_iter()
        .next()
        .ok_or_else(|| WarehouseError::NoGameWeek { ko_timestamp }.into())
}

/// Purge any rows from a previous run of the same kickoff, making the
/// load idempotent. On the very first run the table may not exist yet;
/// that error is swallowed, everything else surfaces.
pub async fn delete_rows_by_kickoff(
    pool: &PgPool,
    table: &str,
    ko_timestamp: DateTime<Utc>,
) -> Result<()> {
    let query = format!("DELETE FROM {table} WHERE ko_timestamp = $1");
    match sqlx::query(&query).bind(ko_timestamp).execute(pool).await {
        Ok(done) => {
            log::info!("Purged {} prior rows for kickoff {ko_timestamp}", done.rows_affected());
            Ok(())
        }
        // undefined_table: nothing to clean on a first run
        Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("42P01") => {
            log::info!("Table {table} does not exist yet, nothing to purge");
            Ok(())
        }
        Err(error) => {
            Err(error).wrap_err_with(|| format!("Purging rows for kickoff {ko_timestamp}"))
        }
    }
}

/// Append the attributed rows for one match.
pub async fn insert_records(
    pool: &PgPool,
    table: &str,
    records: &[AttributedRecord],
) -> Result<()> {
    let query = format!(
        "INSERT INTO {table} \
         (ip, asn, as_name, analyse, vpn, vpn_name, season, game_week, \
          ko_timestamp, bucket_time, gigabits, piracy_gigabits, gbps, piracy_gbps) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
    );

    async fn insert_record(pool: &PgPool, query: &str, record: &AttributedRecord) -> Result<()> {
        sqlx::query(query)
            .bind(IpNetwork::from(record.ip))
            .bind(record.asn)
            .bind(record.as_name.as_deref())
            .bind(record.analyse)
            .bind(record.vpn)
            .bind(record.vpn_name.as_deref())
            .bind(&record.season)
            .bind(record.game_week)
            .bind(record.ko_timestamp)
            .bind(record.timestamp)
            .bind(record.gigabits)
            .bind(record.piracy_gigabits)
            .bind(record.gbps)
            .bind(record.piracy_gbps)
            .execute(pool)
            .await
            .wrap_err_with(|| {
                format!("Inserting row for {} at {}", record.ip, record.timestamp)
            })?;
        Ok(())
    }

    stream::iter(records)
        .map(Ok)
        .try_for_each_concurrent(10, |record| insert_record(pool, &query, record))
        .await?;
    Ok(())
}
