//! Detect candidate re-streaming endpoints for every match on a date.
//!
//! The program fetches the date's fixtures and the full day of
//! per-endpoint 5-minute traffic from the warehouse, builds the
//! rate-of-rise matrix once, and scans it once per fixture. Each
//! fixture produces one candidate artifact in the store inbox, named
//! `ips_<YYYYMMDD>_<HHMM>_UTC.csv` and holding the ranked endpoint
//! list (possibly empty). Artifact names are printed to stdout so the
//! scheduler can hand them to `piracy-report`.
//!
//! A date without fixtures exits cleanly without touching traffic
//! data.

#![deny(unused_import_braces, unused_qualifications)]

use chrono::{Duration, NaiveDate, TimeZone as _, Utc};
use color_eyre::eyre::{bail, Result};
use report::config::ReportConfig;
use report::store::ArtifactStore;
use report::{artifact, warehouse};
use std::path::PathBuf;
use traffic::detect::detect_candidates;
use traffic::series::{DayMatrix, RiseMatrix};
use traffic::window::match_window;

#[derive(Debug, clap::Parser)]
struct CliArgs {
    /// Path to the JSON run configuration
    #[clap(long = "config")]
    config: PathBuf,
    /// Match date to process, `YYYY-MM-DD`
    #[clap(long = "date")]
    date: NaiveDate,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();
    let args: CliArgs = clap::Parser::parse();

    let config = ReportConfig::load(&args.config)?;
    config.log_summary();
    let pool = warehouse::connect(&config.database_url, "detect-candidates").await?;

    let fixtures = warehouse::fixtures_for_date(&pool, args.date).await?;
    if fixtures.is_empty() {
        log::info!("No fixtures on {}, nothing to detect", args.date);
        return Ok(());
    }
    log::info!("{} fixture(s) on {}", fixtures.len(), args.date);

    let day_start = Utc.from_utc_datetime(&args.date.and_hms(0, 0, 0));
    let samples = warehouse::day_traffic(&pool, day_start, day_start + Duration::days(1)).await?;
    if samples.is_empty() {
        bail!("No traffic samples at all for {}", args.date);
    }

    let mut matrix = DayMatrix::from_samples(day_start, &config.engine, &samples);
    let before = matrix.num_endpoints();
    matrix.retain_top_talkers(config.engine.top_talker_threshold);
    log::info!(
        "Pivoted {} samples into {} endpoints, {} past the top-talker filter",
        samples.len(),
        before,
        matrix.num_endpoints()
    );
    let rise = RiseMatrix::compute(&matrix, &config.engine);

    let store = ArtifactStore::new(&config.store);
    for fixture in fixtures {
        let window = match_window(fixture.ko_time, &config.engine);
        log::info!(
            "Kickoff {}: scanning buckets {}..{}",
            fixture.ko_time,
            window.start,
            window.end
        );
        let candidates = detect_candidates(&rise, &window, &config.engine);
        let name = artifact::artifact_name(fixture.match_date, fixture.ko_time);
        let path = store.write_candidates(&name, &candidates)?;
        log::info!(
            "Wrote {} candidate(s) to {}",
            candidates.len(),
            path.display()
        );
        println!("{name}");
    }

    Ok(())
}
