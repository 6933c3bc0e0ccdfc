//! Attribute in-match piracy bandwidth for each candidate artifact.
//!
//! For every artifact name given on the command line the program
//! recovers the kickoff from the name, locates exactly one matching
//! artifact in the store inbox, re-fetches raw traffic for just those
//! endpoints around the kickoff, and runs the attribution stages:
//! noise baseline, baseline subtraction, metadata join. The resulting
//! rows replace any prior rows for the same kickoff in the
//! match-traffic table, and the artifact is moved to the processed
//! folder.
//!
//! Candidates that have vanished from the traffic data by the time of
//! the re-fetch are logged and skipped, not fatal.

#![deny(unused_import_braces, unused_qualifications)]

use color_eyre::eyre::{bail, Result};
use report::config::ReportConfig;
use report::store::ArtifactStore;
use report::{artifact, warehouse};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::path::PathBuf;
use traffic::baseline::{clean_samples, noise_baselines};
use traffic::{attribution, output, MatchContext};

#[derive(Debug, clap::Parser)]
struct CliArgs {
    /// Path to the JSON run configuration
    #[clap(long = "config")]
    config: PathBuf,
    /// Candidate artifact names produced by detect-candidates, each
    /// embedding its kickoff as `ips_<YYYYMMDD>_<HHMM>_UTC.csv`
    #[arg(num_args(1..))]
    artifacts: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();
    let args: CliArgs = clap::Parser::parse();

    let config = ReportConfig::load(&args.config)?;
    config.log_summary();
    let pool = warehouse::connect(&config.database_url, "piracy-report").await?;
    let store = ArtifactStore::new(&config.store);

    for name in &args.artifacts {
        log::info!("Processing {name}");
        let ko_timestamp = artifact::parse_kickoff(name)?;
        let path = store.find_artifact(name)?;
        let ips = store.read_ips(&path)?;
        if ips.is_empty() {
            log::info!("{name} holds no candidates, moving it along");
            store.move_to_processed(&path)?;
            continue;
        }

        log::info!("Fetching traffic for {} candidate(s)", ips.len());
        let (samples, metadata_rows) =
            warehouse::match_traffic(&pool, &ips, ko_timestamp, &config.engine).await?;
        if samples.is_empty() {
            bail!("No traffic data at all for the candidates of {name}");
        }

        // Candidates can drop out between detection and this re-fetch.
        let seen: BTreeSet<IpAddr> = samples.iter().map(|sample| sample.ip).collect();
        let missing: Vec<IpAddr> = ips.iter().copied().filter(|ip| !seen.contains(ip)).collect();
        if !missing.is_empty() {
            log::warn!("{name}: no traffic data for candidates {missing:?}");
        }

        let (season, game_week) = warehouse::season_and_game_week(&pool, ko_timestamp).await?;
        log::info!("Kickoff {ko_timestamp} is {season} game week {game_week}");
        let context = MatchContext {
            ko_timestamp,
            season,
            game_week,
        };

        let clean = clean_samples(&samples);
        let noise = noise_baselines(&clean, ko_timestamp, &config.engine);
        let buckets = attribution::attribute(&clean, &noise, ko_timestamp, &config.engine);
        let metadata = output::canonical_metadata(&metadata_rows);
        let records = output::assemble(buckets, &metadata, &context)?;

        warehouse::delete_rows_by_kickoff(&pool, &config.match_traffic_table, ko_timestamp)
            .await?;
        warehouse::insert_records(&pool, &config.match_traffic_table, &records).await?;

        let destination = store.move_to_processed(&path)?;
        log::info!(
            "Loaded {} row(s) and moved the artifact to {}",
            records.len(),
            destination.display()
        );
    }

    log::info!("All artifacts processed");
    Ok(())
}
