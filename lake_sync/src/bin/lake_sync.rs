use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use football_ingestor::models::fetch_params::FetchParams;
use football_ingestor::providers::api_football::ApiFootballClient;
use lake_sync::config::PipelineConfig;
use lake_sync::export::export_gold;
use lake_sync::flow::{FlowController, RunStatus};
use lake_sync::models::EntityType;
use lake_sync::state::migrate;
use lake_sync::store::TableStore;

#[derive(Parser)]
#[command(version, about = "Football data lake pipeline CLI")]
struct Cli {
    /// Pipeline configuration file.
    #[arg(long, value_name = "FILE", default_value = "lake.toml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Fetch, merge and curate the given entities (all by default).
    Run {
        /// Entity codes to process, comma separated
        /// (countries,leagues,teams,fixtures).
        #[arg(long, value_delimiter = ',')]
        entities: Vec<String>,
        /// Fixture date override (YYYY-MM-DD); defaults to yesterday UTC.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Apply pending state-database migrations.
    Migrate,
    /// Export an entity's Gold table as CSV and Parquet.
    Export {
        /// Entity code.
        #[arg(long)]
        entity: String,
        /// Output directory; defaults to `<lake_root>/exports`.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn parse_entities(codes: &[String]) -> Result<Vec<EntityType>> {
    if codes.is_empty() {
        return Ok(EntityType::all().to_vec());
    }
    codes
        .iter()
        .map(|c| {
            EntityType::parse(c).ok_or_else(|| anyhow::anyhow!("unknown entity code: {c}"))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::load(&cli.config)?;

    match cli.cmd {
        Cmd::Migrate => {
            let db_url = config.state_db.to_string_lossy().to_string();
            migrate::run_sqlite(&db_url)?;
            println!("state database is up to date: {db_url}");
        }
        Cmd::Run { entities, date } => {
            let entities = parse_entities(&entities)?;
            if let Some(date) = date {
                config
                    .endpoints
                    .insert("fixtures".to_string(), FetchParams::for_date(date));
            }

            let db_url = config.state_db.to_string_lossy().to_string();
            migrate::run_sqlite(&db_url)?;

            let quota = std::num::NonZeroU32::new(config.api.requests_per_minute)
                .ok_or_else(|| anyhow::anyhow!("api.requests_per_minute must be >= 1"))?;
            let client = ApiFootballClient::from_env_with(
                &config.api.base_url,
                &config.api.key_env,
                quota,
            )?;
            let flow = FlowController::new(config, Arc::new(client))?;
            let reports = flow.run(&entities).await?;

            let mut failed = false;
            for report in &reports {
                match &report.status {
                    RunStatus::Succeeded { merge, curated } => println!(
                        "{}: +{} ~{} ={} (skipped {}), gold emitted {} held back {}",
                        report.entity,
                        merge.inserted,
                        merge.updated,
                        merge.unchanged,
                        merge.skipped,
                        curated.emitted,
                        curated.held_back,
                    ),
                    RunStatus::Failed { error } => {
                        failed = true;
                        println!("{}: FAILED: {error}", report.entity);
                    }
                    RunStatus::Skipped => println!("{}: skipped", report.entity),
                }
            }
            if failed {
                std::process::exit(1);
            }
        }
        Cmd::Export { entity, out } => {
            let entity = EntityType::parse(&entity)
                .ok_or_else(|| anyhow::anyhow!("unknown entity code: {entity}"))?;
            let out = out.unwrap_or_else(|| config.lake_root.join("exports"));
            let store = TableStore::new(&config.lake_root);
            let paths = export_gold(&store, entity, &out)?;
            println!(
                "exported {} rows: {} / {}",
                paths.rows,
                paths.csv.display(),
                paths.parquet.display()
            );
        }
    }

    Ok(())
}
