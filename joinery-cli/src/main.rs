use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use joinery_core::{DiscoveryConfig, DiscoveryRequest, JoinDiscovery};
use joinery_coverage::{extract_coverage, extract_sketches};
use joinery_types::{group_entries, DataProfile};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "joinery", about = "Find datasets that join with a profiled dataset")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the coverage descriptors and sketches extracted from a profile.
    Coverage {
        #[arg(long)]
        profile: PathBuf,
        /// Restrict to these input column positions.
        #[arg(long, value_delimiter = ',')]
        columns: Vec<usize>,
    },
    /// Run join discovery against the configured index and sketch service.
    Discover {
        #[arg(long)]
        profile: PathBuf,
        #[arg(long)]
        dataset_id: Option<String>,
        #[arg(long, value_delimiter = ',')]
        ignore: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        columns: Vec<usize>,
        #[arg(long, env = "JOINERY_ES_URL")]
        es_url: Option<String>,
        #[arg(long, env = "JOINERY_SKETCH_URL")]
        sketch_url: Option<String>,
        /// YAML tuning file; falls back to JOINERY_CONFIG.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn read_profile(path: &Path) -> anyhow::Result<DataProfile> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let profile: DataProfile =
        serde_json::from_str(&text).with_context(|| format!("parsing profile {}", path.display()))?;
    tracing::debug!(path = %path.display(), columns = profile.columns.len(), "loaded profile");
    Ok(profile)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Coverage { profile, columns } => {
            let profile = read_profile(&profile)?;
            let coverage = extract_coverage(&profile, &columns)?;
            let sketches = extract_sketches(&profile, &columns);
            let out = json!({ "coverage": group_entries(&coverage), "sketches": group_entries(&sketches) });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Discover {
            profile,
            dataset_id,
            ignore,
            columns,
            es_url,
            sketch_url,
            config,
        } => {
            let config = match config {
                Some(path) => DiscoveryConfig::from_path(path)?,
                None => DiscoveryConfig::from_env()?,
            };
            let discovery = JoinDiscovery::connect(es_url.as_deref(), sketch_url.as_deref(), config)?;
            let request = DiscoveryRequest {
                dataset_id,
                ignore_datasets: ignore,
                column_scope: columns,
                ..DiscoveryRequest::new(read_profile(&profile)?)
            };

            let ctrl_c = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            match discovery.discover_until(&request, ctrl_c).await {
                Some(outcome) => println!("{}", serde_json::to_string_pretty(&outcome?)?),
                None => anyhow::bail!("interrupted"),
            }
        }
    }

    Ok(())
}
