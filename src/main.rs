use ai_policy_atlas::config::load_config;
use ai_policy_atlas::export::INDEX_FILE;
use ai_policy_atlas::fetch::Source;
use ai_policy_atlas::orchestrator::{run_export, RunOptions};
use ai_policy_atlas::AtlasConfig;
use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::{debug, info};

/// Policy Atlas - headless renderer for the AI-education policy dashboard
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// results.json path or URL (overrides ATLAS_DATA)
    #[arg(long)]
    data: Option<String>,

    /// chunk_pairs.json path or URL (overrides ATLAS_CHUNKS)
    #[arg(long)]
    chunks: Option<String>,

    /// Directory or base URL holding <policy_id>.txt (overrides ATLAS_TEXT_BASE)
    #[arg(long)]
    text_base: Option<String>,

    /// TOML config file (overrides ATLAS_CONFIG)
    #[arg(short, long)]
    config: Option<String>,

    /// Output directory for generated files (default: "out")
    #[arg(short, long, default_value = "out")]
    output_dir: String,

    /// Toggle a policy into the selection; repeatable
    #[arg(long = "select", value_name = "ID")]
    select: Vec<String>,

    /// Select a pair at once, as A,B
    #[arg(long, value_parser = parse_pair, value_name = "A,B")]
    pair: Option<(String, String)>,

    /// Region filter ("all" clears it)
    #[arg(long)]
    region: Option<String>,

    /// Dimension filter ("all" clears it)
    #[arg(long)]
    dimension: Option<String>,

    /// Similarity threshold for network and chord views
    #[arg(long)]
    threshold: Option<f64>,

    /// Scroll a container into view; repeatable (default: overview section)
    #[arg(long = "visible", value_name = "CONTAINER")]
    visible: Vec<String>,

    /// Activate a tab; repeatable
    #[arg(long = "tab", value_name = "NAME")]
    tabs: Vec<String>,

    /// Render every chart
    #[arg(long)]
    all: bool,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(',') {
        Some((a, b)) if !a.trim().is_empty() && !b.trim().is_empty() => {
            Ok((a.trim().to_string(), b.trim().to_string()))
        }
        _ => Err(format!("expected A,B but got {:?}", raw)),
    }
}

/// CLI flag, then environment variable.
fn layered(flag: Option<String>, var: &str) -> Option<String> {
    flag.or_else(|| std::env::var(var).ok().filter(|v| !v.is_empty()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();

    info!("Starting policy-atlas");

    let args = Args::parse();

    let config = match layered(args.config.clone(), "ATLAS_CONFIG") {
        Some(path) => {
            debug!("Using config file: {}", path);
            load_config(Path::new(&path))?
        }
        None => {
            debug!("Using built-in config defaults");
            AtlasConfig::default()
        }
    };

    let data = layered(args.data, "ATLAS_DATA").unwrap_or_else(|| "web/data/results.json".to_string());
    let mut opts = RunOptions::new(Source::parse(&data), &args.output_dir);
    opts.chunks = layered(args.chunks, "ATLAS_CHUNKS").map(|s| Source::parse(&s));
    opts.text_base = layered(args.text_base, "ATLAS_TEXT_BASE").map(|s| Source::parse(&s));
    opts.config = config;
    opts.select = args.select;
    opts.pair = args.pair;
    opts.region = args.region;
    opts.dimension = args.dimension;
    opts.threshold = args.threshold;
    opts.visible = args.visible;
    opts.tabs = args.tabs;
    opts.all = args.all;

    let index = run_export(opts).await?;
    info!(
        "Wrote {} files - index={}/{}",
        index.files.len() + 1,
        args.output_dir,
        INDEX_FILE
    );
    Ok(())
}
