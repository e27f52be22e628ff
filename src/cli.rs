use crate::config::{LayoutConfig, load_config};
use crate::engine::TreeEngine;
use crate::layout_dump::{TreeDump, write_tree_dump};
use crate::model::PersonId;
use crate::service::{FamilyDataSource, HttpFamilyService};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "stamboom", version, about = "Family tree builder and layout engine")]
pub struct Args {
    /// Base URL of the relationship service
    #[arg(short = 'u', long = "url", default_value = "http://localhost:8000")]
    pub url: String,

    /// Person id to anchor the tree on
    #[arg(short = 'a', long = "anchor")]
    pub anchor: Option<u64>,

    /// Search for persons by name fragment instead of building a tree
    #[arg(short = 's', long = "search")]
    pub search: Option<String>,

    /// Generations of ancestors to include
    #[arg(short = 'p', long = "parents", default_value_t = 1)]
    pub parent_depth: u32,

    /// Generations of descendants to include
    #[arg(short = 'c', long = "children", default_value_t = 1)]
    pub child_depth: u32,

    /// Layout config JSON file
    #[arg(long = "configFile")]
    pub config: Option<PathBuf>,

    /// Output file for the tree dump. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn run() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_inner(args, config))
}

async fn run_inner(args: Args, config: LayoutConfig) -> Result<()> {
    let service = HttpFamilyService::new(&args.url)?;

    if let Some(query) = &args.search {
        let matches = service.persons_matching(query).await?;
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    let anchor = args
        .anchor
        .ok_or_else(|| anyhow::anyhow!("either --anchor or --search is required"))?;

    let mut engine = TreeEngine::new(Arc::new(service), config);
    engine
        .rebuild(Some(PersonId(anchor)), args.parent_depth, args.child_depth)
        .await?;

    let state = engine.state();
    match args.output.as_deref() {
        Some(path) => write_tree_dump(path, &state.graph, &state.layout, engine.config())?,
        None => {
            let dump = TreeDump::from_tree(&state.graph, &state.layout, engine.config());
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
    }
    Ok(())
}
