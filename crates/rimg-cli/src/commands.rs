use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde_json::json;

use rimg_index::{selector, BuildStats, IndexBuilder, IndexCache, IndexTree, SystemClock};
use rimg_server::{AppState, RimgServer, ServerConfig};
use rimg_store::{LocalFsObjectStore, ObjectStore};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Build(args) => cmd_build(args, format).await,
        Command::Pick(args) => cmd_pick(args, format).await,
        Command::Tree(args) => cmd_tree(args, format).await,
    }
}

/// Load `--config` (or defaults) and apply the `--root` override.
fn load_config(args: &StoreArgs) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => ServerConfig::default(),
    };
    if let Some(root) = &args.root {
        config.storage_root = root.into();
    }
    Ok(config)
}

fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store = LocalFsObjectStore::open(&config.storage_root)
        .with_context(|| format!("opening {}", config.storage_root.display()))?
        .with_page_size(config.page_size);
    Ok(Arc::new(store))
}

async fn load_tree(config: &ServerConfig) -> anyhow::Result<Arc<IndexTree>> {
    let cache = IndexCache::new(open_store(config)?, Arc::new(SystemClock), &config.index)?;
    cache
        .get()
        .await
        .context("no usable index, run `rimg build` first")
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.store)?;
    if let Some(bind) = &args.bind {
        config.bind_addr = bind.parse().with_context(|| format!("invalid bind address {bind}"))?;
    }
    config.validate()?;
    println!(
        "rimg serving {} on {}",
        config.storage_root.display().to_string().bold(),
        config.bind_addr.to_string().bold()
    );
    let state = AppState::new(open_store(&config)?, config)?;
    RimgServer::new(state).serve().await?;
    Ok(())
}

async fn cmd_build(args: BuildArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(&args.store)?;
    let builder = IndexBuilder::new(open_store(&config)?, &config.index)?;
    let stats = builder.refresh().await?;
    match format {
        OutputFormat::Json => println!("{}", stats_json(builder.snapshot_key(), &stats)),
        OutputFormat::Text => {
            println!("{} Index written to {}", "✓".green().bold(), builder.snapshot_key().bold());
            println!("  Indexed: {}", stats.indexed.to_string().green());
            println!("  Scanned: {} objects in {} pages", stats.scanned, stats.pages);
            println!("  Skipped: {}", stats.ineligible);
            if stats.too_deep > 0 {
                println!("  Too deep: {}", stats.too_deep.to_string().yellow());
            }
            if stats.placeholder_timestamps > 0 {
                println!("  Placeholder timestamps: {}", stats.placeholder_timestamps.to_string().yellow());
            }
            if stats.conflicts > 0 {
                println!("  Conflicts rejected: {}", stats.conflicts.to_string().red());
            }
        }
    }
    Ok(())
}

fn stats_json(snapshot_key: &str, stats: &BuildStats) -> serde_json::Value {
    json!({
        "snapshot_key": snapshot_key,
        "pages": stats.pages,
        "scanned": stats.scanned,
        "indexed": stats.indexed,
        "ineligible": stats.ineligible,
        "too_deep": stats.too_deep,
        "placeholder_timestamps": stats.placeholder_timestamps,
        "conflicts": stats.conflicts,
    })
}

async fn cmd_pick(args: PickArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(&args.store)?;
    let tree = load_tree(&config).await?;
    let scope = args.category.as_deref();
    let mut rng = rand::thread_rng();
    let mut picks = Vec::with_capacity(args.count);
    for _ in 0..args.count {
        picks.push(selector::pick(&tree, scope, &mut rng)?);
    }
    match format {
        OutputFormat::Json => {
            let items: Vec<_> = picks
                .iter()
                .map(|s| json!({ "key": s.key, "uploaded": s.uploaded }))
                .collect();
            println!("{}", serde_json::Value::Array(items));
        }
        OutputFormat::Text => {
            for s in &picks {
                println!("{}  {}", s.key.cyan(), s.uploaded.dimmed());
            }
        }
    }
    Ok(())
}

async fn cmd_tree(args: TreeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(&args.store)?;
    let tree = load_tree(&config).await?;
    let leaves: Vec<(String, &str)> = selector::leaves(&tree, args.category.as_deref())?.collect();
    match format {
        OutputFormat::Json => {
            let keys: Vec<&str> = leaves.iter().map(|(key, _)| key.as_str()).collect();
            println!("{}", json!(keys));
        }
        OutputFormat::Text => {
            for (key, uploaded) in &leaves {
                println!("{}  {}", uploaded.dimmed(), key);
            }
            println!("{} images", leaves.len().to_string().bold());
        }
    }
    Ok(())
}
