use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rimg",
    about = "Random image service over a directory of images",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP service
    Serve(ServeArgs),
    /// Rebuild and persist the index now
    Build(BuildArgs),
    /// Pick random images from the persisted index
    Pick(PickArgs),
    /// List every indexed key
    Tree(TreeArgs),
}

/// Where the images live and how the index is configured.
#[derive(Args, Clone, Debug, Default)]
pub struct StoreArgs {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<String>,
    /// Image directory, overrides `storage_root`
    #[arg(long)]
    pub root: Option<String>,
}

#[derive(Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Listen address, overrides `bind_addr`
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Args)]
pub struct PickArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(short = 'n', long, default_value = "1")]
    pub count: usize,
}

#[derive(Args)]
pub struct TreeArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[arg(long)]
    pub category: Option<String>,
}
