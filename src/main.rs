// Audio Isolator CLI - route selected application audio into the recording input

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use audio_isolator_lib::log::{init_logging, set_route_debug};

#[derive(Parser)]
#[command(name = "audio-isolator")]
#[command(author, version, about = "Isolate game audio for recording on PipeWire", long_about = None)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log every planned and executed link operation
    #[arg(long, global = true)]
    route_debug: bool,

    /// Use this directory instead of the user configuration directory
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List routable audio sources
    Sources(commands::sources::SourcesArgs),

    /// Show links currently feeding the recording input
    Routes,

    /// Route the given sources (and nothing else) into the recording input
    Apply(commands::routing::ApplyArgs),

    /// Remove every link into the recording input
    Disconnect,

    /// Reconnect the default output sink to the recording input
    Restore,

    /// Disconnect everything, then restore the default sink
    Reset,

    /// Poll for games and route them as they start
    Watch,

    /// Manage saved source selections
    Profile(commands::profiles::ProfileArgs),

    /// Manage the list of sources never auto-selected
    Exclude(commands::exclusions::ExcludeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if cli.route_debug {
        set_route_debug(true);
    }

    let ctx = commands::AppContext::load(cli.config_dir)?;

    match cli.command {
        Commands::Sources(args) => commands::sources::run(&ctx, args).await,
        Commands::Routes => commands::routing::routes(&ctx).await,
        Commands::Apply(args) => commands::routing::apply(&ctx, args).await,
        Commands::Disconnect => commands::routing::disconnect(&ctx).await,
        Commands::Restore => commands::routing::restore(&ctx).await,
        Commands::Reset => commands::routing::reset(&ctx).await,
        Commands::Watch => commands::watch::run(&ctx).await,
        Commands::Profile(args) => commands::profiles::run(&ctx, args).await,
        Commands::Exclude(args) => commands::exclusions::run(&ctx, args),
    }
}
