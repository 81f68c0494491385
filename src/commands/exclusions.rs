// Exclusion list commands
use anyhow::Result;
use clap::{Args, Subcommand};

use super::AppContext;

#[derive(Args)]
pub struct ExcludeArgs {
    #[command(subcommand)]
    command: ExcludeCommand,
}

#[derive(Subcommand)]
enum ExcludeCommand {
    /// Never auto-select this source label
    Add { label: String },

    /// Allow this source label again
    Remove { label: String },

    /// Show excluded labels
    List,
}

pub fn run(ctx: &AppContext, args: ExcludeArgs) -> Result<()> {
    match args.command {
        ExcludeCommand::Add { label } => {
            if ctx.config.add_excluded_game(&label)? {
                println!("Excluded '{}'", label);
            } else {
                println!("'{}' is already excluded", label);
            }
        }
        ExcludeCommand::Remove { label } => {
            if ctx.config.remove_excluded_game(&label)? {
                println!("'{}' is no longer excluded", label);
            } else {
                println!("'{}' was not excluded", label);
            }
        }
        ExcludeCommand::List => {
            let excluded = ctx.config.excluded_games();
            if excluded.is_empty() {
                println!("No excluded sources.");
            }
            for label in excluded {
                println!("  {}", label);
            }
        }
    }
    Ok(())
}
