// Profile management commands
use anyhow::{bail, Result};
use clap::{Args, Subcommand};

use audio_isolator_lib::routed_sources;

use super::AppContext;

#[derive(Args)]
pub struct ProfileArgs {
    #[command(subcommand)]
    command: ProfileCommand,
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Save a selection as a profile
    Save {
        /// Profile name
        name: String,

        /// Node ids to save; defaults to the currently routed sources
        ids: Vec<u32>,
    },

    /// List saved profiles
    List,

    /// Show the sources stored in a profile
    Show {
        name: String,
    },

    /// Delete a saved profile
    Delete {
        name: String,
    },
}

pub async fn run(ctx: &AppContext, args: ProfileArgs) -> Result<()> {
    match args.command {
        ProfileCommand::Save { name, ids } => {
            let ids = if ids.is_empty() {
                routed_sources(&ctx.controller.current_routes().await?)
            } else {
                ids
            };
            let sources = ctx.controller.detect_sources(&[]).await?;
            let labels: Vec<String> = sources
                .iter()
                .filter(|source| ids.contains(&source.node_id))
                .map(|source| source.label.clone())
                .collect();
            if labels.is_empty() {
                bail!("Nothing to save: none of the selected sources are playing");
            }
            let profile = ctx.config.save_profile(&name, labels)?;
            println!("Profile '{}' saved with {} source(s)", profile.name, profile.sources.len());
        }
        ProfileCommand::List => {
            let names = ctx.config.list_profiles()?;
            if names.is_empty() {
                println!("No saved profiles.");
            }
            for name in names {
                println!("  {}", name);
            }
        }
        ProfileCommand::Show { name } => {
            let profile = ctx.config.load_profile(&name)?;
            println!("{} (saved {})", profile.name, profile.saved_at.format("%Y-%m-%d %H:%M:%S"));
            for label in &profile.sources {
                println!("  {}", label);
            }
        }
        ProfileCommand::Delete { name } => {
            if !ctx.config.delete_profile(&name)? {
                bail!("Profile '{}' does not exist", name);
            }
            println!("Profile '{}' deleted", name);
        }
    }
    Ok(())
}
