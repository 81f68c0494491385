// Source listing
use anyhow::Result;
use clap::Args;

use audio_isolator_lib::{default_selection, Role};

use super::AppContext;

#[derive(Args)]
pub struct SourcesArgs {
    /// Print as JSON
    #[arg(long)]
    json: bool,

    /// Only list game sources
    #[arg(long)]
    games: bool,
}

pub async fn run(ctx: &AppContext, args: SourcesArgs) -> Result<()> {
    let mut sources = ctx.controller.detect_sources(&ctx.settings.excluded_games).await?;
    if args.games {
        sources.retain(|source| source.role == Role::Game);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    if sources.is_empty() {
        println!("No audio sources found.");
        return Ok(());
    }

    let selected = default_selection(&sources);
    println!("Audio Sources");
    println!("=============\n");
    for source in &sources {
        let marker = if selected.contains(&source.node_id) { "*" } else { " " };
        let excluded = if source.excluded { " [excluded]" } else { "" };
        println!(
            " {} [{:>4}] {:<14} {}{}",
            marker,
            source.node_id,
            source.role.to_string(),
            source.label,
            excluded
        );
        if !source.stream_purpose.is_empty() {
            println!("          {:<14} likely {}", "", source.stream_purpose);
        }
    }
    println!("\n* default selection ({} source(s))", selected.len());
    Ok(())
}
