// Routing commands
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::{info, warn};

use audio_isolator_lib::{default_selection, routed_sources, RoutingOutcome};

use super::AppContext;

#[derive(Args)]
pub struct ApplyArgs {
    /// Node ids to route
    ids: Vec<u32>,

    /// Add the sources stored in this profile
    #[arg(short, long)]
    profile: Option<String>,

    /// Add every detected game that is not excluded
    #[arg(short, long)]
    games: bool,
}

fn report(outcome: RoutingOutcome) -> Result<()> {
    println!("{}", outcome.summary);
    for failure in &outcome.failed {
        println!("  ✗ {}", failure);
    }
    outcome.into_result()?;
    Ok(())
}

pub async fn routes(ctx: &AppContext) -> Result<()> {
    let routes = ctx.controller.current_routes().await?;
    if routes.is_empty() {
        println!("No routes into the recording input.");
        return Ok(());
    }

    println!(
        "{} link(s) from {} source(s):",
        routes.len(),
        routed_sources(&routes).len()
    );
    for route in &routes {
        println!(
            "  [{:>4}] {} ({}) → port {} ({})",
            route.link_id, route.source_label, route.source_node_id, route.target_port_id, route.channel
        );
    }
    Ok(())
}

pub async fn apply(ctx: &AppContext, args: ApplyArgs) -> Result<()> {
    let mut selection = args.ids;

    if let Some(name) = &args.profile {
        let profile = ctx.config.load_profile(name)?;
        let (ids, unresolved) = ctx.controller.resolve_labels(&profile.sources).await?;
        for label in &unresolved {
            warn!(
                "{} '{}' from profile {} is not playing",
                "PROFILE_SOURCE_MISSING".bright_yellow(),
                label,
                profile.name
            );
        }
        selection.extend(ids);
    }

    if args.games {
        let sources = ctx.controller.detect_sources(&ctx.settings.excluded_games).await?;
        selection.extend(default_selection(&sources));
    }

    if selection.is_empty() {
        info!("No sources selected; only removing system audio from the recording input");
    }

    let outcome = ctx
        .controller
        .apply_routing(&selection)
        .await
        .context("Failed to apply routing")?;
    report(outcome)
}

pub async fn disconnect(ctx: &AppContext) -> Result<()> {
    report(ctx.controller.disconnect_all().await?)
}

pub async fn restore(ctx: &AppContext) -> Result<()> {
    report(ctx.controller.restore_default().await?)
}

pub async fn reset(ctx: &AppContext) -> Result<()> {
    let disconnected = ctx.controller.disconnect_all().await?;
    println!("{}", disconnected.summary);
    let restored = ctx.controller.restore_default().await?;
    report(restored)?;
    disconnected.into_result()?;
    Ok(())
}
