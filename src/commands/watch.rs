// Auto-apply loop
use anyhow::Result;
use colored::Colorize;
use tracing::{debug, error, info, warn};

use audio_isolator_lib::{default_selection, GameWatcher};

use super::AppContext;

pub async fn run(ctx: &AppContext) -> Result<()> {
    let settings = &ctx.settings;
    info!(
        "{} Polling every {:?} (auto-apply {})",
        "WATCH_START".bright_cyan(),
        settings.auto_detect_interval(),
        if settings.auto_apply_games { "on" } else { "off" }
    );

    let mut watcher = GameWatcher::new();
    let mut ticker = tokio::time::interval(settings.auto_detect_interval());
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let sources = match ctx.controller.detect_sources(&settings.excluded_games).await {
                    Ok(sources) => sources,
                    Err(e) => {
                        warn!("{} {}", "WATCH_POLL_FAILED".bright_yellow(), e);
                        continue;
                    }
                };

                let delta = watcher.observe(&sources);
                if delta.changed {
                    debug!("{} {} source(s) present", "SOURCES_CHANGED".bright_blue(), sources.len());
                }
                if delta.new_games.is_empty() {
                    continue;
                }
                info!("{} {}", "GAMES_DETECTED".bright_green(), delta.new_games.join(", "));
                if !settings.auto_apply_games {
                    continue;
                }

                match ctx.controller.apply_routing(&default_selection(&sources)).await {
                    Ok(outcome) => println!("{}", outcome.summary),
                    Err(e) => {
                        error!("{} {}", "WATCH_APPLY_FAILED".bright_red(), e);
                        // Report the same games again on the next poll
                        watcher.reset();
                    }
                }
            }
        }
    }

    info!("{} Shutting down", "WATCH_STOP".bright_cyan());
    if settings.restore_default_on_close {
        let disconnected = ctx.controller.disconnect_all().await?;
        println!("{}", disconnected.summary);
        let restored = ctx.controller.restore_default().await?;
        println!("{}", restored.summary);
        restored.into_result()?;
    }
    Ok(())
}
