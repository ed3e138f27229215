use super::context::AppContext;
use super::output;
use anyhow::{Context, Result};
use colored::Colorize;

/// Rejoins sessions in turn: follows each running batch, otherwise prints
/// the session's state. Moving on stops the previous session's polling.
pub async fn watch(ctx: &AppContext, session_ids: &[String]) -> Result<()> {
    let mut selector = ctx.selector();
    for session_id in session_ids {
        let controller = selector
            .select(session_id)
            .await
            .with_context(|| format!("Failed to open session '{session_id}'"))?;
        output::summary(&controller.view());
        if controller.is_polling() {
            output::follow(controller).await;
        } else {
            println!("{}", "No batch is running.".dimmed());
        }
    }
    selector.clear();
    Ok(())
}

pub async fn cancel(ctx: &AppContext, session_id: &str, wait: bool) -> Result<()> {
    let controller = ctx.open(session_id).await?;
    controller.cancel().await?;
    println!("Cancel requested for {session_id}.");

    if wait && controller.is_polling() {
        output::follow(&controller).await;
    } else {
        controller.stop();
    }
    Ok(())
}

pub async fn retry(ctx: &AppContext, session_id: &str, follow: bool) -> Result<()> {
    let controller = ctx.open(session_id).await?;
    controller.retry().await?;
    println!("Retry accepted for {session_id}.");

    if follow {
        output::follow(&controller).await;
        output::summary(&controller.view());
    } else {
        controller.stop();
    }
    Ok(())
}
