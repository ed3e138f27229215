use super::context::AppContext;
use super::output;
use anyhow::Result;
use colored::Colorize;
use foundry_application::Dashboard;

pub async fn show(ctx: &AppContext, json: bool) -> Result<()> {
    let cards = Dashboard::new(ctx.backend.clone()).overview().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&cards)?);
        return Ok(());
    }
    if cards.is_empty() {
        println!("{}", "No sessions yet.".dimmed());
        return Ok(());
    }

    for card in &cards {
        let marker = if card.recently_updated { "*".yellow() } else { " ".normal() };
        let position = if card.lifecycle.step_count > 0 {
            format!(
                "{} ({}/{})",
                card.lifecycle.phase,
                (card.lifecycle.current_index + 1).min(card.lifecycle.step_count),
                card.lifecycle.step_count
            )
        } else {
            card.lifecycle.phase.dimmed().to_string()
        };
        println!(
            "{} {:<28} {:<16} {:<12} {:<32} {}",
            marker,
            card.title,
            card.project_name,
            output::status(card.status),
            position,
            card.updated_at.dimmed()
        );
    }
    Ok(())
}
