use super::context::AppContext;
use super::run::read_blob;
use anyhow::Result;
use colored::Colorize;
use std::path::Path;

pub async fn replace(ctx: &AppContext, session_id: &str, blob_id: &str, file: &Path) -> Result<()> {
    let replacement = read_blob(file).await?;
    let controller = ctx.open_idle(session_id).await?;

    match controller.replace_blob(blob_id, replacement).await {
        Ok(outcome) => {
            println!(
                "Replaced {} with {}{}.",
                blob_id.dimmed(),
                outcome.new_blob.id.cyan(),
                if outcome.comments_moved {
                    " (comments moved)"
                } else {
                    ""
                }
            );
            Ok(())
        }
        Err(err) => {
            if let Some(new_id) = &err.new_blob_id {
                eprintln!(
                    "{}",
                    format!("The new version was uploaded as {new_id}; check the artifact list before retrying.")
                        .yellow()
                );
            }
            Err(err.into())
        }
    }
}
