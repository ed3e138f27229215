use super::context::AppContext;
use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use foundry_core::content::SessionContent;

#[derive(Subcommand, Debug)]
pub enum CommentAction {
    /// Print every artifact's comments
    List { session: String },
    /// Append a comment to an artifact
    Add {
        session: String,
        blob_id: String,
        text: String,
    },
}

pub async fn execute(ctx: &AppContext, action: CommentAction) -> Result<()> {
    match action {
        CommentAction::List { session } => {
            let controller = ctx.open_idle(&session).await?;
            let view = controller.view();
            let comments = SessionContent::parse(&view.session.content).comments_or_default();
            if comments.is_empty() {
                println!("{}", "No comments.".dimmed());
            }
            for (blob_id, entries) in comments.iter().filter(|(_, entries)| !entries.is_empty()) {
                let known = view.blobs.iter().any(|blob| blob.id == blob_id);
                let label = if known {
                    blob_id.cyan()
                } else {
                    format!("{blob_id} (artifact no longer exists)").dimmed()
                };
                println!("{label}");
                for entry in entries {
                    println!("  - {entry}");
                }
            }
        }
        CommentAction::Add {
            session,
            blob_id,
            text,
        } => {
            let controller = ctx.open_idle(&session).await?;
            controller.add_comment(&blob_id, &text).await?;
            println!("Comment added to {}.", blob_id.cyan());
        }
    }
    Ok(())
}
