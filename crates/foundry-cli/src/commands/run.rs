use super::context::AppContext;
use super::output;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use foundry_core::session::NewBlob;
use foundry_core::wizard::{DeliverableKind, StartType};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Session to run the batch in
    pub session: String,

    /// What the batch starts from: bom, description or sketch
    #[arg(long)]
    pub start: StartType,

    /// Product description (required for --start description)
    #[arg(long, default_value = "")]
    pub description: String,

    /// Columns the BOM analysis should normalise into, comma separated
    #[arg(long, default_value = "")]
    pub columns: String,

    /// Source file to upload first (BOM spreadsheet or sketch image)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Deliverables to generate (see `foundry deliverables`)
    #[arg(long = "deliverable", short = 'd')]
    pub deliverables: Vec<DeliverableKind>,

    /// Submit and return without following progress
    #[arg(long)]
    pub no_follow: bool,
}

pub async fn run(ctx: &AppContext, args: RunArgs) -> Result<()> {
    let controller = ctx.open(&args.session).await?;
    if controller.is_polling() {
        println!(
            "{}",
            "A batch is already running in this session; following it instead.".yellow()
        );
        output::follow(&controller).await;
        return Ok(());
    }

    controller.set_start_type(args.start)?;
    controller.set_description(&args.description)?;
    controller.set_target_columns(&args.columns)?;

    if let Some(path) = &args.file {
        let blob = controller.upload_source(read_blob(path).await?).await?;
        println!("Uploaded {} as {}", blob.file_name, blob.id.cyan());
    }

    controller.advance()?;
    controller.select_deliverables(&args.deliverables)?;

    let total = controller
        .submit()
        .await
        .context("Submission failed; nothing was queued")?;
    println!("Submitted {total} tasks.");

    if args.no_follow {
        controller.stop();
        return Ok(());
    }
    output::follow(&controller).await;
    output::summary(&controller.view());
    Ok(())
}

/// Reads a local file into an upload. The content type is left for the
/// backend client to infer from the file name.
pub async fn read_blob(path: &Path) -> Result<NewBlob> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    Ok(NewBlob::new(file_name, "", bytes))
}
