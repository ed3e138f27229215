use super::context::AppContext;
use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;
use foundry_application::SessionController;
use foundry_core::content::{Lifecycle, SessionContent, StepState};
use foundry_infrastructure::HttpBackend;

#[derive(Subcommand, Debug)]
pub enum LifecycleAction {
    /// Print the phases and the current position
    Show { session: String },
    /// Replace the phases and/or move the current position
    Set {
        session: String,
        /// New phase list, comma separated
        #[arg(long, value_delimiter = ',')]
        steps: Option<Vec<String>>,
        /// Zero-based current phase; the phase count marks every phase done
        #[arg(long)]
        current: Option<usize>,
    },
    /// Append a phase
    Add {
        session: String,
        label: Option<String>,
    },
    /// Rename the phase at INDEX
    Rename {
        session: String,
        index: usize,
        label: String,
    },
    /// Remove the phase at INDEX
    Remove { session: String, index: usize },
    /// Ask the session's assistant to propose phases
    Generate { session: String },
}

pub async fn execute(ctx: &AppContext, action: LifecycleAction) -> Result<()> {
    match action {
        LifecycleAction::Show { session } => {
            let lifecycle = load(ctx, &session).await?.1;
            print(&lifecycle);
        }
        LifecycleAction::Set {
            session,
            steps,
            current,
        } => {
            if steps.is_none() && current.is_none() {
                bail!("nothing to change: pass --steps and/or --current");
            }
            edit(ctx, &session, |lifecycle| {
                if let Some(steps) = steps {
                    *lifecycle = Lifecycle::new(
                        steps
                            .into_iter()
                            .map(|step| step.trim().to_string())
                            .filter(|step| !step.is_empty())
                            .collect(),
                    );
                }
                if let Some(index) = current {
                    lifecycle.set_current(index)?;
                }
                Ok(())
            })
            .await?;
        }
        LifecycleAction::Add { session, label } => {
            edit(ctx, &session, |lifecycle| {
                lifecycle.add_step(label.as_deref());
                Ok(())
            })
            .await?;
        }
        LifecycleAction::Rename {
            session,
            index,
            label,
        } => {
            edit(ctx, &session, |lifecycle| Ok(lifecycle.rename_step(index, &label)?)).await?;
        }
        LifecycleAction::Remove { session, index } => {
            edit(ctx, &session, |lifecycle| {
                let removed = lifecycle.remove_step(index)?;
                println!("Removed '{removed}'.");
                Ok(())
            })
            .await?;
        }
        LifecycleAction::Generate { session } => {
            let controller = ctx.open_idle(&session).await?;
            println!("{}", "Asking the assistant for lifecycle phases...".dimmed());
            let lifecycle = controller.generate_lifecycle().await?;
            print(&lifecycle);
        }
    }
    Ok(())
}

async fn load(ctx: &AppContext, session_id: &str) -> Result<(SessionController<HttpBackend>, Lifecycle)> {
    let controller = ctx.open_idle(session_id).await?;
    let lifecycle = SessionContent::parse(&controller.view().session.content)
        .lifecycle
        .unwrap_or_default();
    Ok((controller, lifecycle))
}

async fn edit(
    ctx: &AppContext,
    session_id: &str,
    change: impl FnOnce(&mut Lifecycle) -> Result<()>,
) -> Result<()> {
    let (controller, mut lifecycle) = load(ctx, session_id).await?;
    change(&mut lifecycle)?;
    controller.set_lifecycle(lifecycle.clone()).await?;
    print(&lifecycle);
    Ok(())
}

fn print(lifecycle: &Lifecycle) {
    if !lifecycle.is_defined() {
        println!("{}", lifecycle.phase_label().dimmed());
        return;
    }
    println!(
        "{} ({:.0}%)",
        lifecycle.phase_label().bold(),
        lifecycle.progress_fraction() * 100.0
    );
    for (index, step) in lifecycle.steps.iter().enumerate() {
        let line = format!("{index}. {step}");
        match lifecycle.step_state(index) {
            StepState::Completed => println!("  {}", line.green()),
            StepState::Active => println!("> {}", line.yellow().bold()),
            StepState::Pending => println!("  {}", line.dimmed()),
        }
    }
}
