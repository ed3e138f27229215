//! Terminal formatting shared by the commands.

use colored::{ColoredString, Colorize};
use foundry_application::{PollOutcome, SessionController, SessionView};
use foundry_core::backend::Backend;
use foundry_core::session::SessionStatus;
use foundry_core::wizard::Outcome;
use std::time::Duration;

pub fn status(status: SessionStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        SessionStatus::Completed => label.green(),
        SessionStatus::Processing => label.yellow(),
        SessionStatus::Cancelled => label.magenta(),
        SessionStatus::Error => label.red(),
        SessionStatus::Pending | SessionStatus::Unknown => label.dimmed(),
    }
}

pub fn outcome(outcome: Outcome) -> ColoredString {
    match outcome {
        Outcome::Completed => outcome.label().green().bold(),
        Outcome::Cancelled => outcome.label().magenta().bold(),
        Outcome::Failed => outcome.label().red().bold(),
    }
}

pub fn error(message: &str) -> ColoredString {
    format!("Error: {message}").red()
}

pub fn summary(view: &SessionView) {
    println!(
        "{} {} [{}] step {}/4: {}",
        view.session.display_title().bold(),
        format!("({})", view.session.id).dimmed(),
        status(view.session.status),
        view.wizard.step().number(),
        view.wizard.step()
    );
    if let Some(progress) = &view.progress {
        println!("  progress: {progress}");
    }
    for blob in &view.blobs {
        println!(
            "  {} {} ({} bytes)",
            blob.id.cyan(),
            blob.file_name,
            blob.size
        );
    }
}

/// Prints progress changes until the controller's poll loop ends or the
/// user presses Ctrl-C.
pub async fn follow<B: Backend + ?Sized + 'static>(controller: &SessionController<B>) {
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let mut last_line = String::new();
    let wait = controller.wait_for_poll();
    tokio::pin!(wait);

    loop {
        tokio::select! {
            outcome = &mut wait => {
                let view = controller.view();
                match outcome {
                    Some(PollOutcome::Terminal(done)) => println!("{}", self::outcome(done)),
                    Some(PollOutcome::BudgetExhausted { last_status }) => println!(
                        "{}",
                        format!(
                            "Stopped following after the poll budget ran out (last status: {}).",
                            last_status.map(|s| s.to_string()).unwrap_or_else(|| "unknown".into())
                        )
                        .yellow()
                    ),
                    Some(PollOutcome::Stopped) | None => {}
                }
                if let Some(message) = view.last_error {
                    eprintln!("{}", error(&message));
                }
                return;
            }
            _ = ticker.tick() => {
                let view = controller.view();
                let line = match &view.progress {
                    Some(progress) => format!("{} {}", status(view.session.status), progress),
                    None => format!("{} waiting for first update", status(view.session.status)),
                };
                if line != last_line {
                    println!("{line}");
                    last_line = line;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                controller.stop();
                println!("{}", "Stopped following; the batch keeps running on the server.".dimmed());
                return;
            }
        }
    }
}
