use super::context::AppContext;
use anyhow::Result;
use clap::Subcommand;
use colored::{ColoredString, Colorize};
use foundry_core::session::{ChatMessage, MessageRole};

#[derive(Subcommand, Debug)]
pub enum ChatAction {
    /// Send a message and print the conversation
    Send { session: String, message: String },
    /// Print the chat history
    List { session: String },
    /// Delete the chat history
    Clear { session: String },
}

pub async fn execute(ctx: &AppContext, action: ChatAction) -> Result<()> {
    match action {
        ChatAction::Send { session, message } => {
            let controller = ctx.open_idle(&session).await?;
            let messages = controller.send_message(&message).await?;
            print_history(&messages);
        }
        ChatAction::List { session } => {
            let controller = ctx.open_idle(&session).await?;
            print_history(&controller.messages().await?);
        }
        ChatAction::Clear { session } => {
            let controller = ctx.open_idle(&session).await?;
            controller.clear_messages().await?;
            println!("Chat history of {session} cleared.");
        }
    }
    Ok(())
}

fn print_history(messages: &[ChatMessage]) {
    if messages.is_empty() {
        println!("{}", "No messages.".dimmed());
    }
    for message in messages {
        println!("{} {}", speaker(message.role), message.content);
    }
}

fn speaker(role: MessageRole) -> ColoredString {
    match role {
        MessageRole::User => "you:".cyan().bold(),
        MessageRole::Assistant => "assistant:".green().bold(),
        MessageRole::System => "system:".yellow(),
        MessageRole::Other => "?:".dimmed(),
    }
}
