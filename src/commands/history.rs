use super::render::{format_citation, short_id};
use super::{build_backends, require_identity};
use crate::cli::HistoryCommand;
use crate::config::Config;
use crate::error::{GenieError, Result};
use crate::persistence::Role;
use colored::Colorize;
use prettytable::{format, Table};

/// Handle history commands
pub async fn handle_history(config: &Config, command: HistoryCommand) -> Result<()> {
    let backends = build_backends(config)?;
    let owner = require_identity(backends.identity.as_ref()).await?;
    let persistence = backends.persistence;

    match command {
        HistoryCommand::List { limit } => {
            let limit = limit.unwrap_or(config.chat.recent_limit);
            let sessions = persistence.list_sessions(&owner.id, limit).await?;

            if sessions.is_empty() {
                println!("{}", "No chat history found.".yellow());
                return Ok(());
            }

            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

            table.add_row(prettytable::row![
                "ID".bold(),
                "Title".bold(),
                "Created".bold(),
                "Last Updated".bold()
            ]);

            for session in sessions {
                let title = if session.title.chars().count() > 40 {
                    format!("{}...", session.title.chars().take(37).collect::<String>())
                } else {
                    session.title
                };

                table.add_row(prettytable::row![
                    short_id(&session.id).cyan(),
                    title,
                    session.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    session.updated_at.format("%Y-%m-%d %H:%M").to_string()
                ]);
            }

            println!("\nChat History:");
            table.printstd();
            println!();
            println!(
                "Use {} to continue a chat.",
                "askgenie chat --session <ID>".cyan()
            );
            println!();
        }
        HistoryCommand::Show { id } => {
            let session = persistence
                .get_session(&id)
                .await?
                .filter(|s| s.owner_id == owner.id)
                .ok_or_else(|| GenieError::Validation(format!("Unknown session: {}", id)))?;
            let messages = persistence.list_messages(&session.id).await?;

            println!(
                "\n{} {}\n",
                session.title.bold(),
                format!("({})", session.created_at.format("%Y-%m-%d %H:%M")).dimmed()
            );
            if messages.is_empty() {
                println!("{}", "No messages in this chat.".yellow());
            }
            for message in messages {
                let speaker = match message.role {
                    Role::User => "You".green().bold(),
                    Role::Assistant => "Genie".cyan().bold(),
                };
                println!("{}: {}", speaker, message.content);
                for (i, citation) in message.citations.iter().enumerate() {
                    println!("{}", format_citation(i + 1, citation));
                }
                println!();
            }
        }
    }

    Ok(())
}
