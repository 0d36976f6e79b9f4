use crate::cli::SessionsCommand;
use crate::client::ApiClient;
use crate::error::Result;
use crate::storage::SessionSummary;
use colored::Colorize;
use prettytable::{format, Table};

/// Shorten a title for table display
fn display_title(summary: &SessionSummary) -> String {
    match &summary.title {
        Some(title) if title.chars().count() > 40 => {
            format!("{}...", title.chars().take(37).collect::<String>())
        }
        Some(title) => title.clone(),
        None => "(empty)".to_string(),
    }
}

/// Render sessions as a table
pub fn session_table(sessions: &[SessionSummary]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Messages".bold(),
        "Last Updated".bold()
    ]);

    for session in sessions {
        let updated = session.updated_at.format("%Y-%m-%d %H:%M").to_string();
        table.add_row(prettytable::row![
            session.session_id.cyan(),
            display_title(session),
            session.message_count,
            updated
        ]);
    }
    table
}

/// Handle session commands against a running server
pub async fn handle_sessions(server_url: &str, command: SessionsCommand) -> Result<()> {
    let api = ApiClient::new(server_url)?;

    match command {
        SessionsCommand::List => {
            let sessions = api.list_sessions().await?;

            if sessions.is_empty() {
                println!("{}", "No chat sessions found.".yellow());
                return Ok(());
            }

            println!("\nChat Sessions:");
            session_table(&sessions).printstd();
            println!();
            println!(
                "Use {} to continue a session interactively.",
                "parley chat, then /open <ID>".cyan()
            );
            println!();
        }
        SessionsCommand::Delete { id } => {
            api.delete_session(&id).await?;
            println!("{}", format!("Deleted session {}", id).green());
        }
    }

    Ok(())
}
