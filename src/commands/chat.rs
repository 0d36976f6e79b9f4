//! Interactive chat handler
//!
//! A readline loop over [`ClientState`]: plain lines are sent to the active
//! session, slash commands manage sessions. While a rate-limit countdown is
//! running the loop prints the remaining seconds once per second and sends
//! nothing.

use crate::client::state::SendOutcome;
use crate::client::{ApiClient, ClientState};
use crate::commands::sessions::session_table;
use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
use crate::error::Result;
use crate::storage::{Message, Role};

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;
use std::time::Duration;

const QUIT_COMMAND: &str = "/quit";

fn print_welcome_banner(server_url: &str) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║               Parley Interactive Chat - Welcome!             ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
    println!("Server: {}", server_url.cyan());
    println!(
        "Type '/help' for available commands, '{}' to quit\n",
        QUIT_COMMAND
    );
}

fn print_message(message: &Message) {
    match message.role {
        Role::User => println!("{} {}", "you>".green().bold(), message.content),
        Role::Assistant => println!("{} {}\n", "assistant>".blue().bold(), message.content),
    }
}

fn prompt_for(state: &ClientState) -> String {
    match &state.active_session {
        Some(id) => {
            let skip = id.chars().count().saturating_sub(6);
            format!("[{}] > ", id.chars().skip(skip).collect::<String>())
        }
        None => "[new] > ".to_string(),
    }
}

/// Print the countdown once per second until it runs out
async fn wait_out_countdown(state: &mut ClientState) {
    let Some(mut remaining) = state.countdown_remaining() else {
        return;
    };
    while remaining > 0 {
        print!(
            "\r{}",
            format!("Rate limited. Retry in {:>3}s ", remaining).yellow()
        );
        let _ = std::io::stdout().flush();
        tokio::time::sleep(Duration::from_secs(1)).await;
        remaining = state.tick().unwrap_or(0);
    }
    println!("\r{}", "You can send messages again.        ".green());
}

fn report_error(state: &ClientState) {
    if let Some(banner) = &state.error {
        eprintln!("{}", format!("Error: {}", banner.message).red());
    }
}

/// Start the interactive chat against `server_url`
///
/// # Errors
///
/// Returns error if the server URL is invalid or the line editor cannot start
pub async fn run_chat(server_url: &str) -> Result<()> {
    tracing::info!("Starting interactive chat");

    let api = ApiClient::new(server_url)?;
    let mut state = ClientState::new();
    let mut rl = DefaultEditor::new()?;

    print_welcome_banner(api.base_url());
    if state.refresh_sessions(&api).await.is_err() {
        report_error(&state);
    }

    loop {
        match rl.readline(&prompt_for(&state)) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                let command = match parse_special_command(trimmed) {
                    Ok(command) => command,
                    Err(e) => {
                        eprintln!("{}", e.to_string().red());
                        continue;
                    }
                };

                match command {
                    SpecialCommand::New => match state.create_session(&api).await {
                        Ok(id) => println!("{}", format!("Started session {}", id).green()),
                        Err(_) => report_error(&state),
                    },
                    SpecialCommand::List => {
                        if state.refresh_sessions(&api).await.is_err() {
                            report_error(&state);
                        } else if state.sessions.is_empty() {
                            println!("{}", "No chat sessions found.".yellow());
                        } else {
                            session_table(&state.sessions).printstd();
                        }
                    }
                    SpecialCommand::Open(id) => match state.open_session(&api, &id).await {
                        Ok(()) => {
                            println!("{}", format!("Opened session {}\n", id).green());
                            for message in &state.messages {
                                print_message(message);
                            }
                        }
                        Err(_) => report_error(&state),
                    },
                    SpecialCommand::Delete(id) => match state.delete_session(&api, &id).await {
                        Ok(()) => println!("{}", format!("Deleted session {}", id).green()),
                        Err(_) => report_error(&state),
                    },
                    SpecialCommand::Help => print_help(),
                    SpecialCommand::Exit => break,
                    SpecialCommand::None => match state.send(&api, trimmed).await {
                        SendOutcome::Replied(reply) => print_message(&reply),
                        SendOutcome::Empty => {}
                        SendOutcome::Blocked { remaining } => {
                            println!(
                                "{}",
                                format!("Still rate limited for {} seconds.", remaining).yellow()
                            );
                            wait_out_countdown(&mut state).await;
                        }
                        SendOutcome::Failed => {
                            report_error(&state);
                            wait_out_countdown(&mut state).await;
                        }
                    },
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                tracing::error!("Readline error: {:?}", err);
                break;
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}
