//! Line-oriented terminal front end.
//!
//! Plain lines are sent to the bot; lines starting with `/` are commands.
//! Rendering runs in its own task fed by the session's snapshot channel, so
//! the thinking placeholder shows up while a request is in flight.

use crate::error::TurnError;
use crate::export;
use crate::logging;
use crate::message::{Message, MessageLog, Mode};
use crate::session::{ChatSession, QUICK_ACTIONS};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[derive(Debug, Parser)]
#[command(name = "faqchat", version, about = "Ask the college FAQ or the GPT backend")]
pub struct Args {
    /// Backend base address (overrides FAQCHAT_API_URL and the config file)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Where the database and logs live
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Initial answer source: faq or gpt
    #[arg(long, value_parser = parse_mode)]
    pub mode: Option<Mode>,
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    Mode::from_str(s).ok_or_else(|| format!("unknown mode '{}', expected faq or gpt", s))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Mode(Option<Mode>),
    SignUp {
        email: String,
        password: String,
        confirm_password: String,
        name: String,
    },
    SignIn {
        email: String,
        password: String,
    },
    Logout,
    Clear,
    Export(Option<PathBuf>),
    Dark,
    Quick(Option<usize>),
    Account,
    Help,
    Quit,
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let Some(rest) = line.trim().strip_prefix('/') else {
            return Command::Send(line.to_string());
        };
        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match (name, args.as_slice()) {
            ("mode", []) => Command::Mode(None),
            ("mode", [mode]) => match Mode::from_str(mode) {
                Some(mode) => Command::Mode(Some(mode)),
                None => Command::Invalid(format!("unknown mode '{}'", mode)),
            },
            ("signup", [email, password, confirm, name @ ..]) if !name.is_empty() => {
                Command::SignUp {
                    email: email.to_string(),
                    password: password.to_string(),
                    confirm_password: confirm.to_string(),
                    name: name.join(" "),
                }
            }
            ("signup", _) => {
                Command::Invalid("usage: /signup <email> <password> <confirm> <name...>".into())
            }
            ("login", [email, password]) => Command::SignIn {
                email: email.to_string(),
                password: password.to_string(),
            },
            ("login", _) => Command::Invalid("usage: /login <email> <password>".into()),
            ("logout", []) => Command::Logout,
            ("clear", []) => Command::Clear,
            ("export", []) => Command::Export(None),
            ("export", [dir]) => Command::Export(Some(PathBuf::from(dir))),
            ("dark", []) => Command::Dark,
            ("quick", []) => Command::Quick(None),
            ("quick", [n]) => match n.parse::<usize>() {
                Ok(n) if (1..=QUICK_ACTIONS.len()).contains(&n) => Command::Quick(Some(n - 1)),
                _ => Command::Invalid(format!("pick a quick question 1-{}", QUICK_ACTIONS.len())),
            },
            ("account", []) => Command::Account,
            ("help", _) => Command::Help,
            ("quit", _) | ("exit", _) => Command::Quit,
            _ => Command::Invalid(format!("unknown command '/{}', try /help", name)),
        }
    }
}

fn format_line(message: &Message) -> String {
    format!(
        "[{}] {}: {}",
        export::format_display_time(message.created_at),
        message.role.as_str(),
        message.display_text()
    )
}

/// Lines to print when the view moves from `shown` to `next`.
fn render_diff(shown: &MessageLog, next: &MessageLog) -> Vec<String> {
    let shared = shown
        .messages()
        .iter()
        .zip(next.messages())
        .take_while(|(a, b)| a.id == b.id)
        .count();

    let mut lines = Vec::new();
    let diverged_committed = shown.messages()[shared..].iter().any(|m| !m.pending);
    if diverged_committed {
        lines.push("──────── conversation reloaded ────────".to_string());
        lines.extend(next.messages().iter().map(format_line));
    } else {
        lines.extend(next.messages()[shared..].iter().map(format_line));
    }
    lines
}

async fn render_loop(mut snapshots: watch::Receiver<MessageLog>) {
    let mut shown = snapshots.borrow_and_update().clone();
    for message in shown.messages() {
        println!("{}", format_line(message));
    }
    while snapshots.changed().await.is_ok() {
        let next = snapshots.borrow_and_update().clone();
        for line in render_diff(&shown, &next) {
            println!("{}", line);
        }
        shown = next;
    }
}

fn print_help() {
    println!("Type a question and press Enter. Commands:");
    println!("  /mode [faq|gpt]                      toggle or pick the answer source");
    println!("  /signup <email> <password> <confirm> <name...>");
    println!("  /login <email> <password>");
    println!("  /logout   /clear   /account   /dark");
    println!("  /export [dir]                        save the conversation as text");
    println!("  /quick [n]                           list or send a quick question");
    println!("  /quit");
}

fn print_quick_actions() {
    for (i, (label, _)) in QUICK_ACTIONS.iter().enumerate() {
        println!("  {}. {}", i + 1, label);
    }
}

/// What to tell the user about a turn that did not run. Blank lines stay silent.
fn turn_notice(result: &Result<Message, TurnError>) -> Option<String> {
    match result {
        Ok(_) | Err(TurnError::EmptyInput) => None,
        Err(TurnError::Busy) => Some("Still waiting for the previous reply.".to_string()),
        Err(e) => Some(format!("Message not sent: {}", e)),
    }
}

fn report_turn(result: Result<Message, TurnError>) {
    if let Some(notice) = turn_notice(&result) {
        if let Err(e) = &result {
            logging::log_error(None, &e.to_string());
        }
        println!("{}", notice);
    }
}

/// Returns false when the user asked to quit.
async fn handle(session: &mut ChatSession, command: Command) -> bool {
    match command {
        Command::Send(text) => report_turn(session.send(&text).await),
        Command::Mode(choice) => {
            let mode = choice.unwrap_or_else(|| session.mode().other());
            session.set_mode(mode);
            println!("Mode: {}", mode.as_str());
        }
        Command::SignUp {
            email,
            password,
            confirm_password,
            name,
        } => match session.sign_up(&name, &email, &password, &confirm_password) {
            Ok(identity) => println!("Welcome, {}!", identity.display_name),
            Err(e) => println!("Sign up failed: {}", e),
        },
        Command::SignIn { email, password } => match session.sign_in(&email, &password) {
            Ok(identity) => println!("Welcome back, {}!", identity.display_name),
            Err(e) => println!("Sign in failed: {}", e),
        },
        Command::Logout => match session.identity().map(|i| i.display_name.clone()) {
            Some(name) => {
                session.logout();
                println!("Signed out {}.", name);
            }
            None => println!("Not signed in."),
        },
        Command::Clear => session.clear_history(),
        Command::Export(dir) => {
            let dir = dir.unwrap_or_else(|| PathBuf::from("."));
            match export::write_transcript(session.log(), &dir) {
                Ok(path) => println!("Saved {}", path.display()),
                Err(e) => println!("Export failed: {}", e),
            }
        }
        Command::Dark => match session.toggle_dark_mode() {
            Ok(true) => println!("Dark mode enabled"),
            Ok(false) => println!("Dark mode disabled"),
            Err(e) => println!("Could not save preference: {}", e),
        },
        Command::Quick(None) => print_quick_actions(),
        Command::Quick(Some(index)) => {
            if let Some(result) = session.send_quick_action(index).await {
                report_turn(result);
            }
        }
        Command::Account => match (session.identity(), session.history_summary()) {
            (Some(identity), Some(summary)) => {
                println!("{} <{}>", identity.display_name, identity.account_id);
                println!("{} messages saved", summary.saved_messages);
                if let Some(at) = summary.last_activity {
                    println!("Last activity: {}", export::format_display_time(at));
                }
            }
            _ => println!("Not signed in."),
        },
        Command::Help => print_help(),
        Command::Quit => return false,
        Command::Invalid(reason) => println!("{}", reason),
    }
    true
}

/// Drive the session from stdin until EOF or `/quit`.
pub async fn repl(mut session: ChatSession) -> std::io::Result<()> {
    let renderer = tokio::spawn(render_loop(session.subscribe()));
    println!("Mode: {} (type /help for commands)", session.mode().as_str());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !handle(&mut session, Command::parse(&line)).await {
            break;
        }
        tokio::task::yield_now().await;
    }

    drop(session);
    let _ = renderer.await;
    Ok(())
}
