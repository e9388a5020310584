//! A terminal chat that checks every message for safety before answering.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::process::ExitCode;
use std::time::Duration;

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use safechat::config::AppConfig;
use safechat::core::{OrchestrationError, Role, SubmitOutcome, Transcript};
use safechat::{Session, SessionBuilder};
use safechat_openai_model::OpenAIProvider;
use tokio::io::{self, AsyncBufReadExt, BufReader, Stdin};

const BAR_CHAR: &str = "▎";

enum Command<'a> {
    Send(&'a str),
    Starter(usize),
    History,
    Delete(usize),
    Help,
    Usage(&'static str),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let session = SessionBuilder::with_model_provider(OpenAIProvider::new(
        config.completion.clone(),
    ))
    .with_safety_gate(config.safety_gate())
    .build();

    print_starters(&session);

    let mut stdin = BufReader::new(io::stdin());
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line(&mut stdin).await else {
            break;
        };
        match parse_command(line.trim()) {
            Command::Send(text) => send_message(&session, text).await,
            Command::Starter(index) => match session.starter(index) {
                Some(starter) => {
                    println!("> {starter}");
                    send_message(&session, starter).await;
                }
                None => eprintln!("No starter #{}.", index + 1),
            },
            Command::History => print_history(&session.transcript()),
            Command::Delete(position) => {
                match session.delete_message(position) {
                    Some(message) => println!(
                        "{}",
                        format!("Deleted: {}", preview(&message.content))
                            .dimmed()
                    ),
                    None => eprintln!("No message #{}.", position + 1),
                }
            }
            Command::Help => print_help(),
            Command::Usage(usage) => eprintln!("Usage: {usage}"),
        }
    }

    ExitCode::SUCCESS
}

async fn send_message(session: &Session, text: &str) {
    if text.is_empty() {
        return;
    }

    let progress_bar = spinner("🛡️  Checking message safety...");
    let outcome = session.send_message(text).await;
    progress_bar.finish_and_clear();

    let mut reply = match outcome {
        Ok(SubmitOutcome::Streaming(reply)) => reply,
        Ok(SubmitOutcome::Blocked(_)) => {
            print_notice(session);
            return;
        }
        Err(err) => {
            if let OrchestrationError::SafetyUnavailable(cause) = &err {
                warn!("safety check unavailable: {}", cause.detail());
            } else {
                debug!("message not sent: {err}");
            }
            print_notice(session);
            return;
        }
    };

    let mut progress_bar = Some(spinner("🤔 Thinking..."));
    let mut printed = 0;
    while let Some(transcript) = reply.next().await {
        if let Some(progress_bar) = progress_bar.take() {
            // Finish the progress bar before printing anything else.
            progress_bar.finish_and_clear();
            print!("{}🤖 ", BAR_CHAR.bright_cyan());
        }
        match transcript {
            Ok(transcript) => {
                let Some(last) = transcript.last() else {
                    continue;
                };
                // Every snapshot extends the previous one.
                let delta = last.content.get(printed..).unwrap_or_default();
                print!("{}", delta.bright_white());
                std::io::stdout().flush().ok();
                printed = last.content.len();
            }
            Err(err) => {
                debug_assert!(matches!(
                    err,
                    OrchestrationError::CompletionFailure(_)
                ));
                println!();
                print_notice(session);
                return;
            }
        }
    }

    match progress_bar {
        Some(progress_bar) => progress_bar.finish_and_clear(),
        None => println!(),
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(progress_style);
    progress_bar.set_message(message);
    progress_bar.enable_steady_tick(Duration::from_millis(100));
    progress_bar
}

fn parse_command(line: &str) -> Command<'_> {
    let Some(command) = line.strip_prefix('/') else {
        return Command::Send(line);
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim())),
        None => (command, None),
    };
    // Positions are shown starting from 1.
    let position = arg
        .and_then(|arg| arg.parse::<usize>().ok())
        .and_then(|n| n.checked_sub(1));
    match name {
        "starter" => {
            position.map_or(Command::Usage("/starter N"), Command::Starter)
        }
        "delete" => {
            position.map_or(Command::Usage("/delete N"), Command::Delete)
        }
        "history" => Command::History,
        "help" => Command::Help,
        _ => Command::Send(line),
    }
}

fn print_starters(session: &Session) {
    let starters = session.starters();
    if starters.is_empty() {
        return;
    }
    println!("{}", "Try one of these (/starter N):".dimmed());
    for (idx, starter) in starters.iter().enumerate() {
        println!("  {} {starter}", format!("{}.", idx + 1).bright_black());
    }
}

fn print_history(transcript: &Transcript) {
    if transcript.is_empty() {
        println!("{}", "No messages yet.".dimmed());
        return;
    }
    for (idx, message) in transcript.iter().enumerate() {
        let position = format!("{:>3}", idx + 1);
        match message.role {
            Role::User => println!(
                "{} {}🧑 {}",
                position.bright_black(),
                BAR_CHAR.bright_green(),
                preview(&message.content)
            ),
            Role::Assistant => println!(
                "{} {}🤖 {}",
                position.bright_black(),
                BAR_CHAR.bright_cyan(),
                preview(&message.content)
            ),
        }
    }
}

fn print_help() {
    println!("/starter N   send conversation starter N");
    println!("/history     list the messages with their positions");
    println!("/delete N    delete message N");
    println!("/help        show this help");
}

fn print_notice(session: &Session) {
    if let Some(notice) = session.notice() {
        println!("{}⚠️  {}", BAR_CHAR.bright_yellow(), notice.bright_yellow());
    }
}

fn preview(content: &str) -> String {
    const MAX_CHARS: usize = 72;

    let line = content.lines().next().unwrap_or_default();
    if line.chars().count() > MAX_CHARS || line.len() < content.trim_end().len()
    {
        let truncated: String = line.chars().take(MAX_CHARS).collect();
        format!("{truncated}…")
    } else {
        line.to_owned()
    }
}

async fn read_line(stdin: &mut BufReader<Stdin>) -> Option<String> {
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
