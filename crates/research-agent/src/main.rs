//! The research assistant in the terminal.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use research_agent::core::{
    History, Role, RunStatus, Stage, Turn, cancel_pair,
};
use research_agent::{Config, SessionBuilder};
use tokio::io::{self, AsyncBufReadExt};

const BAR_CHAR: &str = "▎";
const RULE_WIDTH: usize = 60;
const MAX_TOOL_RESULT_CHARS: usize = 800;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".bright_red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    if let Err(err) = dotenv::dotenv() {
        debug!("no .env file loaded: {err}");
    }
    let config = Config::from_env().context("failed to load configuration")?;
    debug!("loaded config: {config:?}");

    print_banner("RESEARCH ASSISTANT - ReAct Agent");
    print!("\nWhat can I help you research? ");
    std::io::stdout().flush()?;
    let Some(query) = read_line().await? else {
        bail!("no research query given");
    };
    let query = query.trim().to_owned();
    if query.is_empty() {
        bail!("no research query given");
    }

    println!();
    print_banner("AGENT WORKING...");

    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(
        ProgressStyle::with_template("{spinner} {wide_msg}")
            .context("invalid progress template")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    progress_bar.enable_steady_tick(Duration::from_millis(100));

    let session = SessionBuilder::from_config(&config)
        .on_stage({
            let progress_bar = progress_bar.clone();
            move |stage| progress_bar.set_message(stage_message(stage))
        })
        .on_turn({
            let progress_bar = progress_bar.clone();
            move |turn| {
                for call in turn.tool_calls() {
                    progress_bar.println(format!(
                        "{}🔧 {} {}",
                        BAR_CHAR.bright_yellow(),
                        call.name.bright_white().bold(),
                        call.arguments.dimmed()
                    ));
                }
            }
        })
        .build()
        .context("failed to set up the tools")?;

    let (cancel_handle, cancel_signal) = cancel_pair();
    tokio::spawn({
        let progress_bar = progress_bar.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            progress_bar
                .set_message("🛑 Cancelling, press Ctrl-C again to quit...");
            cancel_handle.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                progress_bar.finish_and_clear();
                std::process::exit(130);
            }
        }
    });

    let result = session.research(&query, &cancel_signal).await;
    progress_bar.finish_and_clear();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            print_transcript(err.history());
            return Err(err).context("research failed");
        }
    };
    print_transcript(&outcome.history);

    match (outcome.status, outcome.final_answer()) {
        (RunStatus::Completed, Some(answer)) => {
            print_banner("FINAL ANSWER:");
            println!("{answer}");
            print_rule();
            Ok(ExitCode::SUCCESS)
        }
        (RunStatus::Cancelled, _) => {
            print_banner("RUN CANCELLED - no final answer");
            Ok(ExitCode::FAILURE)
        }
        (RunStatus::IterationLimitReached, _) => {
            let max_iterations =
                session.agent().max_iterations().unwrap_or_default();
            print_banner(&format!(
                "INCOMPLETE - stopped after {max_iterations} model calls"
            ));
            Ok(ExitCode::FAILURE)
        }
        (RunStatus::Completed, None) => {
            bail!("the run completed without an answer")
        }
    }
}

fn stage_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Generating => "🤔 Thinking...",
        Stage::Acting => "🔎 Researching...",
        Stage::Done => "✍️ Done",
    }
}

fn print_rule() {
    println!("{}", "=".repeat(RULE_WIDTH));
}

fn print_banner(title: &str) {
    print_rule();
    println!("{}", title.bold());
    print_rule();
}

fn print_transcript(history: &History) {
    println!();
    print_banner("CONVERSATION FLOW:");
    println!();
    for turn in history {
        print_turn(turn);
        println!();
    }
}

fn print_turn(turn: &Turn) {
    match turn.role() {
        // The instructions are the same for every query.
        Role::System => {}
        Role::Human => {
            println!("{}🧑 {}", BAR_CHAR.bright_green(), "Human".bold());
            println!("{}", turn.content());
        }
        Role::Assistant => {
            println!("{}🤖 {}", BAR_CHAR.bright_cyan(), "Assistant".bold());
            if !turn.content().is_empty() {
                println!("{}", turn.content().bright_white());
            }
            for call in turn.tool_calls() {
                println!(
                    "  → {} {} {}",
                    call.name.bright_white().bold(),
                    call.arguments,
                    format!("({})", call.id).dimmed()
                );
            }
        }
        Role::ToolResult => {
            println!(
                "{}🔧 {} {}",
                BAR_CHAR.bright_yellow(),
                "Tool result".bold(),
                format!("({})", turn.call_id().unwrap_or_default()).dimmed()
            );
            let content = turn.content();
            match content.char_indices().nth(MAX_TOOL_RESULT_CHARS) {
                Some((idx, _)) => println!("{}…", &content[..idx]),
                None => println!("{content}"),
            }
        }
    }
}

async fn read_line() -> Result<Option<String>> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    let count = stdin
        .read_line(&mut line)
        .await
        .context("error reading input")?;
    if count == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}
