//! Reports what the installation contains and how to fix what's missing.

use std::process::ExitCode;

use research_agent::diagnostics::Report;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let dotenv_loaded = dotenv::dotenv().is_ok();
    let report = Report::collect();
    println!("{report}");
    if !dotenv_loaded {
        println!("(no .env file found in the working directory)");
    }

    if report.is_healthy() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
