mod allocator;
mod backend;
mod cli;
mod commands;
mod error;
mod model;
mod store;
mod synthesis;
mod util;

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::error::ServiceError;

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }

        let service_error = err.chain().find_map(|cause| cause.downcast_ref::<ServiceError>());
        let (kind, message, code) = match service_error {
            Some(service_error) => (
                service_error.kind(),
                service_error.message().to_string(),
                service_error.exit_code(),
            ),
            None => ("internal", format!("{err:#}"), 1),
        };

        let body = json!({ "error": { "kind": kind, "message": message } });
        if util::write_json_stdout(&body).is_err() {
            error!("failed to write error body");
        }
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::ImportCorpus(args) => commands::import::run(args),
        Commands::AllocateSlots(args) => commands::allocate::run(args),
        Commands::GeneratePassages(args) => commands::passages::run(args),
        Commands::ListWords(args) => commands::words::run(args),
        Commands::Status(args) => commands::status::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
