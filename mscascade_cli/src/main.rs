mod cli;
mod commands;
mod error;
mod pipeline;

use clap::Parser;
use tracing::subscriber::set_global_default;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Commands};
use crate::commands::{main_annotate, main_run};
use crate::error::CliError;

fn main() -> Result<(), CliError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_span_events(FmtSpan::CLOSE));

    set_global_default(subscriber).map_err(|e| CliError::Logging(e.to_string()))?;
    let args = Args::parse();

    match args.command {
        Commands::Run(args) => main_run(args)?,
        Commands::Annotate(args) => main_annotate(args)?,
    }
    Ok(())
}
