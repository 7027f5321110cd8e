//! fmrec CLI - encode, inspect and evaluate sparse rating record files.

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fmrec_cli::{Cli, Commands};

fn main() -> Result<()> {
    // stdout carries command output, logs go to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("fmrec=info".parse()?))
        .init();

    let cli = Cli::parse();
    debug!(?cli, "fmrec starting");

    match cli.command {
        Commands::Encode(cmd) => cmd.run()?,
        Commands::Inspect(cmd) => cmd.run()?,
        Commands::Evaluate(cmd) => cmd.run()?,
    }

    Ok(())
}
