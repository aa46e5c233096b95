//! Vigil CLI
//!
//! Security posture scanner for cloud AI resources.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Vigil - A security posture scanner for cloud AI resources
#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (json, text)
    #[arg(short, long, global = true, default_value = "json")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan discovered resources and write the report
    Scan(commands::scan::ScanArgs),

    /// Rule commands
    #[command(subcommand)]
    Rules(commands::rules::RulesCommands),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Scan(args) => commands::scan::run(args, &cli.format),
        Commands::Rules(cmd) => commands::rules::run(cmd),
    }
}
