//! Gatecheck CLI - Command-line interface for engine access-rule checks.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "gatecheck")]
#[command(about = "Verify engine access rules against signed identities", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: ./gatecheck.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a token signed from the given claims
    Token {
        /// Claim as name=text, or name:=json for flags and lists
        #[arg(short, long = "claim", value_name = "CLAIM")]
        claims: Vec<String>,
    },
    /// Open an app (and optionally fetch an object layout) as one identity
    Probe {
        /// Engine websocket endpoint
        #[arg(long)]
        engine: String,
        /// App id or name to open
        #[arg(long)]
        app: String,
        /// Object whose layout to fetch
        #[arg(long)]
        object: Option<String>,
        /// Claim as name=text, or name:=json; none means anonymous
        #[arg(short, long = "claim", value_name = "CLAIM")]
        claims: Vec<String>,
    },
    /// Run the configured suites
    Run {
        /// Only run the suite with this name
        #[arg(long)]
        suite: Option<String>,
    },
}

fn main() -> Result<()> {
    // Initialize tracing subscriber
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=gatecheck_core=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Token { claims } => commands::token::run(&config, &claims),
        Commands::Probe {
            engine,
            app,
            object,
            claims,
        } => commands::probe::run(&config, &engine, &app, object.as_deref(), &claims),
        Commands::Run { suite } => commands::run::run(&config, suite.as_deref()),
    }
}
