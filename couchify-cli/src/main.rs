//! # couchify CLI
//!
//! Bundles a directory of CommonJS design functions into a CouchDB design
//! document and uploads it, or prints it with `--dry`.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "couchify")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the design functions
    dir: Option<PathBuf>,

    /// Design document name [default: default]
    #[arg(short, long)]
    name: Option<String>,

    /// Database name
    #[arg(short, long, default_value = "default")]
    db: String,

    /// CouchDB endpoint
    #[arg(short, long, default_value = "localhost:5984")]
    remote: String,

    /// CouchDB username
    #[arg(short, long, env = "COUCHIFY_USER", requires = "pass")]
    user: Option<String>,

    /// CouchDB password
    #[arg(short, long, env = "COUCHIFY_PASS", hide_env_values = true, requires = "user")]
    pass: Option<String>,

    /// Print the design document instead of deploying it
    #[arg(short = 'y', long)]
    dry: bool,

    /// Path to configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the document or the server response
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("could not initialize logging: {}", err);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = commands::load_config(cli.config.as_deref(), cli.dir.as_deref(), cli.name)?;
    let doc = commands::bundle(config).await?;

    if cli.dry {
        commands::print_document(&doc)?;
        return Ok(ExitCode::SUCCESS);
    }

    commands::deploy(&cli.remote, &cli.db, cli.user.zip(cli.pass), &doc).await
}
