//! es-reindex CLI
//!
//! Copies an Elasticsearch index, settings and mappings included, to another
//! index or cluster.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use clap::error::ErrorKind;
use clap::Parser;
use console::{Style, Term};
use dialoguer::Input;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use es_reindex::config::DEFAULT_URL;
use es_reindex::{Endpoint, HttpTransport, Pipeline, ReindexConfig};

#[derive(Parser)]
#[command(name = "es-reindex")]
#[command(version)]
#[command(about = "Copy an Elasticsearch index to another index or cluster", long_about = None)]
struct Cli {
    /// Source index as [url/]index
    #[arg(required_unless_present = "config")]
    source: Option<String>,

    /// Destination index as [url/]index
    #[arg(required_unless_present = "config")]
    destination: Option<String>,

    /// Remove the destination index first
    #[arg(short, long)]
    remove: bool,

    /// Update existing documents (default: only create missing ones)
    #[arg(short, long)]
    update: bool,

    /// Documents fetched per scroll page
    #[arg(short, long, value_name = "N")]
    frame: Option<usize>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Base URL for a source given without one
    #[arg(long, env = "ES_REINDEX_SOURCE_URL", default_value = DEFAULT_URL)]
    source_url: String,

    /// Base URL for a destination given without one
    #[arg(long, env = "ES_REINDEX_DEST_URL", default_value = DEFAULT_URL)]
    dest_url: String,
}

impl Cli {
    /// Builds the run configuration; flags override the file.
    fn into_config(self) -> anyhow::Result<ReindexConfig> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                ReindexConfig::from_file(path)?
            }
            None => ReindexConfig::new(
                Endpoint::new(DEFAULT_URL, ""),
                Endpoint::new(DEFAULT_URL, ""),
            ),
        };

        if let Some(source) = &self.source {
            config.source = Endpoint::parse(source, &self.source_url)?;
        }
        if let Some(destination) = &self.destination {
            config.destination = Endpoint::parse(destination, &self.dest_url)?;
        }
        if let Some(frame) = self.frame {
            config.options.frame_size = frame;
        }
        config.options.remove_destination |= self.remove;
        config.options.update_existing |= self.update;

        config.validate()?;
        Ok(config)
    }
}

fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    }
}

const CONFIRM_PROMPT: &str = "  Confirm or hit Ctrl-c to abort...";

fn confirm(plan: &str) -> anyhow::Result<()> {
    println!("{plan}");
    if Term::stderr().is_term() {
        Input::<String>::new()
            .with_prompt(CONFIRM_PROMPT)
            .allow_empty(true)
            .interact_text()?;
    } else {
        // Piped or redirected: any line, or EOF, proceeds.
        print!("{CONFIRM_PROMPT}");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        println!();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = parse_args();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let yes = cli.yes;
    let config = cli.into_config()?;

    if yes {
        println!("{}", config.describe_plan());
    } else {
        confirm(&config.describe_plan())?;
    }

    let transport = HttpTransport::new(config.options.request_timeout())?;
    let pipeline = Pipeline::new(config, transport);
    let stats = pipeline.run().await?;

    let verdict = if stats.verification.is_equal() {
        Style::new().green()
    } else {
        Style::new().red().bold()
    };
    println!(
        "Checking document count... {}",
        verdict.apply_to(stats.verification)
    );

    Ok(())
}
