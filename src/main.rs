//! Command-line entrypoint for procaptions.
//!
//! Each subcommand reads one request document (YAML or JSON), runs it through
//! the library and prints the response as JSON.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use procaptions::cleanup::sweep_expired;
use procaptions::config::Configuration;
use procaptions::service::CompositionService;

#[derive(Debug, Parser)]
#[command(name = "procaptions", about = "Text-behind-subject image compositing")]
struct Cli {
    /// Path to YAML config file; built-in defaults are used when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Draw one styled text layer onto a background
    AddText { request: PathBuf },
    /// Like add-text, with optional uppercasing and a trailing period
    AddDramaticText { request: PathBuf },
    /// Draw several text layers in order
    AddLayers { request: PathBuf },
    /// Place a cut-out subject over a background that already carries text
    Compose { request: PathBuf },
    /// Fit an image onto a social-media sized canvas
    Template { request: PathBuf },
    /// Rank candidate text positions on a background
    Suggest { request: PathBuf },
    /// Remove rendered outputs older than the configured retention
    Sweep,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("procaptions={level}").parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("fontdb=warn".parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Configuration> {
    let cfg = match path {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Configuration::default(),
    };
    cfg.validated().context("validating configuration")
}

fn read_request<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading request {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("parsing request {}", path.display()))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    let cfg = load_config(cli.config.as_deref())?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; cancelling");
                cancel.cancel();
            }
        });
    }

    let service = CompositionService::from_config(&cfg, cancel);
    match cli.command {
        Command::AddText { request } => {
            print_json(&service.add_text(read_request(&request)?).await?)?
        }
        Command::AddDramaticText { request } => {
            print_json(&service.add_dramatic_text(read_request(&request)?).await?)?
        }
        Command::AddLayers { request } => {
            print_json(&service.add_text_layers(read_request(&request)?).await?)?
        }
        Command::Compose { request } => {
            print_json(&service.compose_final(read_request(&request)?).await?)?
        }
        Command::Template { request } => {
            print_json(&service.fit_template(read_request(&request)?).await?)?
        }
        Command::Suggest { request } => {
            print_json(&service.suggest_positions(read_request(&request)?).await?)?
        }
        Command::Sweep => {
            let now = SystemTime::now();
            let mut removed = sweep_expired(&cfg.output_path(), cfg.retention, now);
            removed.extend(sweep_expired(&cfg.public_path(), cfg.retention, now));
            info!(count = removed.len(), "sweep finished");
            print_json(&removed)?
        }
    }
    Ok(())
}
