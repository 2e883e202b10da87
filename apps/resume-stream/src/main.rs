mod assembly;
mod config;
mod errors;
mod extraction_client;
mod models;
mod sample;
mod session;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::assembly::completion_report;
use crate::config::Config;
use crate::extraction_client::ExtractionClient;
use crate::session::{SessionState, SessionView, StreamSession};

/// Streams a résumé through the extraction service and prints the
/// structured result as JSON.
#[derive(Debug, Parser)]
#[command(name = "resume-stream", version, about)]
struct Cli {
    /// Résumé to parse: plain text, or PDF when the extension is `.pdf`.
    /// Reads stdin when neither this nor `--sample` is given.
    #[arg(long, conflicts_with = "sample")]
    file: Option<PathBuf>,

    /// Parse the built-in sample résumé.
    #[arg(long)]
    sample: bool,

    /// Extraction endpoint; overrides EXTRACTION_URL.
    #[arg(long)]
    url: Option<String>,

    /// Print the document as compact single-line JSON.
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Initialize structured logging (stderr; stdout carries the document)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting resume-stream v{}", env!("CARGO_PKG_VERSION"));

    let text = load_input(&cli).await?;

    let url = cli.url.clone().unwrap_or(config.extraction_url.clone());
    let client = ExtractionClient::new(url, config.connect_timeout, config.max_retries)?;
    info!("Extraction client initialized (url: {})", client.url());

    let session = StreamSession::spawn(Arc::new(client));
    let mut updates = session.subscribe();
    let generation = session.start(text)?;

    let mut watch_interrupts = true;
    let settled = loop {
        tokio::select! {
            changed = updates.changed() => {
                changed.context("session worker stopped unexpectedly")?;
                let view = updates.borrow_and_update().clone();
                if view.generation != generation {
                    continue;
                }
                report_progress(&view);
                if view.state.is_terminal() {
                    break view;
                }
            }
            signal = tokio::signal::ctrl_c(), if watch_interrupts => {
                watch_interrupts = handle_interrupt(signal, &session)?;
            }
        }
    };

    match &settled.state {
        SessionState::Completed => {
            let json = if cli.compact {
                serde_json::to_string(settled.document.as_ref())?
            } else {
                serde_json::to_string_pretty(settled.document.as_ref())?
            };
            println!("{json}");
            Ok(())
        }
        SessionState::Failed(failure) => bail!("{}", failure.reason()),
        SessionState::Cancelled => bail!("Parsing cancelled"),
        other => bail!("Session ended in unexpected state '{}'", other.as_str()),
    }
}

/// Cancels on Ctrl-C. Returns whether the signal is still worth polling: a
/// listener that failed to register would otherwise fire on every loop.
fn handle_interrupt(signal: std::io::Result<()>, session: &StreamSession) -> Result<bool> {
    match signal {
        Ok(()) => {
            warn!("Interrupted, cancelling session");
            session.cancel()?;
            Ok(true)
        }
        Err(e) => {
            error!("Could not listen for Ctrl-C, interrupts are disabled: {e}");
            Ok(false)
        }
    }
}

async fn load_input(cli: &Cli) -> Result<String> {
    if cli.sample {
        return Ok(sample::SAMPLE_RESUME.to_string());
    }

    match &cli.file {
        Some(path) if is_pdf(path) => {
            let path = path.clone();
            tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text(&path)
                    .with_context(|| format!("Failed to extract text from {}", path.display()))
            })
            .await?
        }
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read resume text from stdin")?;
            Ok(text)
        }
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn report_progress(view: &SessionView) {
    let report = completion_report(&view.document);
    let missing: Vec<&str> = report.missing_sections.iter().map(|s| s.as_str()).collect();
    info!(
        state = view.state.as_str(),
        progress = view.score,
        missing = ?missing,
        "Resume update"
    );
}
