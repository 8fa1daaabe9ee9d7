use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

use tmj_core::{ProgressEvent, Section};
use tmj_parsing::{ExtractorConfigBuilder, ProcessOutcome, SectionExtractor};
use tmj_pdf_mupdf::MupdfBackend;

mod output;

use output::Report;

/// Trade Marks Journal number extractor
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract application numbers from one or more journal PDFs
    Extract {
        /// Journal PDFs to process
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write JSON to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Comma-separated sections to report (default: all)
        #[arg(long, value_delimiter = ',')]
        sections: Vec<Section>,

        /// Shortest digit run treated as a number
        #[arg(long)]
        min_digits: Option<usize>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let log_filter = init_tracing();

    let config = tmj_core::config_file::load_config();
    if let (Some(handle), Some(level)) = (
        log_filter,
        config.logging.as_ref().and_then(|l| l.level.as_deref()),
    ) {
        handle.reload(EnvFilter::new(level))?;
    }

    let cli = Cli::parse();

    match cli.command {
        Command::Extract {
            files,
            output,
            sections,
            min_digits,
            pretty,
        } => {
            let mut builder =
                ExtractorConfigBuilder::from_config_file(&config.extraction.unwrap_or_default());
            if let Some(n) = min_digits {
                builder = builder.min_digits(n);
            }
            let extractor = SectionExtractor::with_config(&builder.build()?)?;
            extract(files, output, &sections, pretty, extractor).await
        }
    }
}

/// Logs go to stderr, at `warn` unless `RUST_LOG` or `logging.level` say
/// otherwise. The subscriber is up before the config is read.
fn init_tracing() -> Option<reload::Handle<EnvFilter, Registry>> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => {
            let stderr = fmt::layer().with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
        Err(_) => {
            let (filter, handle) = reload::Layer::new(EnvFilter::new("warn"));
            let stderr = fmt::layer().with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(stderr).init();
            Some(handle)
        }
    }
}

async fn extract(
    files: Vec<PathBuf>,
    output: Option<PathBuf>,
    sections: &[Section],
    pretty: bool,
    extractor: SectionExtractor,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let style = ProgressStyle::with_template(
        "{spinner:.green} {prefix} {msg:<13} [{bar:40.green/dim}] {percent}% (eta {eta})",
    )?
    .progress_chars("=> ");

    let mut report = Report::new(sections);

    for path in files {
        let bar = ProgressBar::new(100);
        bar.set_style(style.clone());
        bar.set_prefix(path.display().to_string());
        bar.enable_steady_tick(Duration::from_millis(120));

        let outcome = {
            let path = path.clone();
            let extractor = extractor.clone();
            let cancel = cancel.clone();
            let bar = bar.clone();
            tokio::task::spawn_blocking(move || {
                let on_progress = |event: ProgressEvent| {
                    if let ProgressEvent::SectionStarted { section } = event {
                        bar.set_message(section.as_str());
                    }
                    if let Some(percent) = event.percent() {
                        bar.set_position(percent.round() as u64);
                    }
                };
                tmj_parsing::process_document(&path, &MupdfBackend, &extractor, on_progress, &cancel)
            })
            .await?
        };

        match outcome.with_context(|| format!("Error processing PDF {}", path.display()))? {
            ProcessOutcome::Completed(numbers) => {
                bar.finish_with_message(format!("{} numbers", numbers.total()));
                report.push(path.display().to_string(), numbers);
            }
            ProcessOutcome::Cancelled => {
                bar.abandon_with_message("cancelled");
                anyhow::bail!("Processing cancelled by user");
            }
        }
    }

    let json = report.render(pretty)?;
    match output {
        Some(out) => {
            std::fs::write(&out, json + "\n")
                .with_context(|| format!("Failed to write {}", out.display()))?;
            tracing::info!(path = %out.display(), "results written");
        }
        None => println!("{json}"),
    }

    Ok(())
}
