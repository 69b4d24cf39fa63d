use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use paper_catcher::pipeline::output::write_papers_json;
use paper_catcher::{Aggregator, Settings, Translator, VERSION};

#[derive(Debug, Parser)]
#[command(name = "paper-catcher", version, about = "Collect, deduplicate and translate academic paper metadata")]
struct Cli {
    /// Maximum number of papers to request from each source
    #[arg(long, default_value_t = 10)]
    max_results: usize,

    /// Path of the JSON file to write
    #[arg(long, default_value = "papers.json")]
    output: PathBuf,

    /// Skip translation even when a Gemini API key is configured
    #[arg(long)]
    no_translate: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("paper_catcher={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = Settings::from_env();
    if cli.no_translate {
        settings.gemini_api_key = None;
    }

    tracing::info!(
        version = VERSION,
        keywords = %settings.keywords_query(),
        "paper catcher starting"
    );

    let aggregator = Aggregator::from_settings(&settings).context("failed to build pipeline")?;
    tracing::info!(sources = ?aggregator.source_names(), "configured sources");

    let papers = aggregator.collect(cli.max_results).await;
    if papers.is_empty() {
        tracing::warn!("no papers collected, nothing to write");
        return Ok(());
    }

    let translator = Translator::new(&settings).context("failed to build translator")?;
    let papers = translator.translate_all(papers).await;

    write_papers_json(&cli.output, &papers)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;

    tracing::info!(count = papers.len(), "paper catcher finished");
    Ok(())
}
