//! CLI binary for paper-notes.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `IngestConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use paper_notes::{
    build_store, IngestConfig, IngestProgressCallback, IngestRequest, IngestStage, Pipeline,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that names the running stage and logs one line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Ingesting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: IngestStage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_stage_complete(&self, stage: IngestStage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<11} {}",
            green("✓"),
            stage,
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_failed(&self, stage: IngestStage, error: &str) {
        self.bar.println(format!("  {} {:<11} {}", red("✗"), stage, red(error)));
        self.bar.finish_and_clear();
    }

    fn on_done(&self, note_count: usize, segment_count: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} notes from {} segments",
            green("✔"),
            bold(&note_count.to_string()),
            segment_count
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ingest a paper, dropping the cover page and the references
  paper-notes ingest https://arxiv.org/pdf/1706.03762.pdf --name "Attention" --delete-pages 1,12,13

  # Print the stored record as JSON
  paper-notes ingest https://example.org/paper.pdf --name "Paper" --json

  # Query the embeddings table
  paper-notes search "scaled dot-product attention" -k 3

ENVIRONMENT VARIABLES:
  UNSTRUCTURED_API_KEY    Document partition API key
  OPENAI_API_KEY          Model and embeddings API key
  SUPABASE_URL            Supabase project URL
  SUPABASE_PRIVATE_KEY    Supabase service key
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
"#;

/// Turn research paper PDFs into stored notes and searchable embeddings.
#[derive(Parser, Debug)]
#[command(
    name = "paper-notes",
    version,
    about = "Ingest research paper PDFs into notes and a vector store",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    creds: Credentials,

    /// Model used for note generation.
    #[arg(long, global = true, env = "PAPER_NOTES_MODEL", default_value = "gpt-4.1")]
    model: String,

    /// Max model output tokens.
    #[arg(long, global = true, env = "PAPER_NOTES_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, default_value_t = 120)]
    download_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PAPER_NOTES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PAPER_NOTES_QUIET")]
    quiet: bool,
}

#[derive(Args, Debug)]
struct Credentials {
    /// Document partition API key.
    #[arg(long, global = true, env = "UNSTRUCTURED_API_KEY", hide_env_values = true)]
    extraction_api_key: Option<String>,

    /// Model and embeddings API key.
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    model_api_key: Option<String>,

    /// Supabase project URL.
    #[arg(long, global = true, env = "SUPABASE_URL")]
    storage_url: Option<String>,

    /// Supabase service key.
    #[arg(long, global = true, env = "SUPABASE_PRIVATE_KEY", hide_env_values = true)]
    storage_key: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, prune, extract, annotate and store one paper.
    Ingest {
        /// URL of the paper; must end in `.pdf`.
        url: String,

        /// Display name stored with the paper.
        #[arg(long)]
        name: String,

        /// 1-based pages to drop, comma separated (e.g. 1,3).
        #[arg(long, value_delimiter = ',')]
        delete_pages: Vec<usize>,

        /// Print the stored record and stats as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Similarity search over stored segments.
    Search {
        query: String,

        /// Number of matches to return.
        #[arg(short, default_value_t = 5)]
        k: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let json = matches!(cli.command, Command::Ingest { json: true, .. });
    let show_progress = !cli.quiet && !json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli);

    match cli.command {
        Command::Ingest {
            url,
            name,
            delete_pages,
            json,
        } => {
            let mut pipeline = Pipeline::from_config(&config).context("Invalid configuration")?;
            if show_progress {
                pipeline = pipeline.with_progress(CliProgressCallback::new());
            }
            let request = IngestRequest::new(url, name).delete_pages(delete_pages);
            let output = pipeline.ingest(&request).await.context("Ingestion failed")?;

            if json {
                let json =
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
                println!("{json}");
            } else if !cli.quiet {
                for note in &output.record.notes {
                    let pages: Vec<String> =
                        note.page_numbers.iter().map(|p| p.to_string()).collect();
                    println!("- {} {}", note.note, dim(&format!("(p. {})", pages.join(", "))));
                }
                eprintln!(
                    "   {} pages removed  /  {} segments  /  {}ms total",
                    output.stats.pages_removed,
                    output.stats.segment_count,
                    output.stats.total_duration_ms,
                );
            }
        }
        Command::Search { query, k } => {
            if k == 0 {
                bail!("-k must be at least 1");
            }
            let store = build_store(&config).context("Invalid configuration")?;
            let hits = store
                .vectors()
                .similarity_search(&query, k)
                .await
                .context("Search failed")?;
            for hit in hits {
                println!("{}  {}", bold(&format!("{:.3}", hit.similarity)), hit.content);
            }
        }
    }

    Ok(())
}

/// Map CLI args to `IngestConfig`.
///
/// Not validated here: `ingest` needs every credential while `search` only
/// needs storage and embeddings, so each command checks what it uses.
fn build_config(cli: &Cli) -> IngestConfig {
    IngestConfig {
        extraction_api_key: cli.creds.extraction_api_key.clone(),
        model_api_key: cli.creds.model_api_key.clone(),
        storage_url: cli.creds.storage_url.clone(),
        storage_key: cli.creds.storage_key.clone(),
        model: cli.model.clone(),
        max_tokens: cli.max_tokens,
        download_timeout_secs: cli.download_timeout,
        ..IngestConfig::default()
    }
}
