//! CLI binary for edgequake-ocr2md.
//!
//! A thin shim over the library crate that maps CLI flags to `JobConfig`,
//! renders the job's event stream as a progress bar and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_ocr2md::{
    event_stream, Credentials, JobConfig, JobEvent, JobEventStream, JobOutput, Orchestrator,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scanned PDF → out/book.md
  ocr2md --bucket my-scans --output-dir out book.pdf

  # Japanese vertical-text book: split spreads, drop furigana, join paragraphs
  ocr2md --bucket my-scans --split-spread --remove-ruby --normalize-line-breaks \
         --language-hint ja book.pdf

  # Left-to-right book (left half of each spread comes first)
  ocr2md --bucket my-scans --split-spread --ltr album.pdf

  # Single image (synchronous call, no bucket traffic)
  ocr2md page.png

  # Machine-readable result
  ocr2md --bucket my-scans --json scan.tiff

SUPPORTED INPUT:
  pdf, tif, tiff, gif   batch recognition through the bucket
  png, jpg, jpeg        synchronous single-image recognition

ENVIRONMENT VARIABLES:
  GOOGLE_OAUTH_ACCESS_TOKEN  OAuth2 bearer token (e.g. `gcloud auth print-access-token`)
  GOOGLE_CLOUD_QUOTA_PROJECT Project billed for Vision calls
  OCR2MD_BUCKET              Bucket for uploads and batch results
  OCR2MD_OUTPUT_DIR          Directory the Markdown file is written to
  OCR2MD_POLL_INTERVAL_MS    Delay between status polls
  RUST_LOG                   Log filter, overrides -v / -q
"#;

/// Convert scanned documents to Markdown with cloud OCR.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2md",
    version,
    about = "Convert scanned PDF/TIFF/GIF/PNG/JPEG documents to Markdown with cloud OCR",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Source document.
    input: PathBuf,

    /// Cloud Storage bucket for uploads and batch results.
    #[arg(short, long, env = "OCR2MD_BUCKET", default_value = "")]
    bucket: String,

    /// Directory the Markdown file is written to.
    #[arg(short, long, env = "OCR2MD_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// OAuth2 access token.
    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Project billed for the OCR calls (x-goog-user-project).
    #[arg(long, env = "GOOGLE_CLOUD_QUOTA_PROJECT")]
    quota_project: Option<String>,

    /// Split landscape two-page spreads into single pages (PDF only).
    #[arg(long, env = "OCR2MD_SPLIT_SPREAD")]
    split_spread: bool,

    /// With --split-spread: left half first (default is right half first).
    #[arg(long)]
    ltr: bool,

    /// Drop ruby (furigana) glyphs.
    #[arg(long, env = "OCR2MD_REMOVE_RUBY")]
    remove_ruby: bool,

    /// Join lines within a paragraph; blank line between paragraphs.
    #[arg(long, env = "OCR2MD_NORMALIZE_LINE_BREAKS")]
    normalize_line_breaks: bool,

    /// Delay between two status polls, in milliseconds.
    #[arg(long, env = "OCR2MD_POLL_INTERVAL_MS", default_value_t = 5_000)]
    poll_interval_ms: u64,

    /// Give up on the batch operation after this many seconds.
    #[arg(long, env = "OCR2MD_TIMEOUT_SECS", default_value_t = 1_800)]
    timeout_secs: u64,

    /// Result files downloaded at once.
    #[arg(long, env = "OCR2MD_DOWNLOAD_CONCURRENCY", default_value_t = 4)]
    download_concurrency: usize,

    /// Language hint for the OCR service (repeatable), e.g. ja, en.
    #[arg(long = "language-hint", value_name = "LANG")]
    language_hints: Vec<String>,

    /// Print the result as JSON instead of a summary line.
    #[arg(long, env = "OCR2MD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCR2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless -v was given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let credentials = build_credentials(&cli)?;

    let (events, stream) = event_stream(32);
    let mut job = Orchestrator::connect(config, credentials)
        .context("Failed to set up OCR clients")?
        .with_events(events);

    // ── Run ──────────────────────────────────────────────────────────────
    let bar = show_progress.then(new_bar);
    let (result, ()) = tokio::join!(job.run(&cli.input), render_events(stream, bar));
    let output = result.with_context(|| format!("OCR of {} failed", cli.input.display()))?;

    print_result(&cli, &output)
}

/// Map CLI args to `JobConfig`.
fn build_config(cli: &Cli) -> Result<JobConfig> {
    JobConfig::builder()
        .bucket(cli.bucket.clone())
        .output_dir(cli.output_dir.clone())
        .polling_interval_ms(cli.poll_interval_ms)
        .timeout_ms(cli.timeout_secs.saturating_mul(1_000))
        .download_concurrency(cli.download_concurrency)
        .language_hints(cli.language_hints.clone())
        .split_spread(cli.split_spread)
        .right_to_left(!cli.ltr)
        .remove_ruby(cli.remove_ruby)
        .normalize_line_breaks(cli.normalize_line_breaks)
        .build()
        .context("Invalid configuration")
}

fn build_credentials(cli: &Cli) -> Result<Credentials> {
    let credentials = match &cli.access_token {
        Some(token) => Credentials::bearer(token.clone()),
        None => Credentials::from_env(),
    }
    .context("No usable access token")?;

    Ok(match &cli.quota_project {
        Some(project) => credentials.with_quota_project(project.clone()),
        None => credentials,
    })
}

fn new_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}  ⏱ {elapsed_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix("Preparing");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Drain the job's events until the terminal one, updating the bar if any.
async fn render_events(mut stream: JobEventStream, bar: Option<ProgressBar>) {
    while let Some(event) = stream.next().await {
        let Some(bar) = &bar else {
            if event.is_terminal() {
                break;
            }
            continue;
        };

        match event {
            JobEvent::Progress {
                phase,
                message,
                percentage,
                ..
            } => {
                bar.set_prefix(phase.to_string());
                bar.set_message(message);
                if let Some(p) = percentage {
                    bar.set_position(p as u64);
                }
            }
            terminal => {
                bar.finish_and_clear();
                if let Some(line) = terminal_line(&terminal) {
                    eprintln!("{line}");
                }
                break;
            }
        }
    }
}

/// Line printed under the cleared bar for a terminal event. Success is left
/// to `print_result`, so a run reports it once.
fn terminal_line(event: &JobEvent) -> Option<String> {
    match event {
        JobEvent::Failed { phase, details, .. } => Some(format!(
            "{} failed during {}{}",
            red("✘"),
            phase,
            details
                .as_ref()
                .map(|d| dim(&format!(" ({d})")))
                .unwrap_or_default()
        )),
        _ => None,
    }
}

fn print_result(cli: &Cli, output: &JobOutput) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {} pages  {}ms  →  {}",
            green("✔"),
            output.page_count,
            output.processing_time_ms,
            bold(&output.output_path.display().to_string()),
        );
    }
    Ok(())
}
