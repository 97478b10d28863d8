//! CLI binary for edgequake-studyguide.
//!
//! A thin shim over the library crate that maps CLI flags to `GuideConfig`,
//! runs the generation, and writes the HTML report. Also hosts the
//! diagram recovery tools (`--repair`, `--check`).

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_studyguide::report::format_thousands;
use edgequake_studyguide::repair::{self, BlockDiagnosis};
use edgequake_studyguide::{
    generate_guide, write_report, GuideConfig, GuideProgressCallback, Phase, ProgressCallback,
    StudyGuide, UsageReport,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::error;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one spinner for the running phase plus a log line per
/// finished phase.
struct CliProgressCallback {
    bar: ProgressBar,
    phase_start: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            phase_start: Mutex::new(None),
        })
    }

    fn phase_elapsed(&self) -> String {
        let secs = self
            .phase_start
            .lock()
            .unwrap()
            .take()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        format!("{secs:.1}s")
    }
}

impl GuideProgressCallback for CliProgressCallback {
    fn on_guide_start(&self, topic: &str, total_phases: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Generating study guide for '{topic}' ({total_phases} phases)…"))
        ));
    }

    fn on_phase_start(&self, phase: Phase) {
        *self.phase_start.lock().unwrap() = Some(Instant::now());
        self.bar
            .set_prefix(format!("Phase {}/{}", phase.number(), Phase::ALL.len()));
        self.bar.set_message(phase.title());
    }

    fn on_retry(&self, phase: Phase, attempt: u32, max_attempts: u32, delay_ms: u64) {
        self.bar.println(format!(
            "  {} Phase {}  rate limited (attempt {}/{}), retrying in {:.0}s",
            yellow("⚠"),
            phase.number(),
            attempt,
            max_attempts,
            delay_ms as f64 / 1000.0
        ));
    }

    fn on_phase_complete(&self, phase: Phase, content_len: usize, grounded: bool) {
        self.bar.println(format!(
            "  {} Phase {}  {:<28} {}  {}{}",
            green("✓"),
            phase.number(),
            phase.title(),
            dim(&format!("{content_len:>6} chars")),
            dim(&self.phase_elapsed()),
            if grounded { dim("  (grounded)") } else { String::new() },
        ));
    }

    fn on_phase_error(&self, phase: Phase, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Phase {}  {:<28} {}  {}",
            red("✗"),
            phase.number(),
            phase.title(),
            red(&msg),
            dim(&self.phase_elapsed()),
        ));
    }

    fn on_guide_complete(&self, _usage: &UsageReport) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Interactive: prompts for the topic
  studyguide

  # Generate a guide into output/
  studyguide "Binary Search Trees"

  # Different provider and model
  studyguide --provider openai --model gpt-4.1-mini "Raft consensus"

  # JSON result (guide + report path) on stdout
  studyguide --json "Bloom filters" > guide.json

  # Check and repair diagrams in an existing report
  studyguide --check output/bloom_filters_study_guide.html
  studyguide --repair output/bloom_filters_study_guide.html

PRICING (defaults, gemini-2.5-flash):
  $0.15 per 1M input tokens, $0.60 per 1M output tokens.
  Override with --input-price / --output-price for other models.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  STUDYGUIDE_*            Any flag below, e.g. STUDYGUIDE_OUTPUT_DIR
  RUST_LOG                Log filter (overrides -v / -q)
"#;

/// Generate HTML study guides for any topic using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "studyguide",
    version,
    about = "Generate HTML study guides for any topic using LLMs",
    long_about = "Generate a three-part study guide (plan, material, interview Q&A) for a topic \
and write it as a single HTML report with rendered diagrams and math. Supports Google Gemini, \
OpenAI, Anthropic, and any provider edgequake-llm can auto-detect.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Topic to study. Prompted for interactively when omitted.
    topic: Option<String>,

    /// Directory for the generated report.
    #[arg(short, long, env = "STUDYGUIDE_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// LLM model ID (default: gemini-2.5-flash).
    #[arg(long, env = "STUDYGUIDE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(
        long,
        env = "STUDYGUIDE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: gemini, openai, anthropic, azure, ollama."
    )]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "STUDYGUIDE_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Max LLM output tokens per phase.
    #[arg(long, env = "STUDYGUIDE_MAX_TOKENS", default_value_t = 32768)]
    max_tokens: usize,

    /// Retries per phase on rate limiting.
    #[arg(long, env = "STUDYGUIDE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Initial backoff after a rate limit, in milliseconds.
    #[arg(long, env = "STUDYGUIDE_RETRY_BACKOFF_MS", default_value_t = 15_000)]
    retry_backoff_ms: u64,

    /// Upper bound for a single backoff, in milliseconds.
    #[arg(long, env = "STUDYGUIDE_MAX_BACKOFF_MS", default_value_t = 120_000)]
    max_backoff_ms: u64,

    /// Pause between the material and interview phases, in milliseconds.
    #[arg(long, env = "STUDYGUIDE_PHASE_PAUSE_MS", default_value_t = 5_000)]
    phase_pause_ms: u64,

    /// USD per 1M input tokens, for the cost estimate.
    #[arg(long, env = "STUDYGUIDE_INPUT_PRICE")]
    input_price: Option<f64>,

    /// USD per 1M output tokens, for the cost estimate.
    #[arg(long, env = "STUDYGUIDE_OUTPUT_PRICE")]
    output_price: Option<f64>,

    /// Print the guide and report path as JSON on stdout.
    #[arg(long, env = "STUDYGUIDE_JSON")]
    json: bool,

    /// Disable progress spinner.
    #[arg(long, env = "STUDYGUIDE_NO_PROGRESS")]
    no_progress: bool,

    /// Repair the diagrams of an existing report instead of generating.
    #[arg(long, value_name = "FILE", conflicts_with = "check")]
    repair: Option<PathBuf>,

    /// Where --repair writes (default: <stem>_fixed.html next to FILE).
    #[arg(long, value_name = "FILE", requires = "repair")]
    repair_output: Option<PathBuf>,

    /// List suspicious diagrams in an existing report.
    #[arg(long, value_name = "FILE")]
    check: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "STUDYGUIDE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "STUDYGUIDE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs would fight with the spinner; it carries the feedback.
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

    if let Err(e) = run(cli, show_progress).await {
        error!("{e:?}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, show_progress: bool) -> Result<()> {
    if let Some(ref path) = cli.check {
        return check_report(path, cli.json).await;
    }
    if let Some(ref path) = cli.repair {
        return repair_report(path, cli.repair_output.as_deref(), cli.json, cli.quiet).await;
    }

    let topic = match cli.topic.clone() {
        Some(t) => t,
        None => prompt_topic().context("Failed to read topic from stdin")?,
    };

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn GuideProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let guide = generate_guide(&topic, &config)
        .await
        .context("Study guide generation failed")?;
    let path = write_report(&guide, &config)
        .await
        .context("Failed to write report")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "guide": guide,
            "report": path,
        }))
        .context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&guide, &path);
    }

    Ok(())
}

fn prompt_topic() -> Result<String> {
    eprint!("{} ", bold("Enter a topic to study:"));
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Map CLI args to `GuideConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GuideConfig> {
    let mut builder = GuideConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .max_backoff_ms(cli.max_backoff_ms)
        .phase_pause_ms(cli.phase_pause_ms)
        .output_dir(cli.output_dir.clone());

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if cli.input_price.is_some() || cli.output_price.is_some() {
        let mut pricing = edgequake_studyguide::Pricing::default();
        if let Some(p) = cli.input_price {
            pricing.input_per_million = p;
        }
        if let Some(p) = cli.output_price {
            pricing.output_per_million = p;
        }
        builder = builder.pricing(pricing);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(guide: &StudyGuide, path: &Path) {
    let failed = guide.failed_phases();
    let mark = if failed.is_empty() {
        green("✔")
    } else if failed.len() == Phase::ALL.len() {
        red("✘")
    } else {
        yellow("⚠")
    };
    eprintln!(
        "{}  {}/{} phases  →  {}",
        mark,
        Phase::ALL.len() - failed.len(),
        Phase::ALL.len(),
        bold(&path.display().to_string()),
    );

    let u = &guide.usage;
    eprintln!("   Token usage:");
    eprintln!("     Input:       {}", dim(&format_thousands(u.prompt_tokens)));
    eprintln!("     Output:      {}", dim(&format_thousands(u.candidates_tokens)));
    eprintln!("     Total:       {}", dim(&format_thousands(u.total_tokens)));
    eprintln!("   Estimated cost:");
    eprintln!("     Input Cost:  ${:.6}", u.input_cost);
    eprintln!("     Output Cost: ${:.6}", u.output_cost);
    eprintln!("     Total Cost:  {}", bold(&format!("${:.6}", u.total_cost)));
}

// ── Diagram recovery ─────────────────────────────────────────────────────────

async fn check_report(path: &Path, json: bool) -> Result<()> {
    let html = repair::read_report(path).await?;
    let found = repair::diagnose(&html);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&found).context("Failed to serialise diagnosis")?
        );
        return Ok(());
    }

    print_diagnosis(path, &found);
    Ok(())
}

fn print_diagnosis(path: &Path, found: &[BlockDiagnosis]) {
    let bad: Vec<&BlockDiagnosis> = found.iter().filter(|d| !d.is_ok()).collect();
    println!("{}", bold(&path.display().to_string()));
    println!("Total blocks: {}", found.len());
    println!("Errors found: {}", bad.len());

    for d in bad {
        println!("\n--- Block {} ---", d.index);
        for issue in &d.issues {
            println!("  {} {}", red("*"), issue);
        }
        println!("Preview: {}…", dim(&d.preview));
    }
}

async fn repair_report(input: &Path, output: Option<&Path>, json: bool, quiet: bool) -> Result<()> {
    let (out_path, outcome) = repair::repair_file(input, output)
        .await
        .context("Diagram repair failed")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "output": out_path,
                "blocks": outcome.blocks,
            }))
            .context("Failed to serialise repair result")?
        );
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    eprintln!(
        "{}  {} diagrams repaired ({} replaced)  →  {}",
        green("✔"),
        outcome.blocks.len(),
        outcome.replaced_count(),
        bold(&out_path.display().to_string()),
    );

    let remaining = repair::diagnose(&outcome.html);
    let bad = remaining.iter().filter(|d| !d.is_ok()).count();
    if bad == 0 {
        eprintln!("   All blocks pass the diagram checks.");
    } else {
        print_diagnosis(&out_path, &remaining);
    }
    Ok(())
}
