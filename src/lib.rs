//! # edgequake-studyguide
//!
//! Generate a self-contained HTML study guide for any topic with an LLM.
//!
//! A run makes three sequential calls: a research-backed study plan, the
//! study material built on that plan, and an interview Q&A section. Each
//! Markdown answer is converted to HTML with its fenced code, mermaid
//! diagrams and LaTeX preserved for client-side rendering, then embedded in
//! a single report file together with token usage and estimated cost.
//!
//! ## Pipeline Overview
//!
//! ```text
//! topic
//!  │
//!  ├─ 1. Plan       research & plan prompt (search grounding requested)
//!  ├─ 2. Material   full study material from the plan
//!  ├─ 3. Interview  interview Q&A from the plan
//!  ├─ 4. Convert    segment → render → restore → sanitize, per section
//!  └─ 5. Report     template fill + atomic write to output/
//! ```
//!
//! Rate-limited calls are retried with capped exponential backoff. Any
//! other failure is embedded in the report as an error section rather than
//! aborting the run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_studyguide::{generate_guide, write_report, GuideConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected; GEMINI_API_KEY selects gemini-2.5-flash.
//!     let config = GuideConfig::default();
//!     let guide = generate_guide("Binary Search Trees", &config).await?;
//!     let path = write_report(&guide, &config).await?;
//!     eprintln!("{} tokens, ${:.6} -> {}",
//!         guide.usage.total_tokens,
//!         guide.usage.total_cost,
//!         path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `studyguide` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-studyguide = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod repair;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GuideConfig, GuideConfigBuilder, Pricing, DEFAULT_MODEL, DEFAULT_PROVIDER};
pub use convert::{generate_guide, generate_guide_with, write_report};
pub use error::{GenerationError, StudyGuideError};
pub use output::{Generation, Phase, StudyGuide, TokenUsage, UsageReport};
pub use pipeline::llm::{GeneratedText, GenerationRequest, LlmGenerator, TextGenerator};
pub use pipeline::markdown_to_html;
pub use progress::{GuideProgressCallback, NoopProgressCallback, ProgressCallback};
pub use repair::{diagnose, repair_file, repair_html, BlockDiagnosis, RepairOutcome};
pub use report::{render_report, report_filename};
