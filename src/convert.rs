//! Study-guide generation entry points.
//!
//! [`generate_guide`] runs the three phases against the configured
//! `edgequake-llm` provider; [`generate_guide_with`] accepts any
//! [`TextGenerator`], which is how the tests drive the orchestrator without
//! network access. [`write_report`] turns a finished guide into the HTML file.

use crate::config::GuideConfig;
use crate::error::StudyGuideError;
use crate::output::{Generation, Phase, StudyGuide, TokenUsage, UsageReport};
use crate::pipeline::llm::{generate_with_retry, GenerationRequest, LlmGenerator, TextGenerator};
use crate::prompts;
use crate::report::{render_report, report_filename};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Generate a study guide for `topic`.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(StudyGuide)` whenever the topic is valid, even if phases failed
/// (failed phases carry an error payload; see [`StudyGuide::failed_phases`]).
///
/// # Errors
/// [`StudyGuideError::EmptyTopic`] for an empty or whitespace-only topic.
/// No provider call is made in that case.
pub async fn generate_guide(
    topic: impl AsRef<str>,
    config: &GuideConfig,
) -> Result<StudyGuide, StudyGuideError> {
    let topic = validate_topic(topic.as_ref())?;
    let generator = LlmGenerator::from_config(config);
    run_phases(&generator, topic, config).await
}

/// Generate a study guide using a caller-supplied generator.
pub async fn generate_guide_with<G: TextGenerator>(
    generator: &G,
    topic: impl AsRef<str>,
    config: &GuideConfig,
) -> Result<StudyGuide, StudyGuideError> {
    let topic = validate_topic(topic.as_ref())?;
    run_phases(generator, topic, config).await
}

fn validate_topic(topic: &str) -> Result<&str, StudyGuideError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(StudyGuideError::EmptyTopic);
    }
    Ok(topic)
}

async fn run_phases<G: TextGenerator>(
    generator: &G,
    topic: &str,
    config: &GuideConfig,
) -> Result<StudyGuide, StudyGuideError> {
    let total_start = Instant::now();
    info!("Starting study guide: {}", topic);

    if let Some(ref cb) = config.progress_callback {
        cb.on_guide_start(topic, Phase::ALL.len());
    }

    // ── Phase 1: research & plan ─────────────────────────────────────────
    let plan_request = GenerationRequest {
        prompt: prompts::plan_prompt(topic),
        use_search: true,
    };
    let plan = run_phase(generator, Phase::Plan, &plan_request, config).await;

    // ── Phase 2: study material ──────────────────────────────────────────
    let material_request = GenerationRequest {
        prompt: prompts::material_prompt(topic, &plan.content),
        use_search: false,
    };
    let material = run_phase(generator, Phase::Material, &material_request, config).await;

    if config.phase_pause_ms > 0 {
        debug!("Pausing {}ms before the next phase", config.phase_pause_ms);
        sleep(Duration::from_millis(config.phase_pause_ms)).await;
    }

    // ── Phase 3: interview Q&A ───────────────────────────────────────────
    let interview_request = GenerationRequest {
        prompt: prompts::interview_prompt(topic, &plan.content),
        use_search: false,
    };
    let interview = run_phase(generator, Phase::Interview, &interview_request, config).await;

    let mut total = TokenUsage::default();
    for generation in [&plan, &material, &interview] {
        total += generation.usage;
    }
    let usage = UsageReport::from_usage(total, &config.pricing);

    info!(
        "Study guide finished: {} tokens (${:.6}) in {:?}",
        usage.total_tokens,
        usage.total_cost,
        total_start.elapsed()
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_guide_complete(&usage);
    }

    Ok(StudyGuide {
        topic: topic.to_string(),
        plan,
        material,
        interview,
        usage,
    })
}

async fn run_phase<G: TextGenerator>(
    generator: &G,
    phase: Phase,
    request: &GenerationRequest,
    config: &GuideConfig,
) -> Generation {
    info!("--- Phase {}: {} ---", phase.number(), phase.title());
    if let Some(ref cb) = config.progress_callback {
        cb.on_phase_start(phase);
    }

    let generation = generate_with_retry(generator, phase, request, config).await;

    match generation.error {
        None => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_phase_complete(phase, generation.content.len(), generation.grounded);
            }
        }
        Some(ref e) => {
            warn!("Phase {} failed: {}", phase, e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_phase_error(phase, &e.to_string());
            }
        }
    }
    generation
}

/// Render `guide` and write it to `<output_dir>/<slug>_study_guide.html`.
///
/// Uses atomic write (temp file + rename), replacing any previous report
/// for the same topic.
pub async fn write_report(guide: &StudyGuide, config: &GuideConfig) -> Result<PathBuf, StudyGuideError> {
    let path = config.output_dir.join(report_filename(&guide.topic));
    let html = render_report(guide);
    write_atomic(&path, &html).await?;
    info!("Report written to {}", path.display());
    Ok(path)
}

/// Write `contents` to `path` through a sibling temp file.
pub(crate) async fn write_atomic(path: &Path, contents: &str) -> Result<(), StudyGuideError> {
    let write_err = |e: std::io::Error| StudyGuideError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("html.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::pipeline::llm::GeneratedText;
    use std::sync::Mutex;

    /// Records prompts and answers each with a fixed reply.
    struct Echo {
        prompts: Mutex<Vec<(String, bool)>>,
    }

    impl TextGenerator for Echo {
        async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedText, GenerationError> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push((request.prompt.clone(), request.use_search));
            Ok(GeneratedText {
                text: format!("## Reply {}", prompts.len()),
                usage: TokenUsage {
                    prompt_tokens: 1_000_000,
                    candidates_tokens: 1_000_000,
                    total_tokens: 2_000_000,
                },
                grounded: false,
            })
        }
    }

    fn config() -> GuideConfig {
        GuideConfig::builder()
            .retry_backoff_ms(0)
            .max_backoff_ms(0)
            .phase_pause_ms(0)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn empty_topic_rejected_before_any_call() {
        let g = Echo {
            prompts: Mutex::new(Vec::new()),
        };
        let err = generate_guide_with(&g, "  \t\n", &config()).await.unwrap_err();
        assert!(matches!(err, StudyGuideError::EmptyTopic));
        assert!(g.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn phases_run_in_order_with_plan_forwarded() {
        let g = Echo {
            prompts: Mutex::new(Vec::new()),
        };
        let guide = generate_guide_with(&g, "  Graph Theory ", &config()).await.unwrap();
        assert_eq!(guide.topic, "Graph Theory");
        assert_eq!(guide.plan.content, "## Reply 1");
        assert_eq!(guide.material.content, "## Reply 2");
        assert_eq!(guide.interview.content, "## Reply 3");

        let prompts = g.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].1, "plan phase requests search");
        assert!(!prompts[1].1 && !prompts[2].1);
        assert!(prompts[1].0.contains("## Reply 1"));
        assert!(prompts[2].0.contains("## Reply 1"));
    }

    #[tokio::test]
    async fn usage_is_summed_and_priced() {
        let g = Echo {
            prompts: Mutex::new(Vec::new()),
        };
        let guide = generate_guide_with(&g, "Sorting", &config()).await.unwrap();
        assert_eq!(guide.usage.prompt_tokens, 3_000_000);
        assert_eq!(guide.usage.candidates_tokens, 3_000_000);
        assert_eq!(guide.usage.total_tokens, 6_000_000);
        assert!((guide.usage.input_cost - 0.45).abs() < 1e-9);
        assert!((guide.usage.output_cost - 1.80).abs() < 1e-9);
        assert!((guide.usage.total_cost - 2.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn write_report_replaces_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = GuideConfig::builder()
            .phase_pause_ms(0)
            .output_dir(dir.path().join("nested"))
            .build()
            .unwrap();
        let g = Echo {
            prompts: Mutex::new(Vec::new()),
        };
        let guide = generate_guide_with(&g, "Hash Maps", &config).await.unwrap();

        let path = write_report(&guide, &config).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "hash_maps_study_guide.html");
        let path2 = write_report(&guide, &config).await.unwrap();
        assert_eq!(path, path2);

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("<h2>Reply 1</h2>"));
        assert!(html.contains("Study Guide: Hash Maps"));
        assert!(!path.with_extension("html.tmp").exists());
    }
}
