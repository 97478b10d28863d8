//! Text generation: call the provider and drive the retry loop.
//!
//! The provider sits behind the [`TextGenerator`] trait so the orchestrator
//! can be exercised with a scripted generator; [`LlmGenerator`] is the real
//! implementation on top of `edgequake-llm`.
//!
//! ## Retry Strategy
//!
//! Only rate-limit responses (HTTP 429 / `RESOURCE_EXHAUSTED`) are retried.
//! The wait is `retry_backoff_ms * 2^attempt`, capped at `max_backoff_ms`:
//! with the defaults 15 s → 30 s → 60 s over four attempts. Every other
//! failure becomes an inline error payload at once, so a phase always yields
//! a [`Generation`] and never an `Err`.

use crate::config::{GuideConfig, DEFAULT_MODEL, DEFAULT_PROVIDER};
use crate::error::{GenerationError, StudyGuideError};
use crate::output::{Generation, Phase, TokenUsage};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// One prompt to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Ask the provider to ground the answer with a live search tool.
    pub use_search: bool,
}

/// A successful provider answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedText {
    pub text: String,
    pub usage: TokenUsage,
    /// The provider reported search grounding metadata.
    pub grounded: bool,
}

/// Anything that turns a prompt into text.
pub trait TextGenerator: Send + Sync {
    /// Make exactly one attempt. Retrying is the caller's job.
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<GeneratedText, GenerationError>> + Send;
}

// ── edgequake-llm backend ────────────────────────────────────────────────────

/// Response metadata keys that carry search grounding details.
const GROUNDING_METADATA_KEYS: [&str; 2] = ["grounding_metadata", "groundingMetadata"];

/// [`TextGenerator`] backed by an `edgequake-llm` provider.
///
/// Construction never fails. When no provider can be resolved the problem is
/// logged once and every call returns [`GenerationError::MissingCredentials`],
/// so the report still renders with inline error sections.
pub struct LlmGenerator {
    provider: Option<Arc<dyn LLMProvider>>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmGenerator {
    pub fn from_config(config: &GuideConfig) -> Self {
        let provider = match resolve_provider(config) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Whether a provider was resolved.
    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }
}

impl TextGenerator for LlmGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedText, GenerationError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(GenerationError::MissingCredentials)?;

        if request.use_search {
            debug!("Search grounding requested; provider decides whether to honour it");
        }

        let messages = vec![ChatMessage::user(request.prompt.as_str())];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_error(&e.to_string()))?;

        let prompt_tokens = response.prompt_tokens as u64;
        let candidates_tokens = response.completion_tokens as u64;
        let grounded = has_grounding(&response.metadata);
        Ok(GeneratedText {
            text: response.content,
            usage: TokenUsage {
                prompt_tokens,
                candidates_tokens,
                total_tokens: prompt_tokens + candidates_tokens,
            },
            grounded,
        })
    }
}

fn has_grounding(metadata: &HashMap<String, serde_json::Value>) -> bool {
    GROUNDING_METADATA_KEYS
        .iter()
        .any(|k| metadata.get(*k).is_some_and(|v| !v.is_null()))
}

/// Map a provider error message onto the retry taxonomy.
pub fn classify_error(message: &str) -> GenerationError {
    let lower = message.to_lowercase();
    if message.contains("429")
        || message.contains("RESOURCE_EXHAUSTED")
        || lower.contains("rate limit")
    {
        GenerationError::RateLimited {
            detail: message.to_string(),
        }
    } else {
        GenerationError::Api {
            detail: message.to_string(),
        }
    }
}

const MOCK_PROVIDER: &str = "mock";

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model` or
///    [`DEFAULT_MODEL`].
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **Gemini key present** (`GEMINI_API_KEY`) selects the default provider.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`). Its mock
///    fallback counts as "not configured" unless `EDGEQUAKE_LLM_PROVIDER`
///    asked for it.
fn resolve_provider(config: &GuideConfig) -> Result<Arc<dyn LLMProvider>, StudyGuideError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider(DEFAULT_PROVIDER, model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| StudyGuideError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY (or OPENAI_API_KEY, ANTHROPIC_API_KEY).\n\
                Error: {}",
                e
            ),
        })?;

    let mock_requested = std::env::var("EDGEQUAKE_LLM_PROVIDER")
        .is_ok_and(|p| p.eq_ignore_ascii_case(MOCK_PROVIDER));
    if llm_provider.name() == MOCK_PROVIDER && !mock_requested {
        return Err(StudyGuideError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: "No API key found in environment.\n\
                Set GEMINI_API_KEY (or OPENAI_API_KEY, ANTHROPIC_API_KEY)."
                .to_string(),
        });
    }

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, StudyGuideError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        StudyGuideError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

// ── Retry loop ───────────────────────────────────────────────────────────────

/// What one attempt means for the loop.
enum AttemptOutcome {
    Success(GeneratedText),
    Retry(GenerationError),
    GiveUp(GenerationError),
}

/// Run `request` for `phase`, retrying rate limits with capped exponential
/// backoff. Always returns a [`Generation`] whose `content` is renderable.
pub async fn generate_with_retry<G: TextGenerator>(
    generator: &G,
    phase: Phase,
    request: &GenerationRequest,
    config: &GuideConfig,
) -> Generation {
    let start = Instant::now();
    let max_attempts = config.max_attempts();
    let mut attempt: u32 = 0;

    loop {
        debug!("{}: API call (attempt {}/{})", phase, attempt + 1, max_attempts);

        let outcome = match generator.generate(request).await {
            Ok(text) => AttemptOutcome::Success(text),
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => AttemptOutcome::Retry(e),
            Err(e) if e.is_retryable() => {
                warn!("{}: {}", phase, e);
                AttemptOutcome::GiveUp(GenerationError::RetriesExhausted {
                    attempts: max_attempts,
                })
            }
            Err(e) => AttemptOutcome::GiveUp(e),
        };

        match outcome {
            AttemptOutcome::Success(text) => {
                let generation = finish(phase, text, attempt + 1, request.use_search);
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    phase,
                    generation.usage.prompt_tokens,
                    generation.usage.candidates_tokens,
                    start.elapsed()
                );
                return generation;
            }
            AttemptOutcome::Retry(e) => {
                let delay = config.backoff_ms(attempt);
                warn!(
                    "{}: rate limit hit on attempt {}/{}, retrying in {}ms ({})",
                    phase,
                    attempt + 1,
                    max_attempts,
                    delay,
                    e
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_retry(phase, attempt + 1, max_attempts, delay);
                }
                sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
            AttemptOutcome::GiveUp(e) => {
                warn!("{}: giving up after {} attempt(s): {}", phase, attempt + 1, e);
                return Generation {
                    phase,
                    content: e.payload(),
                    usage: TokenUsage::default(),
                    grounded: false,
                    attempts: attempt + 1,
                    error: Some(e),
                };
            }
        }
    }
}

fn finish(phase: Phase, text: GeneratedText, attempts: u32, use_search: bool) -> Generation {
    if text.grounded {
        info!("{}: grounding was used in this response", phase);
    } else if use_search {
        debug!("{}: grounding was requested but no grounding metadata returned", phase);
    }

    let (content, error) = if text.text.trim().is_empty() {
        let e = GenerationError::EmptyResponse;
        (e.payload(), Some(e))
    } else {
        (text.text, None)
    };

    Generation {
        phase,
        content,
        usage: text.usage,
        grounded: text.grounded,
        attempts,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed list of attempt results.
    struct Scripted {
        replies: Mutex<VecDeque<Result<GeneratedText, GenerationError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(replies: Vec<Result<GeneratedText, GenerationError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TextGenerator for Scripted {
        async fn generate(&self, _request: &GenerationRequest) -> Result<GeneratedText, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GenerationError::Api {
                    detail: "script exhausted".into(),
                }))
        }
    }

    fn ok(text: &str) -> Result<GeneratedText, GenerationError> {
        Ok(GeneratedText {
            text: text.into(),
            usage: TokenUsage {
                prompt_tokens: 10,
                candidates_tokens: 5,
                total_tokens: 15,
            },
            grounded: false,
        })
    }

    fn rate_limited() -> Result<GeneratedText, GenerationError> {
        Err(classify_error("429 RESOURCE_EXHAUSTED: quota exceeded"))
    }

    fn fast_config() -> GuideConfig {
        GuideConfig::builder()
            .retry_backoff_ms(0)
            .max_backoff_ms(0)
            .build()
            .unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "p".into(),
            use_search: false,
        }
    }

    #[test]
    fn classify_rate_limits() {
        assert!(classify_error("HTTP 429 Too Many Requests").is_retryable());
        assert!(classify_error("RESOURCE_EXHAUSTED").is_retryable());
        assert!(classify_error("Rate limit reached for model").is_retryable());
        assert!(!classify_error("400 invalid argument").is_retryable());
    }

    #[test]
    fn grounding_read_from_metadata() {
        let mut metadata = HashMap::new();
        assert!(!has_grounding(&metadata));
        metadata.insert("id".to_string(), serde_json::json!("resp_1"));
        assert!(!has_grounding(&metadata));
        metadata.insert("grounding_metadata".to_string(), serde_json::Value::Null);
        assert!(!has_grounding(&metadata));
        metadata.insert(
            "groundingMetadata".to_string(),
            serde_json::json!({ "webSearchQueries": ["avl tree"] }),
        );
        assert!(has_grounding(&metadata));
    }

    #[test]
    fn three_rate_limits_then_success() {
        let g = Scripted::new(vec![rate_limited(), rate_limited(), rate_limited(), ok("done")]);
        let out = tokio_test::block_on(generate_with_retry(&g, Phase::Plan, &request(), &fast_config()));
        assert!(out.is_ok());
        assert_eq!(out.content, "done");
        assert_eq!(out.attempts, 4);
        assert_eq!(out.usage.total_tokens, 15);
        assert_eq!(g.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn four_rate_limits_exhaust_budget() {
        let g = Scripted::new(vec![rate_limited(), rate_limited(), rate_limited(), rate_limited(), ok("late")]);
        let out = tokio_test::block_on(generate_with_retry(&g, Phase::Plan, &request(), &fast_config()));
        assert_eq!(out.content, "<p class='error'>Error: max retries exceeded.</p>");
        assert_eq!(out.error, Some(GenerationError::RetriesExhausted { attempts: 4 }));
        assert_eq!(g.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn non_retryable_error_returns_immediately() {
        let g = Scripted::new(vec![
            Err(classify_error("400 bad request")),
            ok("never reached"),
        ]);
        let out = tokio_test::block_on(generate_with_retry(&g, Phase::Material, &request(), &fast_config()));
        assert_eq!(
            out.content,
            "<p class='error'>Error generating content: 400 bad request</p>"
        );
        assert_eq!(out.attempts, 1);
        assert_eq!(g.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_credentials_payload() {
        let g = Scripted::new(vec![Err(GenerationError::MissingCredentials)]);
        let out = tokio_test::block_on(generate_with_retry(&g, Phase::Plan, &request(), &fast_config()));
        assert_eq!(out.content, "Error: API Key is missing or invalid.");
        assert_eq!(out.usage, TokenUsage::default());
    }

    #[test]
    fn empty_text_becomes_payload_but_keeps_usage() {
        let g = Scripted::new(vec![ok("   ")]);
        let out = tokio_test::block_on(generate_with_retry(&g, Phase::Interview, &request(), &fast_config()));
        assert_eq!(out.content, "Error: No text content generated.");
        assert_eq!(out.error, Some(GenerationError::EmptyResponse));
        assert_eq!(out.usage.prompt_tokens, 10);
    }

    #[test]
    fn zero_retries_means_single_attempt() {
        let config = GuideConfig::builder()
            .max_retries(0)
            .retry_backoff_ms(0)
            .max_backoff_ms(0)
            .build()
            .unwrap();
        let g = Scripted::new(vec![rate_limited(), ok("x")]);
        let out = tokio_test::block_on(generate_with_retry(&g, Phase::Plan, &request(), &config));
        assert_eq!(out.error, Some(GenerationError::RetriesExhausted { attempts: 1 }));
        assert_eq!(g.calls.load(Ordering::SeqCst), 1);
    }
}
