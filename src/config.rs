//! Configuration types for study-guide generation.
//!
//! All run behaviour is controlled through [`GuideConfig`], built via its
//! [`GuideConfigBuilder`]. Every knob lives in one struct so the CLI, tests
//! and library callers share the same defaults.

use crate::error::StudyGuideError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Provider used when nothing else is configured.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used when the provider is named but the model is not.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for one study-guide run.
///
/// Built via [`GuideConfig::builder()`] or using [`GuideConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_studyguide::GuideConfig;
///
/// let config = GuideConfig::builder()
///     .model("gemini-2.5-flash")
///     .max_retries(3)
///     .output_dir("reports")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GuideConfig {
    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    /// If None, the provider is resolved from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.7.
    pub temperature: f32,

    /// Maximum tokens generated per phase. Default: 32768.
    ///
    /// The material phase covers every topic of the plan and routinely
    /// produces tens of thousands of tokens.
    pub max_tokens: usize,

    /// Retries after the first attempt when the provider rate-limits. Default: 3.
    ///
    /// Only rate-limit responses are retried; any other failure is turned
    /// into an inline error payload immediately.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds. Default: 15000.
    ///
    /// Doubles after each attempt: 15 s → 30 s → 60 s, capped by
    /// `max_backoff_ms`. Free-tier quotas reset per minute, so short delays
    /// only burn attempts.
    pub retry_backoff_ms: u64,

    /// Upper bound on a single retry delay in milliseconds. Default: 120000.
    pub max_backoff_ms: u64,

    /// Pause between the material and interview phases. Default: 5000.
    pub phase_pause_ms: u64,

    /// Directory the HTML report is written to. Default: `output`.
    pub output_dir: PathBuf,

    /// Token prices used for the cost summary.
    pub pricing: Pricing,

    /// Optional per-phase progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.7,
            max_tokens: 32_768,
            max_retries: 3,
            retry_backoff_ms: 15_000,
            max_backoff_ms: 120_000,
            phase_pause_ms: 5_000,
            output_dir: PathBuf::from("output"),
            pricing: Pricing::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GuideConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuideConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("max_backoff_ms", &self.max_backoff_ms)
            .field("phase_pause_ms", &self.phase_pause_ms)
            .field("output_dir", &self.output_dir)
            .field("pricing", &self.pricing)
            .finish()
    }
}

impl GuideConfig {
    /// Create a new builder for `GuideConfig`.
    pub fn builder() -> GuideConfigBuilder {
        GuideConfigBuilder {
            config: Self::default(),
        }
    }

    /// Total attempts per phase, including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `attempt + 1` (0-indexed attempt that failed).
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        self.retry_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }
}

/// Builder for [`GuideConfig`].
#[derive(Debug)]
pub struct GuideConfigBuilder {
    config: GuideConfig,
}

impl GuideConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.config.max_backoff_ms = ms;
        self
    }

    pub fn phase_pause_ms(mut self, ms: u64) -> Self {
        self.config.phase_pause_ms = ms;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn pricing(mut self, pricing: Pricing) -> Self {
        self.config.pricing = pricing;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GuideConfig, StudyGuideError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(StudyGuideError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.max_backoff_ms < c.retry_backoff_ms {
            return Err(StudyGuideError::InvalidConfig(format!(
                "max_backoff_ms ({}) is below retry_backoff_ms ({})",
                c.max_backoff_ms, c.retry_backoff_ms
            )));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(StudyGuideError::InvalidConfig(
                "output_dir must not be empty".into(),
            ));
        }
        if c.pricing.input_per_million < 0.0 || c.pricing.output_per_million < 0.0 {
            return Err(StudyGuideError::InvalidConfig(
                "token prices must not be negative".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Pricing ──────────────────────────────────────────────────────────────

/// USD price per one million tokens.
///
/// Defaults match Gemini 2.5 Flash below the 200k-context tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            input_per_million: 0.15,
            output_per_million: 0.60,
        }
    }
}

impl Pricing {
    pub fn input_cost(&self, tokens: u64) -> f64 {
        tokens as f64 * self.input_per_million / 1_000_000.0
    }

    pub fn output_cost(&self, tokens: u64) -> f64 {
        tokens as f64 * self.output_per_million / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = GuideConfig::default();
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.max_attempts(), 4);
        assert_eq!(c.retry_backoff_ms, 15_000);
        assert_eq!(c.phase_pause_ms, 5_000);
        assert_eq!(c.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let c = GuideConfig::default();
        assert_eq!(c.backoff_ms(0), 15_000);
        assert_eq!(c.backoff_ms(1), 30_000);
        assert_eq!(c.backoff_ms(2), 60_000);
        assert_eq!(c.backoff_ms(3), 120_000);
        assert_eq!(c.backoff_ms(10), 120_000);
        assert_eq!(c.backoff_ms(200), 120_000);
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = GuideConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn builder_rejects_inverted_backoff() {
        let err = GuideConfig::builder()
            .retry_backoff_ms(10_000)
            .max_backoff_ms(1_000)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max_backoff_ms"), "got: {err}");
    }

    #[test]
    fn builder_rejects_zero_tokens() {
        assert!(GuideConfig::builder().max_tokens(0).build().is_err());
    }

    #[test]
    fn pricing_costs() {
        let p = Pricing::default();
        assert!((p.input_cost(1_000_000) - 0.15).abs() < 1e-12);
        assert!((p.output_cost(2_000_000) - 1.20).abs() < 1e-12);
        assert_eq!(p.input_cost(0), 0.0);
    }
}
