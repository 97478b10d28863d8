//! Progress-callback trait for per-phase generation events.
//!
//! Inject an [`Arc<dyn GuideProgressCallback>`] via
//! [`crate::config::GuideConfigBuilder::progress_callback`] to receive events
//! as the run moves through plan, material and interview generation. A single
//! phase can take minutes, so the CLI uses these events to keep a spinner and
//! a per-phase log line on screen.
//!
//! # Example
//!
//! ```rust
//! use edgequake_studyguide::{GuideConfig, GuideProgressCallback, Phase};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl GuideProgressCallback for CountingCallback {
//!     fn on_phase_complete(&self, phase: Phase, content_len: usize, _grounded: bool) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{phase} done ({content_len} chars)");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = GuideConfig::builder()
//!     .progress_callback(counter as Arc<dyn GuideProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{Phase, UsageReport};
use std::sync::Arc;

/// Called by the orchestrator as it runs each phase.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait GuideProgressCallback: Send + Sync {
    /// Called once, after the topic was validated and before the first call.
    fn on_guide_start(&self, topic: &str, total_phases: usize) {
        let _ = (topic, total_phases);
    }

    /// Called just before the first attempt of a phase.
    fn on_phase_start(&self, phase: Phase) {
        let _ = phase;
    }

    /// Called when a rate-limited attempt is about to be retried.
    ///
    /// # Arguments
    /// * `attempt`      — 1-indexed attempt that just failed
    /// * `max_attempts` — attempt budget for the phase
    /// * `delay_ms`     — backoff before the next attempt
    fn on_retry(&self, phase: Phase, attempt: u32, max_attempts: u32, delay_ms: u64) {
        let _ = (phase, attempt, max_attempts, delay_ms);
    }

    /// Called when a phase produced content.
    fn on_phase_complete(&self, phase: Phase, content_len: usize, grounded: bool) {
        let _ = (phase, content_len, grounded);
    }

    /// Called when a phase ended with an embedded error payload.
    fn on_phase_error(&self, phase: Phase, error: &str) {
        let _ = (phase, error);
    }

    /// Called once after all phases were attempted.
    fn on_guide_complete(&self, usage: &UsageReport) {
        let _ = usage;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GuideProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GuideConfig`].
pub type ProgressCallback = Arc<dyn GuideProgressCallback>;
