//! Result types produced by a study-guide run.

use crate::config::Pricing;
use crate::error::GenerationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::AddAssign;

/// The three generation phases, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Research and a numbered study plan (search grounding requested).
    Plan,
    /// Full study material covering every plan topic.
    Material,
    /// Interview questions and answers.
    Interview,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Plan, Phase::Material, Phase::Interview];

    /// Human-readable phase title, as shown in logs and progress output.
    pub fn title(&self) -> &'static str {
        match self {
            Phase::Plan => "Deep Research & Planning",
            Phase::Material => "Generating Comprehensive Study Material",
            Phase::Interview => "Preparing Interview Questions",
        }
    }

    /// 1-indexed position in the run.
    pub fn number(&self) -> usize {
        match self {
            Phase::Plan => 1,
            Phase::Material => 2,
            Phase::Interview => 3,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Plan => "plan",
            Phase::Material => "material",
            Phase::Interview => "interview",
        };
        f.write_str(name)
    }
}

/// Token counts reported by the provider for one or more calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub candidates_tokens: u64,
    pub total_tokens: u64,
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.candidates_tokens += rhs.candidates_tokens;
        self.total_tokens += rhs.total_tokens;
    }
}

/// Token totals plus their estimated cost, as rendered in the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    pub prompt_tokens: u64,
    pub candidates_tokens: u64,
    pub total_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

impl UsageReport {
    pub fn from_usage(usage: TokenUsage, pricing: &Pricing) -> Self {
        let input_cost = pricing.input_cost(usage.prompt_tokens);
        let output_cost = pricing.output_cost(usage.candidates_tokens);
        Self {
            prompt_tokens: usage.prompt_tokens,
            candidates_tokens: usage.candidates_tokens,
            total_tokens: usage.total_tokens,
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
        }
    }
}

/// Outcome of one generation phase.
///
/// `content` is always usable as Markdown: on failure it holds the inline
/// error payload of `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub phase: Phase,
    pub content: String,
    pub usage: TokenUsage,
    /// The provider reported that a live search tool was consulted.
    pub grounded: bool,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    pub error: Option<GenerationError>,
}

impl Generation {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything one run produced, before rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyGuide {
    pub topic: String,
    pub plan: Generation,
    pub material: Generation,
    pub interview: Generation,
    pub usage: UsageReport,
}

impl StudyGuide {
    pub fn generations(&self) -> [&Generation; 3] {
        [&self.plan, &self.material, &self.interview]
    }

    /// Phases that ended with an embedded error payload.
    pub fn failed_phases(&self) -> Vec<Phase> {
        self.generations()
            .iter()
            .filter(|g| !g.is_ok())
            .map(|g| g.phase)
            .collect()
    }
}
