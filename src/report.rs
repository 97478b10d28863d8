//! HTML report assembly.
//!
//! The template is embedded at compile time and carries `{{ name }}` slots.
//! All slots are expanded in a single regex pass over the template, so text
//! that looks like a slot inside generated content is copied through as-is.

use crate::output::{StudyGuide, UsageReport};
use crate::pipeline::markdown_to_html;
use html_escape::encode_text;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

/// The report template shipped with the crate.
pub const REPORT_TEMPLATE: &str = include_str!("../templates/report_template.html");

static RE_SLOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*([\w.]+)\s*\}\}").unwrap());

/// Values for every slot of the report template.
///
/// Section fields hold finished HTML; `topic` is raw and escaped on insert.
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub topic: &'a str,
    pub study_plan: String,
    pub study_material: String,
    pub interview_qa: String,
    pub usage: &'a UsageReport,
}

impl<'a> ReportContext<'a> {
    /// Convert each generated section to HTML.
    pub fn from_guide(guide: &'a StudyGuide) -> Self {
        Self {
            topic: &guide.topic,
            study_plan: markdown_to_html(&guide.plan.content),
            study_material: markdown_to_html(&guide.material.content),
            interview_qa: markdown_to_html(&guide.interview.content),
            usage: &guide.usage,
        }
    }

    fn slot(&self, name: &str) -> Option<String> {
        let value = match name {
            "topic" => encode_text(self.topic).into_owned(),
            "study_plan" => self.study_plan.clone(),
            "study_material" => self.study_material.clone(),
            "interview_qa" => self.interview_qa.clone(),
            "token_usage.prompt_tokens" => format_thousands(self.usage.prompt_tokens),
            "token_usage.candidates_tokens" => format_thousands(self.usage.candidates_tokens),
            "token_usage.total_tokens" => format_thousands(self.usage.total_tokens),
            "token_usage.input_cost" => format!("{:.6}", self.usage.input_cost),
            "token_usage.output_cost" => format!("{:.6}", self.usage.output_cost),
            "token_usage.total_cost" => format!("{:.6}", self.usage.total_cost),
            _ => return None,
        };
        Some(value)
    }
}

/// Render the full report for a finished guide.
pub fn render_report(guide: &StudyGuide) -> String {
    fill_template(REPORT_TEMPLATE, &ReportContext::from_guide(guide))
}

/// Expand every `{{ name }}` slot of `template` in one pass.
///
/// Unknown slots stay in the output untouched.
pub fn fill_template(template: &str, ctx: &ReportContext<'_>) -> String {
    RE_SLOT
        .replace_all(template, |caps: &Captures| match ctx.slot(&caps[1]) {
            Some(value) => value,
            None => {
                warn!("Unknown template slot '{}'", &caps[1]);
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// `1234567` → `"1,234,567"`.
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// File-name stem for a topic: lower-cased, spaces and path separators
/// replaced with `_`.
pub fn topic_slug(topic: &str) -> String {
    topic
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}

/// `"Binary Search"` → `"binary_search_study_guide.html"`.
pub fn report_filename(topic: &str) -> String {
    format!("{}_study_guide.html", topic_slug(topic))
}
