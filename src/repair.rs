//! Diagram recovery for already-written reports.
//!
//! Models sometimes emit mermaid that the client renderer rejects: doubled
//! brackets, HTML entities inside labels, prose lines mixed into the graph.
//! [`repair_html`] rewrites every `<div class="mermaid">` block of a report
//! with a fixed sequence of heuristics; [`diagnose`] only reports suspicious
//! blocks. Neither touches anything outside the diagram containers.
//!
//! ## Repair order
//!
//! 1. collapse `[[` `]]` `{{` `}}` until none remain
//! 2. drop lines that cannot be diagram syntax
//! 3. decode HTML entities
//! 4. clean node and decision labels
//! 5. normalise `-->` spacing
//! 6. replace the block with a placeholder diagram if it has no header

use crate::convert::write_atomic;
use crate::error::StudyGuideError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Header keywords that open a diagram.
pub const DIAGRAM_KEYWORDS: [&str; 11] = [
    "graph",
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "stateDiagram",
    "erDiagram",
    "gantt",
    "pie",
    "mindmap",
    "timeline",
    "journey",
];

/// Substituted for a block that has no recognisable header.
pub const PLACEHOLDER_DIAGRAM: &str = "flowchart LR\n    A[Concept] --> B[Outcome]";

static RE_DIAGRAM_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<div class="mermaid">(.*?)</div>"#).unwrap());

static RE_NODE_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]").unwrap());

static RE_DECISION_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^}]*)\}").unwrap());

static RE_LABEL_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\[\]\(\)\{\}]").unwrap());

static RE_NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w]").unwrap());

static RE_UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());

static RE_ARROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*-->\s*").unwrap());

/// Result of repairing one diagram body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairedBlock {
    /// The new body, without the surrounding container.
    pub body: String,
    /// Lines removed by the syntax filter.
    pub dropped_lines: usize,
    /// The block failed the header gate and was replaced.
    pub replaced: bool,
}

/// Result of repairing a whole report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    pub html: String,
    pub blocks: Vec<RepairedBlock>,
}

impl RepairOutcome {
    pub fn replaced_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.replaced).count()
    }
}

fn starts_with_keyword(line: &str) -> bool {
    DIAGRAM_KEYWORDS.iter().any(|kw| line.starts_with(kw))
}

fn looks_like_diagram_line(raw: &str) -> bool {
    let trimmed = raw.trim();
    starts_with_keyword(trimmed)
        || raw.starts_with(' ')
        || raw.starts_with('\t')
        || trimmed.contains("-->")
        || trimmed.starts_with(|c: char| c.is_ascii_uppercase())
}

fn collapse_doubled_brackets(body: &str) -> String {
    let mut s = body.to_string();
    while ["[[", "]]", "{{", "}}"].iter().any(|d| s.contains(d)) {
        s = s
            .replace("[[", "[")
            .replace("]]", "]")
            .replace("{{", "{")
            .replace("}}", "}");
    }
    s
}

fn decode_entities(line: &str) -> String {
    line.replace("&amp;", "and")
        .replace("&ldquo;", "")
        .replace("&rdquo;", "")
        .replace("&lsquo;", "")
        .replace("&rsquo;", "")
        .replace("&quot;", "")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&nbsp;", " ")
}

fn clean_label(label: &str, fallback: &str) -> String {
    let s = RE_LABEL_BRACKETS.replace_all(label, "");
    let s = s.replace([' ', ','], "_").replace('&', "and");
    let s = RE_NON_WORD.replace_all(&s, "");
    let s = RE_UNDERSCORES.replace_all(&s, "_");
    let s = s.trim_matches('_');
    if s.is_empty() {
        fallback.to_string()
    } else {
        s.to_string()
    }
}

fn clean_labels(line: &str) -> String {
    let s = RE_NODE_LABEL.replace_all(line, |caps: &Captures| {
        format!("[{}]", clean_label(&caps[1], "Node"))
    });
    RE_DECISION_LABEL
        .replace_all(&s, |caps: &Captures| {
            format!("{{{}}}", clean_label(&caps[1], "Decision"))
        })
        .into_owned()
}

/// Repair one diagram body (the text between the container tags).
pub fn repair_block(body: &str) -> RepairedBlock {
    let collapsed = collapse_doubled_brackets(body);

    let mut lines = Vec::new();
    let mut dropped_lines = 0;
    for raw in collapsed.lines() {
        if raw.trim().is_empty() {
            continue;
        }
        if !looks_like_diagram_line(raw) {
            dropped_lines += 1;
            continue;
        }
        let line = decode_entities(raw.trim());
        let line = clean_labels(&line);
        lines.push(RE_ARROW.replace_all(&line, " --> ").into_owned());
    }

    match lines.first() {
        Some(first) if starts_with_keyword(first) => RepairedBlock {
            body: lines.join("\n"),
            dropped_lines,
            replaced: false,
        },
        _ => RepairedBlock {
            body: PLACEHOLDER_DIAGRAM.to_string(),
            dropped_lines,
            replaced: true,
        },
    }
}

/// Repair every diagram container in `html`.
pub fn repair_html(html: &str) -> RepairOutcome {
    let mut blocks = Vec::new();
    let repaired = RE_DIAGRAM_BLOCK.replace_all(html, |caps: &Captures| {
        let block = repair_block(&caps[1]);
        let out = format!("<div class=\"mermaid\">\n{}\n</div>", block.body);
        blocks.push(block);
        out
    });
    let html = repaired.into_owned();
    debug!("Repaired {} diagram block(s)", blocks.len());
    RepairOutcome { html, blocks }
}

// ── Diagnosis ────────────────────────────────────────────────────────────────

/// A suspicious pattern in a diagram block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiagramIssue {
    DoubledBrackets,
    UnbalancedBrackets { open: usize, close: usize },
    TooManyArrows { arrows: usize, lines: usize },
}

impl fmt::Display for DiagramIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagramIssue::DoubledBrackets => write!(f, "double brackets"),
            DiagramIssue::UnbalancedBrackets { open, close } => {
                write!(f, "unbalanced [ ]: {} vs {}", open, close)
            }
            DiagramIssue::TooManyArrows { arrows, lines } => {
                write!(f, "too many arrows: {} arrows for {} lines", arrows, lines)
            }
        }
    }
}

/// Findings for one diagram block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockDiagnosis {
    /// 1-based position of the block in the document.
    pub index: usize,
    pub issues: Vec<DiagramIssue>,
    /// First 150 characters of the body.
    pub preview: String,
}

impl BlockDiagnosis {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

fn diagnose_block(index: usize, body: &str) -> BlockDiagnosis {
    let mut issues = Vec::new();

    if body.contains("[[") || body.contains("]]") {
        issues.push(DiagramIssue::DoubledBrackets);
    }

    let open = body.matches('[').count();
    let close = body.matches(']').count();
    if open != close {
        issues.push(DiagramIssue::UnbalancedBrackets { open, close });
    }

    let arrows = body.matches("-->").count();
    let lines = body.lines().filter(|l| !l.trim().is_empty()).count();
    // arrows > 1.5 * lines, in integers
    if 2 * arrows > 3 * lines {
        issues.push(DiagramIssue::TooManyArrows { arrows, lines });
    }

    BlockDiagnosis {
        index,
        issues,
        preview: body.chars().take(150).collect(),
    }
}

/// Inspect every diagram container in `html`, one entry per block.
pub fn diagnose(html: &str) -> Vec<BlockDiagnosis> {
    RE_DIAGRAM_BLOCK
        .captures_iter(html)
        .enumerate()
        .map(|(i, caps)| diagnose_block(i + 1, &caps[1]))
        .collect()
}

// ── Files ────────────────────────────────────────────────────────────────────

/// `report.html` → `report_fixed.html` in the same directory.
pub fn default_repair_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "html".to_string());
    input.with_file_name(format!("{stem}_fixed.{ext}"))
}

/// Read the report at `input`.
pub async fn read_report(input: &Path) -> Result<String, StudyGuideError> {
    tokio::fs::read_to_string(input)
        .await
        .map_err(|e| StudyGuideError::ReportReadFailed {
            path: input.to_path_buf(),
            source: e,
        })
}

/// Repair the report at `input` and write the result.
///
/// Writes to `output`, or to [`default_repair_output`] when `None`.
/// Returns the written path and the per-block outcome.
pub async fn repair_file(
    input: &Path,
    output: Option<&Path>,
) -> Result<(PathBuf, RepairOutcome), StudyGuideError> {
    let html = read_report(input).await?;
    let outcome = repair_html(&html);

    let out_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_repair_output(input));
    write_atomic(&out_path, &outcome.html).await?;

    info!(
        "Repaired {} diagram(s), {} replaced, written to {}",
        outcome.blocks.len(),
        outcome.replaced_count(),
        out_path.display()
    );
    Ok((out_path, outcome))
}
