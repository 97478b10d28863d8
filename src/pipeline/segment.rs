//! Segmenting: lift code blocks and LaTeX out of the Markdown before rendering.
//!
//! A CommonMark renderer would happily turn `a_1 * b_2` inside `$…$` into
//! emphasis, or smart-quote the inside of a Mermaid diagram. Each protected
//! span is therefore replaced by an opaque placeholder, rendered around, and
//! put back by [`super::restore`].
//!
//! ## Placeholder format
//!
//! `SENTINEL KIND SENTINEL INDEX SENTINEL`, where `SENTINEL` is U+E000, a
//! private-use code point. Models never emit it, CommonMark assigns it no
//! meaning, and the HTML writer does not escape it, so it survives rendering
//! byte-for-byte even inside table cells and list items.
//!
//! ## Extraction order
//!
//! 1. Fenced code blocks (``` with an optional language tag)
//! 2. Display math `$$…$$`
//! 3. Inline math `$…$`
//!
//! Code goes first so `$` inside code is never taken for math; display goes
//! before inline so `$$a$$` is never read as two inline spans.

use html_escape::encode_double_quoted_attribute;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Delimiter of every placeholder token.
pub const SENTINEL: char = '\u{E000}';

/// Language tag (case-insensitive) that marks a fenced block as a diagram.
pub const DIAGRAM_LANGUAGE: &str = "mermaid";

/// Which side table a placeholder points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    CodeBlock,
    Latex,
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentKind::CodeBlock => f.write_str("CODEBLOCK"),
            FragmentKind::Latex => f.write_str("LATEX"),
        }
    }
}

/// Build the placeholder token for the `index`-th fragment of `kind`.
pub fn placeholder(kind: FragmentKind, index: usize) -> String {
    format!("{SENTINEL}{kind}{SENTINEL}{index}{SENTINEL}")
}

/// A fenced code block as written by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFragment {
    /// Language tag after the opening fence, if any.
    pub language: Option<String>,
    /// Body with leading and trailing line breaks removed.
    pub raw_body: String,
}

impl CodeFragment {
    /// Diagram blocks are emitted unescaped for the client-side renderer.
    pub fn is_diagram(&self) -> bool {
        self.language
            .as_deref()
            .is_some_and(|l| l.eq_ignore_ascii_case(DIAGRAM_LANGUAGE))
    }

    /// Final HTML for this block.
    pub fn to_html(&self) -> String {
        if self.is_diagram() {
            return format!("<div class=\"mermaid\">\n{}\n</div>", self.raw_body);
        }
        let code = encode_double_quoted_attribute(&self.raw_body);
        match &self.language {
            Some(lang) => format!("<pre><code class=\"language-{lang}\">{code}</code></pre>"),
            None => format!("<pre><code>{code}</code></pre>"),
        }
    }
}

/// A LaTeX span, delimiters included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathFragment {
    /// Source text including the `$` / `$$` delimiters.
    pub raw_text: String,
    pub is_display: bool,
}

impl MathFragment {
    /// The formula without its delimiters.
    pub fn body(&self) -> &str {
        let delim = if self.is_display { "$$" } else { "$" };
        self.raw_text
            .strip_prefix(delim)
            .and_then(|s| s.strip_suffix(delim))
            .unwrap_or(&self.raw_text)
    }
}

/// Side tables of extracted spans, one per kind, in extraction order.
///
/// A fragment's position in its list is the index embedded in its
/// placeholder; it is meaningful only within one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragments {
    pub code: Vec<CodeFragment>,
    pub math: Vec<MathFragment>,
}

impl Fragments {
    pub fn len(&self) -> usize {
        self.code.len() + self.math.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty() && self.math.is_empty()
    }
}

/// Placeholder-bearing text plus the spans it stands for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmented {
    pub text: String,
    pub fragments: Fragments,
}

// ── Fenced code ──────────────────────────────────────────────────────────────

// A tag only counts when the info string ends the line, so ```x``` is a
// block containing `x`, not an empty block tagged `x`. Attributes after the
// tag (`python title="a.py"`) are dropped.
static RE_FENCED_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:([\w+#.-]+)(?:[ \t][^`\n]*)?\r?\n|[ \t]*\r?\n?)(.*?)\r?\n?```")
        .unwrap()
});

// ── Display math ─────────────────────────────────────────────────────────────

static RE_DISPLAY_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\$[^$]+\$\$").unwrap());

/// Split `markdown` into placeholder text and extracted fragments.
pub fn segment(markdown: &str) -> Segmented {
    let mut fragments = Fragments::default();

    let text = RE_FENCED_CODE
        .replace_all(markdown, |caps: &Captures<'_>| {
            let language = caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .filter(|l| !l.is_empty());
            let raw_body = caps[2].trim_matches(|c| c == '\n' || c == '\r').to_string();
            fragments.code.push(CodeFragment { language, raw_body });
            placeholder(FragmentKind::CodeBlock, fragments.code.len() - 1)
        })
        .into_owned();

    let text = RE_DISPLAY_MATH
        .replace_all(&text, |caps: &Captures<'_>| {
            fragments.math.push(MathFragment {
                raw_text: caps[0].to_string(),
                is_display: true,
            });
            placeholder(FragmentKind::Latex, fragments.math.len() - 1)
        })
        .into_owned();

    let text = extract_inline_math(&text, &mut fragments.math);

    Segmented { text, fragments }
}

// ── Inline math ──────────────────────────────────────────────────────────────
//
// `$…$` where neither delimiter touches another `$` and the span stays on one
// line. The `regex` crate has no look-around, so this is a byte scan; `$`,
// `\` and `\n` are ASCII and never occur inside a multi-byte UTF-8 sequence.

fn extract_inline_math(text: &str, math: &mut Vec<MathFragment>) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        let escaped = i > 0 && bytes[i - 1] == b'\\';
        if !escaped && is_lone_dollar(bytes, i) {
            if let Some(close) = find_inline_close(bytes, i) {
                out.push_str(&text[copied..i]);
                math.push(MathFragment {
                    raw_text: text[i..=close].to_string(),
                    is_display: false,
                });
                out.push_str(&placeholder(FragmentKind::Latex, math.len() - 1));
                i = close + 1;
                copied = i;
                continue;
            }
        }
        i += 1;
    }

    out.push_str(&text[copied..]);
    out
}

fn is_lone_dollar(bytes: &[u8], i: usize) -> bool {
    bytes[i] == b'$' && (i == 0 || bytes[i - 1] != b'$') && bytes.get(i + 1) != Some(&b'$')
}

/// The first `$` after `open` closes the span, provided it is not part of a
/// `$$` and no newline comes first.
fn find_inline_close(bytes: &[u8], open: usize) -> Option<usize> {
    for (j, &b) in bytes.iter().enumerate().skip(open + 1) {
        match b {
            b'\n' => return None,
            b'$' => return (j > open + 1 && is_lone_dollar(bytes, j)).then_some(j),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tagged_code_block() {
        let s = segment("Intro\n\n```python\nprint(\"hi\")\n```\n\nOutro");
        assert_eq!(s.fragments.code.len(), 1);
        let code = &s.fragments.code[0];
        assert_eq!(code.language.as_deref(), Some("python"));
        assert_eq!(code.raw_body, "print(\"hi\")");
        assert_eq!(
            s.text,
            format!("Intro\n\n{}\n\nOutro", placeholder(FragmentKind::CodeBlock, 0))
        );
    }

    #[test]
    fn info_string_attributes_are_dropped() {
        let s = segment("```python title=\"a.py\"\nprint(1)\n```");
        let code = &s.fragments.code[0];
        assert_eq!(code.language.as_deref(), Some("python"));
        assert_eq!(code.raw_body, "print(1)");
        assert_eq!(
            code.to_html(),
            "<pre><code class=\"language-python\">print(1)</code></pre>"
        );
    }

    #[test]
    fn keeps_first_line_indentation() {
        let s = segment("```rust\n    let x = 1;\n```");
        assert_eq!(s.fragments.code[0].raw_body, "    let x = 1;");
    }

    #[test]
    fn untagged_and_inline_fences() {
        let s = segment("```\nplain\n```\nand ```x``` here");
        assert_eq!(s.fragments.code.len(), 2);
        assert_eq!(s.fragments.code[0].language, None);
        assert_eq!(s.fragments.code[0].raw_body, "plain");
        assert_eq!(s.fragments.code[1].language, None);
        assert_eq!(s.fragments.code[1].raw_body, "x");
    }

    #[test]
    fn empty_code_body() {
        let s = segment("```js\n```");
        assert_eq!(s.fragments.code.len(), 1);
        assert_eq!(s.fragments.code[0].raw_body, "");
        assert_eq!(s.fragments.code[0].to_html(), "<pre><code class=\"language-js\"></code></pre>");
    }

    #[test]
    fn unmatched_fence_is_literal() {
        let input = "text\n```python\nnever closed";
        let s = segment(input);
        assert!(s.fragments.is_empty());
        assert_eq!(s.text, input);
    }

    #[test]
    fn diagram_detection_is_case_insensitive() {
        let s = segment("```Mermaid\nflowchart LR\n    A --> B\n```");
        let code = &s.fragments.code[0];
        assert!(code.is_diagram());
        assert_eq!(
            code.to_html(),
            "<div class=\"mermaid\">\nflowchart LR\n    A --> B\n</div>"
        );
    }

    #[test]
    fn code_html_is_escaped() {
        let code = CodeFragment {
            language: Some("html".into()),
            raw_body: "<a href=\"x\">&</a>".into(),
        };
        assert_eq!(
            code.to_html(),
            "<pre><code class=\"language-html\">&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;</code></pre>"
        );
    }

    #[test]
    fn dollar_inside_code_is_not_math() {
        let s = segment("```bash\necho $HOME $PATH\n```");
        assert!(s.fragments.math.is_empty());
        assert_eq!(s.fragments.code.len(), 1);
    }

    #[test]
    fn display_before_inline() {
        let s = segment("$$a+b$$ and $c$");
        assert_eq!(s.fragments.math.len(), 2);
        assert!(s.fragments.math[0].is_display);
        assert_eq!(s.fragments.math[0].body(), "a+b");
        assert!(!s.fragments.math[1].is_display);
        assert_eq!(s.fragments.math[1].body(), "c");
        assert_eq!(
            s.text,
            format!(
                "{} and {}",
                placeholder(FragmentKind::Latex, 0),
                placeholder(FragmentKind::Latex, 1)
            )
        );
    }

    #[test]
    fn multiline_display_math() {
        let s = segment("$$\n\\sum_{i=1}^n x_i\n$$");
        assert_eq!(s.fragments.math.len(), 1);
        assert!(s.fragments.math[0].is_display);
        assert_eq!(s.fragments.math[0].raw_text, "$$\n\\sum_{i=1}^n x_i\n$$");
    }

    #[test]
    fn inline_math_does_not_cross_lines() {
        let s = segment("costs $5\nand $6");
        assert!(s.fragments.math.is_empty());
        assert_eq!(s.text, "costs $5\nand $6");
    }

    #[test]
    fn escaped_dollar_is_not_a_delimiter() {
        let s = segment(r"price \$5 and $x^2$");
        assert_eq!(s.fragments.math.len(), 1);
        assert_eq!(s.fragments.math[0].raw_text, "$x^2$");
    }

    #[test]
    fn several_inline_spans_on_one_line() {
        let s = segment("Let $a_1$ and $b_2$ be given");
        let bodies: Vec<&str> = s.fragments.math.iter().map(|m| m.body()).collect();
        assert_eq!(bodies, vec!["a_1", "b_2"]);
        assert!(!s.text.contains('$'));
    }

    #[test]
    fn indices_are_per_kind() {
        let s = segment("```\nx\n```\n$y$\n```\nz\n```");
        assert_eq!(s.fragments.code.len(), 2);
        assert_eq!(s.fragments.math.len(), 1);
        assert!(s.text.contains(&placeholder(FragmentKind::CodeBlock, 1)));
        assert!(s.text.contains(&placeholder(FragmentKind::Latex, 0)));
    }

    #[test]
    fn no_fragments_passthrough() {
        let input = "# Title\n\nJust *text*.";
        let s = segment(input);
        assert_eq!(s.text, input);
        assert_eq!(s.fragments.len(), 0);
    }
}
