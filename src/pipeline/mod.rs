//! Pipeline stages for study-guide generation.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! prompt ──▶ llm ──▶ segment ──▶ render ──▶ restore ──▶ sanitize ──▶ HTML
//!           (API)  (placeholders) (cmark)  (fragments)  (cleanup)
//! ```
//!
//! 1. [`llm`]      : drive the text-generation call with retry/backoff; the
//!    only stage with network I/O
//! 2. [`segment`]  : lift code blocks and LaTeX out of the Markdown
//! 3. [`render`]   : CommonMark + GFM tables → HTML
//! 4. [`restore`]  : put the lifted fragments back
//! 5. [`sanitize`] : remove empty paragraphs and block-in-paragraph nesting
//!
//! Stages 2–5 are pure and synchronous; [`markdown_to_html`] chains them.

pub mod llm;
pub mod render;
pub mod restore;
pub mod sanitize;
pub mod segment;

use tracing::debug;

/// Convert one section of model Markdown to an HTML fragment.
///
/// Fenced code is emitted as escaped `<pre><code>`, ```` ```mermaid ```` as
/// an unescaped `<div class="mermaid">`, and LaTeX verbatim with its
/// delimiters for client-side typesetting. Never fails.
pub fn markdown_to_html(markdown: &str) -> String {
    let segmented = segment::segment(markdown);
    debug!(
        "Segmented {} code blocks and {} math spans",
        segmented.fragments.code.len(),
        segmented.fragments.math.len()
    );
    let html = render::render_markdown(&segmented.text);
    let html = restore::restore(html, &segmented.fragments);
    sanitize::sanitize(&html)
}
