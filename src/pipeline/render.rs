//! Rendering: placeholder-bearing Markdown → HTML via pulldown-cmark.
//!
//! Protected spans are already out of the text (see [`super::segment`]), so
//! this stage is a plain CommonMark render with the GFM extensions model
//! output relies on: pipe tables, task-list checkboxes from the self-test
//! sections, strikethrough, and smart punctuation. Raw HTML is passed
//! through, which is how inline error payloads reach the report.

use pulldown_cmark::{html, Options, Parser};

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options
}

/// Render Markdown to an HTML fragment.
pub fn render_markdown(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, options());
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::segment::{placeholder, FragmentKind};

    #[test]
    fn renders_headings_and_emphasis() {
        let html = render_markdown("# Title\n\nSome *text*.");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>text</em>"));
    }

    #[test]
    fn renders_tables() {
        let html = render_markdown("| A | B |\n| --- | --- |\n| 1 | 2 |");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>2</td>"));
    }

    #[test]
    fn renders_task_lists() {
        let html = render_markdown("- [x] done");
        assert!(html.contains("checkbox"));
    }

    #[test]
    fn standalone_placeholder_becomes_paragraph() {
        let ph = placeholder(FragmentKind::CodeBlock, 0);
        let html = render_markdown(&format!("before\n\n{ph}\n\nafter"));
        assert!(html.contains(&format!("<p>{ph}</p>")), "got: {html}");
    }

    #[test]
    fn placeholder_survives_table_cell() {
        let ph = placeholder(FragmentKind::Latex, 3);
        let html = render_markdown(&format!("| f | v |\n| --- | --- |\n| {ph} | 1 |"));
        assert!(html.contains(&format!("<td>{ph}</td>")), "got: {html}");
    }

    #[test]
    fn raw_html_passes_through() {
        let html = render_markdown("<p class='error'>Error: max retries exceeded.</p>");
        assert!(html.contains("<p class='error'>"));
    }
}
