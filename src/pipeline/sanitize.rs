//! Sanitising: fix the structural artefacts restoration leaves behind.
//!
//! Restoring a block fragment into running text can leave `<p><div …>` or
//! `</pre></p>` pairs (a block inside a paragraph), and some renders leave
//! empty paragraphs. The rules here are deliberately narrow; this is not a
//! general HTML repairer.
//!
//! Every rule only deletes text, so repeating the rule set until nothing
//! changes terminates, and the result is a fixed point: running
//! [`sanitize`] twice gives the same output as running it once.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_EMPTY_PARAGRAPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"<p>\s*</p>").unwrap());

static RE_P_BEFORE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<p>\s*(<(?:div|pre)\b[^>]*>)").unwrap());

static RE_P_AFTER_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(</(?:div|pre)>)\s*</p>").unwrap());

/// Apply all sanitising rules until the HTML stops changing.
pub fn sanitize(html: &str) -> String {
    let mut current = html.to_string();
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_once(html: &str) -> String {
    let s = remove_empty_paragraphs(html);
    unwrap_blocks_from_paragraphs(&s)
}

fn remove_empty_paragraphs(html: &str) -> String {
    RE_EMPTY_PARAGRAPH.replace_all(html, "").into_owned()
}

fn unwrap_blocks_from_paragraphs(html: &str) -> String {
    let s = RE_P_BEFORE_BLOCK.replace_all(html, "${1}");
    RE_P_AFTER_BLOCK.replace_all(&s, "${1}").into_owned()
}
