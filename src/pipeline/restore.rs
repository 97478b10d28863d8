//! Restoring: put extracted fragments back into the rendered HTML.
//!
//! A placeholder alone on its line comes back from the renderer as
//! `<p>PH</p>`; one inside running text comes back bare. Both forms resolve
//! to the same fragment. Code and diagram fragments are block elements, so
//! their paragraph wrapper is dropped; math keeps it because math is inline
//! text for the client-side typesetter.

use super::segment::{placeholder, Fragments, FragmentKind, SENTINEL};
use html_escape::encode_double_quoted_attribute;
use tracing::debug;

/// Substitute every placeholder in `html` with its fragment's final HTML.
///
/// Math goes first: a math span may enclose a code placeholder, which only
/// becomes visible once the math text is back in place.
///
/// Never fails: a placeholder that cannot be found is skipped, and a token
/// with no matching fragment stays in the output as dead text.
pub fn restore(mut html: String, fragments: &Fragments) -> String {
    for (i, math) in fragments.math.iter().enumerate() {
        let ph = placeholder(FragmentKind::Latex, i);
        html = restore_in_urls(html, FragmentKind::Latex, i, &math.raw_text);
        if !html.contains(&ph) {
            debug!("math placeholder {} not found in rendered HTML", i);
            continue;
        }
        html = html.replace(&format!("<p>{ph}</p>"), &format!("<p>{}</p>", math.raw_text));
        html = html.replace(&ph, &math.raw_text);
    }

    for (i, code) in fragments.code.iter().enumerate() {
        let ph = placeholder(FragmentKind::CodeBlock, i);
        html = restore_in_urls(html, FragmentKind::CodeBlock, i, &code.raw_body);
        if !html.contains(&ph) {
            debug!("code placeholder {} not found in rendered HTML", i);
            continue;
        }
        let block = code.to_html();
        html = html.replace(&format!("<p>{ph}</p>"), &block);
        html = html.replace(&ph, &block);
    }

    html
}

/// The renderer percent-encodes the sentinel inside link destinations.
fn encoded_placeholder(kind: FragmentKind, index: usize) -> String {
    let mut buf = [0u8; 4];
    let sentinel: String = SENTINEL
        .encode_utf8(&mut buf)
        .bytes()
        .map(|b| format!("%{b:02X}"))
        .collect();
    format!("{sentinel}{kind}{sentinel}{index}{sentinel}")
}

/// Put the source text back where a placeholder ended up inside an `href`.
fn restore_in_urls(html: String, kind: FragmentKind, index: usize, source: &str) -> String {
    let encoded = encoded_placeholder(kind, index);
    if !html.contains(&encoded) {
        return html;
    }
    html.replace(&encoded, &encode_double_quoted_attribute(source))
}
