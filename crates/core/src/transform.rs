//! DOM subtree to Markdown conversion.
//!
//! The transformer is a pure tree-walk: it reads a parsed element and
//! appends to a separate text buffer, so the page DOM is never mutated and
//! the same input always produces byte-identical output. Missing optional
//! structure (no code language, no href, empty cells) is simply omitted,
//! never an error; a fully empty result is the caller's signal that
//! nothing was extracted.

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use crate::parse::Element;

/// Converts an element's subtree to Markdown.
///
/// # Example
///
/// ```rust
/// use excerpo_core::parse::Document;
/// use excerpo_core::transform::transform;
///
/// let doc = Document::parse_fragment("<h2>Findings</h2><p>Body text.</p>").unwrap();
/// let md = transform(&doc.root());
/// assert_eq!(md, "## Findings\n\nBody text.");
/// ```
pub fn transform(element: &Element) -> String {
    let mut out = String::new();
    render_children(element.as_element_ref(), &mut out);
    finalize(&out)
}

/// Converts a detached HTML fragment to Markdown.
pub fn transform_fragment(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    render_children(fragment.root_element(), &mut out);
    finalize(&out)
}

/// Converts a leading description block to a Markdown blockquote.
///
/// The subtree is transformed as usual, then every non-empty paragraph is
/// prefixed with `> `, with one blank line between paragraphs.
pub fn transform_description(element: &Element) -> String {
    quote_paragraphs(&transform(element))
}

/// Prefixes every non-empty paragraph of `text` with a blockquote marker.
pub fn quote_paragraphs(text: &str) -> String {
    let boundary = Regex::new(r"\n{2,}").unwrap();
    boundary
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("> {}", p))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Recovers the original URL from a proxy-wrapped image URL.
///
/// Detects the `<host>/image/fetch/<flags>/<encoded>` pattern, percent-
/// decodes the embedded URL, and strips the `t_limit/` sizing prefix when
/// present. The decode runs a second time when the first pass still
/// contains `%`, to undo double-encoding; a URL whose correct form
/// legitimately contains `%` after one decode is decoded once too often.
/// That matches the proxy's observed encoding and is left as-is.
/// Non-matching URLs and decode failures pass through unchanged.
pub fn normalize_image_url(url: &str) -> String {
    if !url.contains("/image/fetch/") {
        return url.to_string();
    }

    let pattern = Regex::new(r"^https://[^/]+/image/fetch/[^/]+/(.+)$").unwrap();
    let Some(captures) = pattern.captures(url) else {
        return url.to_string();
    };
    let embedded = &captures[1];

    let Some(mut original) = percent_decode(embedded) else {
        return url.to_string();
    };
    if original.contains('%') {
        match percent_decode(&original) {
            Some(decoded) => original = decoded,
            None => return url.to_string(),
        }
    }

    if let Some(stripped) = original.strip_prefix("t_limit/") {
        original = stripped.to_string();
    }

    original
}

fn percent_decode(input: &str) -> Option<String> {
    percent_encoding::percent_decode_str(input)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

/// Trims the buffer and collapses runs of 3+ newlines to exactly 2.
fn finalize(text: &str) -> String {
    let collapse = Regex::new(r"\n{3,}").unwrap();
    collapse.replace_all(text.trim(), "\n\n").to_string()
}

fn render_children(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                // Inter-element indentation carries no content.
                if !text.trim().is_empty() {
                    out.push_str(text);
                }
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    render_element(child_el, out);
                }
            }
            _ => {}
        }
    }
}

fn render_element(el: ElementRef<'_>, out: &mut String) {
    let tag = el.value().name();
    match tag {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag[1..].parse::<usize>().unwrap_or(1);
            let text: String = el.text().collect();
            out.push_str(&"#".repeat(level));
            out.push(' ');
            out.push_str(text.trim());
            out.push_str("\n\n");
        }
        "pre" => render_code_block(el, out),
        "ul" => render_list(el, out, false),
        "ol" => render_list(el, out, true),
        "p" => {
            let content = render_inline(el);
            out.push_str(content.trim());
            out.push_str("\n\n");
        }
        "table" => render_table(el, out),
        "strong" | "b" | "em" | "i" | "code" | "a" | "span" => {
            out.push_str(&render_inline_element(el));
        }
        "script" | "style" | "noscript" | "template" | "img" | "br" => {}
        // Containers and anything without a rule contribute their children
        // as-is; unmatched structure degrades to plain text.
        _ => render_children(el, out),
    }
}

fn render_code_block(el: ElementRef<'_>, out: &mut String) {
    let code_sel = Selector::parse("code").unwrap();
    let code = el.select(&code_sel).next();

    let language = code
        .and_then(|c| c.value().attr("class"))
        .and_then(|classes| {
            classes
                .split_whitespace()
                .find_map(|token| token.strip_prefix("language-"))
        })
        .unwrap_or("");

    let content: String = match code {
        Some(code) => code.text().collect(),
        None => el.text().collect(),
    };

    out.push_str(&format!("\n```{}\n{}\n```\n\n", language, content));
}

fn render_list(el: ElementRef<'_>, out: &mut String, ordered: bool) {
    let p_sel = Selector::parse("p").unwrap();

    let mut lines = Vec::new();
    for child in el.children() {
        let Some(item) = ElementRef::wrap(child) else { continue };
        if item.value().name() != "li" {
            continue;
        }

        let paragraphs: Vec<String> = item
            .select(&p_sel)
            .map(|p| render_inline(p).trim().to_string())
            .collect();

        let content = if paragraphs.is_empty() {
            render_inline(item).trim().to_string()
        } else {
            paragraphs.join("\n")
        };

        let marker = if ordered { format!("{}.", lines.len() + 1) } else { "-".to_string() };
        lines.push(format!("{} {}", marker, content));
    }

    out.push('\n');
    out.push_str(&lines.join("\n"));
    out.push_str("\n\n");
}

fn render_table(el: ElementRef<'_>, out: &mut String) {
    let row_sel = Selector::parse("tr").unwrap();
    let cell_sel = Selector::parse("th, td").unwrap();
    let th_sel = Selector::parse("th").unwrap();

    out.push('\n');
    for (row_index, row) in el.select(&row_sel).enumerate() {
        let cells: Vec<String> = row
            .select(&cell_sel)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));

        // Header separator only when the first row actually has header cells.
        if row_index == 0 && row.select(&th_sel).next().is_some() {
            let separator = vec!["---"; cells.len()].join(" | ");
            out.push_str(&format!("| {} |\n", separator));
        }
    }
    out.push('\n');
}

/// Renders an element's children in inline context, keeping emphasis,
/// code, and link markers but no block structure.
fn render_inline(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    out.push_str(&render_inline_element(child_el));
                }
            }
            _ => {}
        }
    }
    out
}

fn render_inline_element(el: ElementRef<'_>) -> String {
    match el.value().name() {
        "strong" | "b" => format!("**{}**", render_inline(el)),
        "em" | "i" => format!("*{}*", render_inline(el)),
        "code" => format!("`{}`", el.text().collect::<String>()),
        "a" => render_anchor(el),
        "img" | "script" | "style" | "br" => String::new(),
        _ => render_inline(el),
    }
}

fn render_anchor(el: ElementRef<'_>) -> String {
    let href = el.value().attr("href").unwrap_or("");

    let is_citation = el
        .value()
        .attr("class")
        .is_some_and(|classes| classes.split_whitespace().any(|c| c == "citation"));

    if is_citation && !href.is_empty() {
        let number_sel = Selector::parse("span span").unwrap();
        let number = el
            .select(&number_sel)
            .next()
            .map(|n| n.text().collect::<String>().trim().to_string())
            .unwrap_or_else(|| el.text().collect::<String>().trim().to_string());
        let title = el.value().attr("aria-label").unwrap_or("");
        return format!("[{}]({} \"{}\")", number, href, title);
    }

    let text = render_inline(el);
    if href.is_empty() || text.trim().is_empty() {
        // Unconvertible anchors fall through as plain text.
        return text;
    }

    format!("[{}]({})", text.trim(), href)
}
