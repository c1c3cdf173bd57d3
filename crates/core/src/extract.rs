//! Content extraction from supported pages.
//!
//! Each category has an extractor that walks the page through its selector
//! table and produces [`ContentBlock`]s ready for export: article pages
//! yield a single assembled document, research pages yield one block per
//! qualifying container. Extractors never fail on missing structure; only
//! a completely empty harvest is an error.

use tracing::{debug, warn};

use crate::model::ContentBlock;
use crate::parse::{Document, Element};
use crate::selectors::{ArticleSelectors, Category, ResearchSelectors};
use crate::transform::{normalize_image_url, transform, transform_description};
use crate::xpath::XPathEvaluator;
use crate::{ExcerpoError, Result};

/// Configuration for content extraction.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Selector table for article pages.
    pub article: ArticleSelectors,
    /// Selector table for research conversation pages.
    pub research: ResearchSelectors,
    /// Containers with at least this many characters of text count as
    /// research output even without a keyword match. This is a sniffing
    /// heuristic, not a contract; tune it per deployment.
    pub research_char_threshold: usize,
    /// Blocks with less content than this are dropped as noise.
    pub min_block_chars: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            article: ArticleSelectors::default(),
            research: ResearchSelectors::default(),
            research_char_threshold: 500,
            min_block_chars: 50,
        }
    }
}

/// Extracts content blocks from a page according to its category.
///
/// # Errors
///
/// Returns [`ExcerpoError::ExtractionEmpty`] when nothing usable was found;
/// selector misses inside an otherwise productive page are not errors.
pub fn extract(html: &str, category: Category, config: &ExtractConfig) -> Result<Vec<ContentBlock>> {
    debug!(category = category.key(), "extracting content");
    match category {
        Category::Article => extract_article(html, config),
        Category::Research => extract_research(html, config),
    }
}

fn extract_article(html: &str, config: &ExtractConfig) -> Result<Vec<ContentBlock>> {
    let table = &config.article;
    let doc = Document::parse(html)?;
    let evaluator = XPathEvaluator::new();

    let title = evaluator
        .evaluate_strings_html(html, &table.title)
        .unwrap_or(None)
        .map(|t| t.trim().to_string())
        .or_else(|| first_heading(&doc))
        .filter(|t| !t.is_empty());

    let mut body = String::new();

    if let Some(description) = select_first(&doc, &table.description) {
        let quoted = transform_description(&description);
        if !quoted.is_empty() {
            body.push_str(&quoted);
            body.push_str("\n\n");
        }
    }

    if let Some(src) = evaluator
        .evaluate_strings_html(html, &table.hero_image_src)
        .unwrap_or(None)
    {
        let url = normalize_image_url(src.trim());
        if !url.is_empty() {
            body.push_str(&format!("![hero image]({})\n\n", url));
        }
    }

    let sections = doc.select(&table.sections)?;
    for section in sections.iter().skip(table.section_start) {
        let section_title = section
            .select(&table.section_title)?
            .first()
            .map(|el| el.text().trim().to_string())
            .unwrap_or_default();

        if !table.stop_marker.is_empty() && section_title.contains(&table.stop_marker) {
            debug!(title = %section_title, "stop marker reached, ending extraction");
            break;
        }

        if !section_title.is_empty() {
            body.push_str(&format!("## {}\n\n", section_title));
        }

        if let Some(content_el) = section.select(&table.section_content)?.first() {
            let content = transform(content_el);
            if !content.is_empty() {
                body.push_str(&content);
                body.push_str("\n\n");
            }
        }
    }

    if title.is_none() && body.trim().is_empty() {
        return Err(ExcerpoError::ExtractionEmpty);
    }

    let title = title.unwrap_or_else(|| "Untitled".to_string());
    let markdown = format!("# {}\n\n{}", title, body).trim().to_string();

    Ok(vec![ContentBlock { title, content: markdown, source_index: 0 }])
}

fn extract_research(html: &str, config: &ExtractConfig) -> Result<Vec<ContentBlock>> {
    let table = &config.research;
    let doc = Document::parse(html)?;

    let mut blocks = Vec::new();
    for (index, container) in doc.select(&table.containers)?.iter().enumerate() {
        let source_index = index + 1;
        let text = container.text();
        let lower = text.to_lowercase();

        let keyword_hit = table.keywords.iter().any(|k| lower.contains(k));
        let long_enough = text.chars().count() > config.research_char_threshold;
        if !keyword_hit && !long_enough {
            continue;
        }

        let content = transform(container);
        if content.chars().count() < config.min_block_chars {
            warn!(source_index, "research block too short, skipping");
            continue;
        }

        let title = block_title(container, &table.title)
            .unwrap_or_else(|| format!("Research {}", source_index));

        debug!(source_index, title = %title, "extracted research block");
        blocks.push(ContentBlock { title, content, source_index });
    }

    if blocks.is_empty() {
        return Err(ExcerpoError::ExtractionEmpty);
    }

    Ok(blocks)
}

fn first_heading(doc: &Document) -> Option<String> {
    doc.select("h1")
        .ok()?
        .first()
        .map(|el| el.text().trim().to_string())
}

fn select_first<'a>(doc: &'a Document, selectors: &[String]) -> Option<Element<'a>> {
    for selector in selectors {
        match doc.select(selector) {
            Ok(matches) => {
                if let Some(el) = matches.into_iter().next() {
                    return Some(el);
                }
            }
            Err(_) => continue,
        }
    }
    None
}

fn block_title(container: &Element<'_>, selectors: &[String]) -> Option<String> {
    for selector in selectors {
        let Ok(matches) = container.select(selector) else { continue };
        if let Some(el) = matches.first() {
            let text = el.text().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}
