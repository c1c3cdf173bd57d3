//! Content categories and their selector tables.
//!
//! Selector tables are data, not logic: the extractors in [`crate::extract`]
//! stay generic and everything page-specific lives here. String-valued
//! fields (title, hero image source) use ordered XPath fallback lists;
//! content subtrees that feed the Markdown transformer use CSS selectors.

use serde::{Deserialize, Serialize};

/// A supported content category.
///
/// Categories key the export preference map and pick the extractor and
/// selector table for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Published article pages (title, description, hero image, sections).
    Article,
    /// Research conversation pages with one or more report blocks.
    Research,
}

impl Category {
    /// Every supported category, in registration order.
    pub const ALL: &[Category] = &[Category::Article, Category::Research];

    /// Stable key used in the preference map.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Article => "article",
            Category::Research => "research",
        }
    }

    /// Human-readable name for status output.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Article => "Article page",
            Category::Research => "Deep research",
        }
    }

    /// Whether a URL belongs to this category.
    pub fn matches_url(&self, url: &str) -> bool {
        match self {
            Category::Article => {
                url.contains("perplexity.ai/page/")
                    || (url.contains("perplexity.ai/discover/") && has_discover_article_path(url))
            }
            Category::Research => url.contains("chatgpt.com/c/"),
        }
    }

    /// Picks the category for a URL, falling back to the first registered
    /// one when nothing matches.
    pub fn for_url(url: &str) -> Category {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.matches_url(url))
            .unwrap_or(Category::ALL[0])
    }

    /// Parses a category key, as accepted on the command line.
    pub fn from_key(key: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.key() == key)
    }
}

/// Discover URLs only count as articles past the listing level
/// (`/discover/<topic>/<slug>`), not on topic index pages.
fn has_discover_article_path(url: &str) -> bool {
    url.split("perplexity.ai/discover/")
        .nth(1)
        .is_some_and(|rest| {
            let mut segments = rest.split('/').filter(|s| !s.is_empty());
            segments.next().is_some() && segments.next().is_some()
        })
}

/// Selector table for article pages.
#[derive(Debug, Clone)]
pub struct ArticleSelectors {
    /// XPath fallbacks for the page title.
    pub title: Vec<String>,
    /// XPath fallbacks for the hero image source attribute.
    pub hero_image_src: Vec<String>,
    /// CSS fallbacks for the leading description block.
    pub description: Vec<String>,
    /// CSS selector for content section containers, in document order.
    pub sections: String,
    /// CSS selector for a section's heading, within the container.
    pub section_title: String,
    /// CSS selector for a section's body, within the container.
    pub section_content: String,
    /// Index of the first content section; earlier containers are chrome.
    pub section_start: usize,
    /// Extraction stops at the first section whose title contains this.
    pub stop_marker: String,
}

impl Default for ArticleSelectors {
    fn default() -> Self {
        Self {
            title: vec![
                "//article//h1".to_string(),
                "//main//h1".to_string(),
                "//h1".to_string(),
            ],
            hero_image_src: vec![
                "//article//figure//img/@src".to_string(),
                "//main//figure//img/@src".to_string(),
                "//article//img/@src".to_string(),
            ],
            description: vec![
                "article .article-description".to_string(),
                "article header ~ .description".to_string(),
                ".page-description".to_string(),
            ],
            sections: "article section".to_string(),
            section_title: "h2, h3, .section-title".to_string(),
            section_content: ".section-content, .prose".to_string(),
            section_start: 0,
            stop_marker: "Related".to_string(),
        }
    }
}

/// Selector table for research conversation pages.
#[derive(Debug, Clone)]
pub struct ResearchSelectors {
    /// CSS selector for candidate report containers.
    pub containers: String,
    /// CSS fallbacks for a block title inside a container.
    pub title: Vec<String>,
    /// Lowercase markers whose presence flags a container as research
    /// output regardless of length.
    pub keywords: Vec<String>,
}

impl Default for ResearchSelectors {
    fn default() -> Self {
        Self {
            containers: "article".to_string(),
            title: vec![
                "h1".to_string(),
                "h2".to_string(),
                "h3".to_string(),
                "h4".to_string(),
                "h5".to_string(),
                "h6".to_string(),
                ".font-semibold".to_string(),
            ],
            keywords: vec!["research".to_string(), "analysis".to_string()],
        }
    }
}
