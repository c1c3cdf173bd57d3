//! XPath evaluation for selector tables.
//!
//! String-valued page fields (titles, image sources) are located by ordered
//! XPath fallback lists; the first expression producing a non-empty result
//! wins. Content subtrees are selected with CSS selectors instead, so this
//! evaluator only ever returns string values.

use sxd_document::parser;
use sxd_xpath::{Context, Factory, Value};

use crate::error::{ExcerpoError, Result};

/// XPath evaluator for selector-table lookups.
pub struct XPathEvaluator {
    factory: Factory,
}

impl XPathEvaluator {
    /// Create a new XPath evaluator
    pub fn new() -> Self {
        Self { factory: Factory::new() }
    }

    /// Evaluate XPath expressions on an HTML string and return the first
    /// non-empty result.
    pub fn evaluate_strings_html(&self, html: &str, xpaths: &[String]) -> Result<Option<String>> {
        for xpath_str in xpaths {
            if let Ok(Some(result)) = self.evaluate_xpath_string_html(html, xpath_str)
                && !result.trim().is_empty()
            {
                return Ok(Some(result));
            }
        }

        Ok(None)
    }

    /// Evaluate one XPath expression on an HTML string and return its
    /// string value.
    pub fn evaluate_xpath_string_html(&self, html: &str, xpath: &str) -> Result<Option<String>> {
        let xpath_compiled = self
            .factory
            .build(xpath)
            .map_err(|e| ExcerpoError::Selector(format!("Invalid XPath '{}': {}", xpath, e)))?
            .ok_or_else(|| ExcerpoError::Selector(format!("Invalid XPath: {}", xpath)))?;

        let package = parser::parse(html)
            .map_err(|e| ExcerpoError::Selector(format!("Failed to parse HTML for XPath: {}", e)))?;

        let context = Context::new();
        match xpath_compiled.evaluate(&context, package.as_document().root())? {
            Value::String(s) => Ok(Some(s)),
            Value::Nodeset(nodeset) => {
                if let Some(node) = nodeset.iter().next() {
                    Ok(Some(node.string_value()))
                } else {
                    Ok(None)
                }
            }
            Value::Boolean(_) => Ok(None),
            Value::Number(_) => Ok(None),
        }
    }

    /// Evaluate one XPath expression and return every match's string value.
    pub fn evaluate_nodes_html(&self, html: &str, xpath: &str) -> Result<Vec<String>> {
        let xpath_compiled = self
            .factory
            .build(xpath)
            .map_err(|e| ExcerpoError::Selector(format!("Invalid XPath '{}': {}", xpath, e)))?
            .ok_or_else(|| ExcerpoError::Selector(format!("Invalid XPath: {}", xpath)))?;

        let package = parser::parse(html)
            .map_err(|e| ExcerpoError::Selector(format!("Failed to parse HTML for XPath: {}", e)))?;

        let context = Context::new();
        match xpath_compiled.evaluate(&context, package.as_document().root())? {
            Value::Nodeset(nodeset) => {
                let mut results = Vec::new();
                for node in nodeset.iter() {
                    results.push(node.string_value());
                }
                Ok(results)
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl Default for XPathEvaluator {
    fn default() -> Self {
        Self::new()
    }
}
