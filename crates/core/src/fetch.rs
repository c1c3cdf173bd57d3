//! Page fetching from URLs, files, and stdin.
//!
//! This module provides functions for retrieving page HTML from the
//! sources the CLI accepts: HTTP/HTTPS URLs, local files, and standard
//! input. It talks to arbitrary web servers, unlike [`crate::client`],
//! which only ever addresses the local knowledge-base service.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::{ExcerpoError, Result};

/// HTTP client configuration for fetching web pages.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Custom User-Agent string.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            user_agent: "Mozilla/5.0 (compatible; Excerpo/0.1)".to_string(),
        }
    }
}

/// Fetches page HTML from a URL.
///
/// Performs an HTTP GET and returns the response body as text. Follows
/// redirects, respects the configured timeout, and sends a browser-like
/// User-Agent for better compatibility.
pub async fn fetch_url(url: &str, config: &FetchConfig) -> Result<String> {
    let parsed_url = Url::parse(url).map_err(|e| ExcerpoError::InvalidUrl(e.to_string()))?;

    if parsed_url.scheme().is_empty() {
        return Err(ExcerpoError::InvalidUrl(
            "URL must include a scheme (http:// or https://)".to_string(),
        ));
    }

    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .build()?;

    let response = client
        .get(parsed_url)
        .header("User-Agent", &config.user_agent)
        .header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ExcerpoError::Timeout { timeout: config.timeout }
            } else {
                ExcerpoError::Network(e)
            }
        })?;

    let content = response.text().await?;

    Ok(content)
}

/// Reads page HTML from a local file.
///
/// Callers should validate and sanitize the path when accepting user input.
pub fn fetch_file(path: &str) -> Result<String> {
    let path_buf = PathBuf::from(path);

    if !path_buf.exists() {
        Err(ExcerpoError::FileNotFound(path_buf))
    } else {
        fs::read_to_string(&path_buf).map_err(ExcerpoError::from)
    }
}

/// Reads page HTML from standard input until EOF.
pub fn fetch_stdin() -> Result<String> {
    use std::io::{self, Read};

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(ExcerpoError::from)?;

    Ok(buffer)
}
