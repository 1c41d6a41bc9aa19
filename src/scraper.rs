// =============================================================================
// scraper.rs - THE PAGE VACUUM
// =============================================================================
//
// We do not render JavaScript, dodge cookie banners or fight Cloudflare.
// Firecrawl does all of that for a modest fee, and hands back the main
// content of the page as Markdown.
//
// Real API: https://api.firecrawl.dev/v1/scrape
// Docs:     https://docs.firecrawl.dev/api-reference/endpoint/scrape
//
// The response has changed shape across Firecrawl versions. Some put the
// text under `markdown`, older ones under `content`. We read both, in that
// order, and nothing else. Empty strings count as "no content".
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("scrape request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("scraping service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("scraping service reported failure: {0}")]
    Rejected(String),

    #[error("scraping service returned no content")]
    Empty,
}

/// Anything that can turn a URL into text. Firecrawl in production, a
/// canned string in tests.
#[async_trait]
pub trait ContentScraper: Send + Sync {
    /// Fetch the main content of `url` as Markdown.
    async fn scrape(&self, url: &str) -> Result<String, ScrapeError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'static str; 1],
    only_main_content: bool,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    data: Option<ScrapedDocument>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapedDocument {
    markdown: Option<String>,
    content: Option<String>,
}

impl ScrapeResponse {
    /// Markdown first, legacy `content` second.
    fn into_text(self) -> Result<String, ScrapeError> {
        if !self.success {
            return Err(ScrapeError::Rejected(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let doc = self.data.ok_or(ScrapeError::Empty)?;
        [doc.markdown, doc.content]
            .into_iter()
            .flatten()
            .find(|text| !text.is_empty())
            .ok_or(ScrapeError::Empty)
    }
}

/// Firecrawl client. One `reqwest::Client` for the lifetime of the process.
pub struct FirecrawlScraper {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl FirecrawlScraper {
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("RivalWeaknessEngine/0.1")
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/scrape", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ScrapeError> {
        Self::new(
            &config.firecrawl_base_url,
            config.firecrawl_api_key.clone(),
            config.scrape_timeout,
        )
    }
}

#[async_trait]
impl ContentScraper for FirecrawlScraper {
    async fn scrape(&self, url: &str) -> Result<String, ScrapeError> {
        info!(url = url, "Scrape starting");

        let body = ScrapeRequest {
            url,
            formats: ["markdown"],
            only_main_content: true,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = url, status = status.as_u16(), "Scrape rejected by Firecrawl");
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ScrapeResponse = response.json().await?;
        let text = parsed.into_text()?;

        debug!(url = url, chars = text.chars().count(), "Scrape finished");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<String, ScrapeError> {
        serde_json::from_str::<ScrapeResponse>(raw).unwrap().into_text()
    }

    #[test]
    fn test_markdown_preferred() {
        let text = parse(r##"{"success":true,"data":{"markdown":"# Hi","content":"Hi"}}"##).unwrap();
        assert_eq!(text, "# Hi");
    }

    #[test]
    fn test_falls_back_to_content() {
        let text = parse(r#"{"success":true,"data":{"markdown":"","content":"plain"}}"#).unwrap();
        assert_eq!(text, "plain");
    }

    #[test]
    fn test_whitespace_markdown_still_counts_as_content() {
        let text = parse(r#"{"success":true,"data":{"markdown":"\n  \n","content":"plain"}}"#).unwrap();
        assert_eq!(text, "\n  \n");
    }

    #[test]
    fn test_no_text_is_empty() {
        let err = parse(r#"{"success":true,"data":{"metadata":{}}}"#).unwrap_err();
        assert!(matches!(err, ScrapeError::Empty));
        let err = parse(r#"{"success":true}"#).unwrap_err();
        assert!(matches!(err, ScrapeError::Empty));
    }

    #[test]
    fn test_unsuccessful_scrape_carries_error() {
        let err = parse(r#"{"success":false,"error":"blocked by robots.txt"}"#).unwrap_err();
        assert!(err.to_string().contains("robots.txt"));
    }

    #[test]
    fn test_request_body_shape() {
        let body = ScrapeRequest {
            url: "https://example.com",
            formats: ["markdown"],
            only_main_content: true,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "url": "https://example.com",
                "formats": ["markdown"],
                "onlyMainContent": true
            })
        );
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let scraper =
            FirecrawlScraper::new("https://api.firecrawl.dev/", "fc-key", Duration::from_secs(5))
                .unwrap();
        assert_eq!(scraper.endpoint, "https://api.firecrawl.dev/v1/scrape");
    }
}
