// =============================================================================
// pipeline.rs - THE AUTOPSY TABLE
// =============================================================================
//
// One POST /analyze, start to finish:
//
//   1. Validate the requested model id against the allow-list
//   2. Scrape the target URL               (failure here = 400, nothing written)
//   3. Find or create the competitor row   (failure here = 500)
//   4. Ask the model what is wrong with them
//   5. Dig weaknesses out of the reply
//   6. Insert the weaknesses               (failure here = 500)
//   7. Return the lot
//
// Steps 4 and 5 never fail the request. Each way they can go wrong has
// exactly one fixed substitute:
//
//   no model at all        -> two "AI unavailable" placeholders
//   model call errored     -> one "AI Service Error" placeholder
//   reply had no JSON      -> one "AI Response Parsing Issue" placeholder
//   JSON didn't map        -> one "Analysis parsing error" placeholder
//
// Nothing is retried. Nothing is rolled back: if step 6 fails, the
// competitor row from step 3 stays put.
//
// The model id is checked BEFORE scraping, so a typo in the request doesn't
// burn a Firecrawl credit on the way to a 400.
// =============================================================================

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::extraction::{self, placeholders, Extraction};
use crate::llm::{LanguageModel, ModelProvider};
use crate::metrics::MetricsCollector;
use crate::models::{self, AnalysisResponse, AnalyzeRequest, Weakness};
use crate::scraper::{ContentScraper, ScrapeError};
use crate::store::{InsightStore, StoreError};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Requested model '{requested}' is not supported. Allowed: {allowed:?}")]
    UnsupportedModel {
        requested: String,
        allowed: Vec<&'static str>,
    },

    #[error("Failed to scrape content from the provided URL")]
    ScrapeFailed {
        #[source]
        source: ScrapeError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AnalysisError {
    /// The caller's fault (400) as opposed to ours (500).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AnalysisError::UnsupportedModel { .. } | AnalysisError::ScrapeFailed { .. }
        )
    }
}

/// The prompt sent to the model. `content` is cut to `max_chars` characters.
pub fn build_prompt(competitor_name: &str, content: &str, max_chars: usize) -> String {
    let excerpt = truncate_chars(content, max_chars);
    format!(
        r#"You are an expert competitive analyst. Analyze the following content from {competitor_name}'s website
and identify their main product weaknesses or areas for improvement.

Focus on:
- Product features and functionality gaps
- Pricing issues or concerns
- Customer support problems
- User experience issues
- Technical limitations
- Market positioning weaknesses

Content to analyze:
{excerpt}

Please provide 8-12 specific weaknesses in the following JSON format:
{{
    "weaknesses": [
        {{
            "title": "Brief title of weakness",
            "description": "Detailed explanation of the weakness and why it's a problem",
            "severity": "high|medium|low",
            "category": "feature|pricing|support|usability|technical|other"
        }}
    ]
}}

Be specific, actionable, and focus on genuine weaknesses that competitors could exploit.
"#
    )
}

/// Longest prefix of `text` with at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// The three collaborators plus the knobs. Built once in `main`, shared by
/// every worker through `Arc`.
pub struct AnalysisPipeline {
    scraper: Arc<dyn ContentScraper>,
    models: Arc<dyn ModelProvider>,
    store: Arc<dyn InsightStore>,
    metrics: Arc<MetricsCollector>,
    max_prompt_chars: usize,
}

impl AnalysisPipeline {
    pub fn new(
        scraper: Arc<dyn ContentScraper>,
        models: Arc<dyn ModelProvider>,
        store: Arc<dyn InsightStore>,
        metrics: Arc<MetricsCollector>,
        max_prompt_chars: usize,
    ) -> Self {
        Self {
            scraper,
            models,
            store,
            metrics,
            max_prompt_chars,
        }
    }

    pub fn store(&self) -> &Arc<dyn InsightStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Run one analysis end to end.
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalysisResponse, AnalysisError> {
        self.metrics.increment_requested();

        let requested_model = self.resolve_requested_model(request.model.as_deref())?;

        info!(url = %request.target_url, competitor = %request.competitor_name, "Scraping target");
        let content = match self.scraper.scrape(&request.target_url).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => return Err(self.scrape_failed(&request.target_url, ScrapeError::Empty)),
            Err(e) => return Err(self.scrape_failed(&request.target_url, e)),
        };
        let raw_content_length = content.chars().count();
        info!(chars = raw_content_length, "Scraped content");

        let competitor = self
            .store
            .ensure_competitor(&request.competitor_name, &request.target_url)
            .await
            .map_err(|e| self.persistence_failed(e))?;

        let model = requested_model.or_else(|| self.models.default_model());
        let weaknesses = self.identify_weaknesses(model, request, &content).await;

        let saved = self
            .store
            .save_insights(competitor.id, &weaknesses)
            .await
            .map_err(|e| self.persistence_failed(e))?;
        self.metrics.add_insights_persisted(saved.len() as u64);
        self.metrics.increment_completed();

        info!(
            competitor = %request.competitor_name,
            competitor_id = %competitor.id,
            weaknesses = weaknesses.len(),
            "Analysis complete"
        );

        Ok(AnalysisResponse {
            competitor_name: request.competitor_name.clone(),
            target_url: request.target_url.clone(),
            weaknesses,
            analyzed_at: Utc::now(),
            raw_content_length,
        })
    }

    /// `Ok(None)` means "use the server default". An allowed id that fails to
    /// build also lands on the default, with a warning.
    fn resolve_requested_model(
        &self,
        requested: Option<&str>,
    ) -> Result<Option<Arc<dyn LanguageModel>>, AnalysisError> {
        let Some(id) = requested.filter(|id| !id.is_empty()) else {
            return Ok(None);
        };

        if !models::is_supported_model(id) {
            self.metrics.increment_rejected_models();
            warn!(model = id, "Rejected unsupported model id");
            return Err(AnalysisError::UnsupportedModel {
                requested: id.to_string(),
                allowed: models::supported_model_ids(),
            });
        }

        match self.models.model(id) {
            Ok(model) => {
                info!(model = id, "Using requested model");
                Ok(Some(model))
            }
            Err(e) => {
                warn!(model = id, error = %e, "Requested model not available, falling back to default");
                Ok(None)
            }
        }
    }

    /// The fallback chain. Always returns a list, never an error.
    async fn identify_weaknesses(
        &self,
        model: Option<Arc<dyn LanguageModel>>,
        request: &AnalyzeRequest,
        content: &str,
    ) -> Vec<Weakness> {
        let Some(model) = model else {
            warn!("No language model available, returning outage placeholders");
            self.metrics.increment_ai_unavailable();
            return placeholders::ai_unavailable(&request.target_url);
        };

        let prompt = build_prompt(&request.competitor_name, content, self.max_prompt_chars);
        info!(model = model.model_id(), prompt_chars = prompt.chars().count(), "Asking the model");

        let reply = match model.generate(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(model = model.model_id(), error = %e, "Model call failed");
                self.metrics.increment_ai_errors();
                return vec![placeholders::ai_service_error(&e)];
            }
        };

        let extraction = extraction::extract_weaknesses(&reply);
        if !matches!(extraction, Extraction::Parsed(_)) {
            self.metrics.increment_parse_fallbacks();
        }
        extraction.into_weaknesses()
    }

    fn scrape_failed(&self, url: &str, source: ScrapeError) -> AnalysisError {
        warn!(url = url, error = %source, "Scrape failed");
        self.metrics.increment_scrape_failures();
        AnalysisError::ScrapeFailed { source }
    }

    fn persistence_failed(&self, e: StoreError) -> AnalysisError {
        warn!(error = %e, "Persistence failed");
        self.metrics.increment_persistence_failures();
        AnalysisError::Store(e)
    }
}
