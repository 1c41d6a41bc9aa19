// In-memory stand-ins for Firecrawl, Gemini and Supabase, shared by the
// pipeline and route tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::llm::{LanguageModel, LlmError, ModelProvider};
use crate::models::{CompetitorRecord, InsightRecord, Weakness};
use crate::scraper::{ContentScraper, ScrapeError};
use crate::store::{CompetitorRow, InsightStore, StoreError};

pub struct FakeScraper {
    content: Option<String>,
    calls: AtomicUsize,
}

impl FakeScraper {
    pub fn returning(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            content: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentScraper for FakeScraper {
    async fn scrape(&self, _url: &str) -> Result<String, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.content.clone().ok_or(ScrapeError::Empty)
    }
}

pub struct FakeModel {
    id: String,
    reply: Result<String, String>,
}

impl FakeModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            id: "fake-model".to_string(),
            reply: Ok(reply.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            id: "fake-model".to_string(),
            reply: Err(message.to_string()),
        }
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        self.reply.clone().map_err(|body| LlmError::Status { status: 429, body })
    }
}

#[derive(Default)]
pub struct FakeProvider {
    default: Option<Arc<dyn LanguageModel>>,
    models: HashMap<String, Arc<dyn LanguageModel>>,
    built: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with_default(model: FakeModel) -> Self {
        Self {
            default: Some(Arc::new(model)),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, id: &str, model: FakeModel) -> Self {
        self.models.insert(id.to_string(), Arc::new(model));
        self
    }

    /// Ids successfully handed out by `model()`, in order.
    pub fn built(&self) -> Vec<String> {
        self.built.lock().clone()
    }
}

impl ModelProvider for FakeProvider {
    fn default_model(&self) -> Option<Arc<dyn LanguageModel>> {
        self.default.clone()
    }

    fn model(&self, id: &str) -> Result<Arc<dyn LanguageModel>, LlmError> {
        let model = self
            .models
            .get(id)
            .cloned()
            .ok_or_else(|| LlmError::Unavailable(id.to_string(), "not registered".to_string()))?;
        self.built.lock().push(id.to_string());
        Ok(model)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    competitors: Mutex<Vec<CompetitorRecord>>,
    insights: Mutex<Vec<InsightRecord>>,
    writes: AtomicUsize,
    fail_insight_inserts: bool,
    fail_reads: bool,
}

impl MemoryStore {
    pub fn failing_insight_inserts() -> Self {
        Self {
            fail_insight_inserts: true,
            ..Self::default()
        }
    }

    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn competitors(&self) -> Vec<CompetitorRecord> {
        self.competitors.lock().clone()
    }

    pub fn insights(&self) -> Vec<InsightRecord> {
        self.insights.lock().clone()
    }

    /// Number of insert calls that reached the store.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn unavailable(table: &'static str) -> StoreError {
        StoreError::Status {
            table,
            status: 503,
            body: "database is on fire".to_string(),
        }
    }
}

#[async_trait]
impl InsightStore for MemoryStore {
    async fn find_competitor_by_name(&self, name: &str) -> Result<Option<CompetitorRecord>, StoreError> {
        if self.fail_reads {
            return Err(Self::unavailable("competitors"));
        }
        Ok(self.competitors.lock().iter().find(|c| c.name == name).cloned())
    }

    async fn insert_competitor(&self, name: &str, target_url: &str) -> Result<CompetitorRecord, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let record = CompetitorRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            target_url: target_url.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.competitors.lock().push(record.clone());
        Ok(record)
    }

    async fn save_insights(
        &self,
        competitor_id: Uuid,
        weaknesses: &[Weakness],
    ) -> Result<Vec<InsightRecord>, StoreError> {
        if weaknesses.is_empty() {
            return Ok(Vec::new());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_insight_inserts {
            return Err(Self::unavailable("insights"));
        }

        let rows: Vec<InsightRecord> = weaknesses
            .iter()
            .map(|w| InsightRecord {
                id: Uuid::new_v4(),
                competitor_id,
                weakness_title: w.title.clone(),
                weakness_description: w.description.clone(),
                severity: w.severity,
                category: w.category,
                created_at: Utc::now(),
            })
            .collect();
        self.insights.lock().extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn list_competitors(&self) -> Result<Vec<CompetitorRow>, StoreError> {
        if self.fail_reads {
            return Err(Self::unavailable("competitors"));
        }
        Ok(self
            .competitors
            .lock()
            .iter()
            .map(|c| CompetitorRow {
                id: c.id,
                name: c.name.clone(),
                target_url: c.target_url.clone(),
                created_at: c.created_at,
            })
            .collect())
    }

    async fn count_insights(&self, competitor_id: Uuid) -> Result<u64, StoreError> {
        Ok(self
            .insights
            .lock()
            .iter()
            .filter(|i| i.competitor_id == competitor_id)
            .count() as u64)
    }

    async fn probe(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
