// =============================================================================
// store.rs - THE FILING CABINET
// =============================================================================
//
// Supabase is Postgres with a REST API bolted on the front (PostgREST). We
// never open a database connection. Every operation is an HTTPS call
// against /rest/v1/{table}, which makes this module a very polite HTTP
// client that happens to speak SQL-ish query strings.
//
// Tables:
//   competitors(id, name, target_url, created_at, updated_at)
//   insights(id, competitor_id -> competitors.id, weakness_title,
//            weakness_description, severity, category, created_at)
//
// Ids and timestamps are assigned by the database. We ask for the inserted
// rows back with `Prefer: return=representation` so callers get them.
//
// Competitor names are unique by convention, not by constraint: we look the
// name up before inserting. Two simultaneous first-time analyses of the same
// rival can still race each other into two rows.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::models::{
    CompetitorRecord, CompetitorSummary, InsightRecord, NewCompetitor, NewInsight, Weakness,
};

const COMPETITORS: &str = "competitors";
const INSIGHTS: &str = "insights";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{table}: HTTP {status}: {body}")]
    Status {
        table: &'static str,
        status: u16,
        body: String,
    },

    #[error("{0}: insert returned no rows")]
    NoRowsReturned(&'static str),

    #[error("service role key is not a valid header value")]
    InvalidCredential,
}

/// A `competitors` row as listed by `GET /competitors`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CompetitorRow {
    pub id: Uuid,
    pub name: String,
    pub target_url: String,
    pub created_at: DateTime<Utc>,
}

/// The persistence seam. Supabase in production, a `Vec` behind a mutex in
/// tests.
#[async_trait]
pub trait InsightStore: Send + Sync {
    async fn find_competitor_by_name(&self, name: &str) -> Result<Option<CompetitorRecord>, StoreError>;

    async fn insert_competitor(&self, name: &str, target_url: &str) -> Result<CompetitorRecord, StoreError>;

    /// Bulk insert one analysis worth of weaknesses. Must not touch the
    /// store for an empty slice.
    async fn save_insights(
        &self,
        competitor_id: Uuid,
        weaknesses: &[Weakness],
    ) -> Result<Vec<InsightRecord>, StoreError>;

    async fn list_competitors(&self) -> Result<Vec<CompetitorRow>, StoreError>;

    async fn count_insights(&self, competitor_id: Uuid) -> Result<u64, StoreError>;

    /// Cheap round trip used at startup to fail fast on bad credentials.
    async fn probe(&self) -> Result<(), StoreError>;

    /// Reuse the competitor row with this name, or create it.
    async fn ensure_competitor(&self, name: &str, target_url: &str) -> Result<CompetitorRecord, StoreError> {
        if let Some(existing) = self.find_competitor_by_name(name).await? {
            debug!(competitor = name, id = %existing.id, "Reusing existing competitor");
            return Ok(existing);
        }

        let created = self.insert_competitor(name, target_url).await?;
        info!(competitor = name, id = %created.id, "Competitor created");
        Ok(created)
    }

    /// Every competitor with its insight count, one count query per row.
    async fn competitor_summaries(&self) -> Result<Vec<CompetitorSummary>, StoreError> {
        let rows = self.list_competitors().await?;
        let mut summaries = Vec::with_capacity(rows.len());

        for row in rows {
            let analyses_count = self.count_insights(row.id).await?;
            summaries.push(CompetitorSummary {
                id: row.id,
                name: row.name,
                url: row.target_url,
                analyses_count,
                created_at: row.created_at,
            });
        }

        Ok(summaries)
    }
}

/// PostgREST client for a Supabase project.
pub struct SupabaseStore {
    client: reqwest::Client,
    rest_url: String,
}

impl SupabaseStore {
    pub fn new(project_url: &str, service_role_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let mut apikey =
            HeaderValue::from_str(service_role_key).map_err(|_| StoreError::InvalidCredential)?;
        apikey.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {service_role_key}"))
            .map_err(|_| StoreError::InvalidCredential)?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("apikey", apikey);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        Self::new(
            &config.supabase_url,
            &config.supabase_service_role_key,
            config.store_timeout,
        )
    }

    fn table(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &'static str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let response = self.client.get(self.table(table)).query(query).send().await?;
        let response = check_status(table, response).await?;
        Ok(response.json().await?)
    }

    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &'static str,
        body: &B,
    ) -> Result<Vec<T>, StoreError> {
        let response = self
            .client
            .post(self.table(table))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let response = check_status(table, response).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(
    table: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        table,
        status: status.as_u16(),
        body,
    })
}

/// Total from a PostgREST `Content-Range` header: `0-24/3573`, `*/0`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

/// Insight count for one competitor. A missing or unreadable header counts
/// as zero so one odd row can't sink the whole listing.
fn insight_total(competitor_id: Uuid, content_range: Option<&str>) -> u64 {
    match content_range.and_then(parse_content_range_total) {
        Some(total) => total,
        None => {
            warn!(
                competitor_id = %competitor_id,
                content_range = content_range.unwrap_or("<missing>"),
                "No usable insight count in Content-Range, assuming 0"
            );
            0
        }
    }
}

#[async_trait]
impl InsightStore for SupabaseStore {
    async fn find_competitor_by_name(&self, name: &str) -> Result<Option<CompetitorRecord>, StoreError> {
        let rows: Vec<CompetitorRecord> = self
            .select(
                COMPETITORS,
                &[("select", "*".to_string()), ("name", format!("eq.{name}"))],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_competitor(&self, name: &str, target_url: &str) -> Result<CompetitorRecord, StoreError> {
        let rows: Vec<CompetitorRecord> = self
            .insert(COMPETITORS, &NewCompetitor { name, target_url })
            .await?;
        rows.into_iter()
            .next()
            .ok_or(StoreError::NoRowsReturned(COMPETITORS))
    }

    async fn save_insights(
        &self,
        competitor_id: Uuid,
        weaknesses: &[Weakness],
    ) -> Result<Vec<InsightRecord>, StoreError> {
        if weaknesses.is_empty() {
            return Ok(Vec::new());
        }

        let payload: Vec<NewInsight<'_>> = weaknesses
            .iter()
            .map(|w| NewInsight::from_weakness(competitor_id, w))
            .collect();

        let rows: Vec<InsightRecord> = self.insert(INSIGHTS, payload.as_slice()).await?;
        if rows.is_empty() {
            return Err(StoreError::NoRowsReturned(INSIGHTS));
        }

        debug!(competitor_id = %competitor_id, count = rows.len(), "Insights saved");
        Ok(rows)
    }

    async fn list_competitors(&self) -> Result<Vec<CompetitorRow>, StoreError> {
        self.select(
            COMPETITORS,
            &[("select", "id,name,target_url,created_at".to_string())],
        )
        .await
    }

    async fn count_insights(&self, competitor_id: Uuid) -> Result<u64, StoreError> {
        let response = self
            .client
            .head(self.table(INSIGHTS))
            .query(&[
                ("select", "id".to_string()),
                ("competitor_id", format!("eq.{competitor_id}")),
            ])
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = check_status(INSIGHTS, response).await?;

        Ok(insight_total(
            competitor_id,
            response.headers().get(CONTENT_RANGE).and_then(|v| v.to_str().ok()),
        ))
    }

    async fn probe(&self) -> Result<(), StoreError> {
        let _: Vec<serde_json::Value> = self
            .select(
                COMPETITORS,
                &[("select", "id".to_string()), ("limit", "1".to_string())],
            )
            .await?;
        Ok(())
    }
}
