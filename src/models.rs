// =============================================================================
// models.rs - THE CASE FILE
// =============================================================================
//
// Everything that crosses a wire lives here: what the caller sends us, what
// we hand back, and the two rows we keep in Supabase about every rival we
// have ever dissected.
//
// The severity and category labels are closed sets (any casing). If the model invents a
// "catastrophic" severity or a "vibes" category, that entry is malformed and
// the whole reply gets treated as unparseable. We asked nicely in the prompt.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Page to scrape. Review sites (Trustpilot, G2) work best, marketing
    /// pages mostly tell you what the company wishes were true.
    pub target_url: String,

    /// Display name of the competitor. Doubles as the lookup key for the
    /// competitors table.
    pub competitor_name: String,

    /// Optional model id, checked against [`SUPPORTED_MODELS`].
    #[serde(default)]
    pub model: Option<String>,
}

/// How badly a weakness hurts.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    const LABELS: &'static [&'static str] = &["high", "medium", "low"];

    fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            _ => None,
        }
    }
}

/// Which part of the product the weakness lives in.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Feature,
    Pricing,
    Support,
    Usability,
    Technical,
    Other,
}

impl Category {
    const LABELS: &'static [&'static str] =
        &["feature", "pricing", "support", "usability", "technical", "other"];

    fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "feature" => Some(Category::Feature),
            "pricing" => Some(Category::Pricing),
            "support" => Some(Category::Support),
            "usability" => Some(Category::Usability),
            "technical" => Some(Category::Technical),
            "other" => Some(Category::Other),
            _ => None,
        }
    }
}

// Any casing on the way in, lowercase on the way out.
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Severity::from_label(&label).ok_or_else(|| de::Error::unknown_variant(&label, Severity::LABELS))
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Category::from_label(&label).ok_or_else(|| de::Error::unknown_variant(&label, Category::LABELS))
    }
}

/// A single shortcoming of a competitor, as identified by the model (or as
/// substituted by us when the model could not be reached).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Weakness {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub category: Category,
}

impl Weakness {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        category: Category,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
            category,
        }
    }
}

/// What `POST /analyze` returns. Never stored as its own row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub competitor_name: String,
    pub target_url: String,
    pub weaknesses: Vec<Weakness>,
    pub analyzed_at: DateTime<Utc>,

    /// Character count (not bytes) of the scraped text.
    pub raw_content_length: usize,
}

/// A row of the `competitors` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompetitorRecord {
    pub id: Uuid,
    pub name: String,
    pub target_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for `competitors`. Ids and timestamps are the store's job.
#[derive(Debug, Clone, Serialize)]
pub struct NewCompetitor<'a> {
    pub name: &'a str,
    pub target_url: &'a str,
}

/// A row of the `insights` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsightRecord {
    pub id: Uuid,
    pub competitor_id: Uuid,
    pub weakness_title: String,
    pub weakness_description: String,
    pub severity: Severity,
    pub category: Category,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `insights`.
#[derive(Debug, Clone, Serialize)]
pub struct NewInsight<'a> {
    pub competitor_id: Uuid,
    pub weakness_title: &'a str,
    pub weakness_description: &'a str,
    pub severity: Severity,
    pub category: Category,
}

impl<'a> NewInsight<'a> {
    pub fn from_weakness(competitor_id: Uuid, weakness: &'a Weakness) -> Self {
        Self {
            competitor_id,
            weakness_title: &weakness.title,
            weakness_description: &weakness.description,
            severity: weakness.severity,
            category: weakness.category,
        }
    }
}

/// One entry of `GET /competitors`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompetitorSummary {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub analyses_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Body of `GET /competitors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorListing {
    pub total_competitors: usize,
    pub competitors: Vec<CompetitorSummary>,
}

impl From<Vec<CompetitorSummary>> for CompetitorListing {
    fn from(competitors: Vec<CompetitorSummary>) -> Self {
        Self {
            total_competitors: competitors.len(),
            competitors,
        }
    }
}

/// A model the caller is allowed to request, with the free-tier quota note
/// the frontend shows next to it.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SupportedModel {
    pub id: &'static str,
    pub name: &'static str,
    pub daily: &'static str,
    pub note: &'static str,
}

/// The allow-list. Anything not in here gets a 400.
pub const SUPPORTED_MODELS: &[SupportedModel] = &[
    SupportedModel {
        id: "gemini-2.5-flash",
        name: "Gemini 2.5 Flash",
        daily: "20",
        note: "Severely limited",
    },
    SupportedModel {
        id: "gemini-2.5-flash-lite",
        name: "Gemini 2.5 Flash-Lite",
        daily: "1,500",
        note: "Recommended for Free Tier",
    },
    SupportedModel {
        id: "gemini-2.5-pro",
        name: "Gemini 2.5 Pro",
        daily: "0 - 5",
        note: "Often removed or restricted",
    },
];

/// Body of `GET /models`.
#[derive(Debug, Clone, Serialize)]
pub struct ModelListing {
    pub models: &'static [SupportedModel],
}

pub fn is_supported_model(id: &str) -> bool {
    SUPPORTED_MODELS.iter().any(|m| m.id == id)
}

pub fn supported_model_ids() -> Vec<&'static str> {
    SUPPORTED_MODELS.iter().map(|m| m.id).collect()
}
