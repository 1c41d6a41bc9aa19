// =============================================================================
// http.rs - THE FRONT DESK
// =============================================================================
//
// Four routes, JSON in and JSON out:
//
//   POST /analyze       run the pipeline for one competitor page
//   GET  /models        the model allow-list, with quota notes
//   GET  /competitors   everyone we've analyzed, with insight counts
//   GET  /metrics       pipeline counters
//
// Errors come back as {"detail": "..."} with 400 for the caller's mistakes
// (bad model id, unscrapeable URL) and 500 for ours.
// =============================================================================

use actix_web::http::StatusCode;
use actix_web::{get, post, web, HttpResponse, Responder, ResponseError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::models::{AnalysisResponse, AnalyzeRequest, CompetitorListing, ModelListing, SUPPORTED_MODELS};
use crate::pipeline::{AnalysisError, AnalysisPipeline};
use crate::store::StoreError;

/// Shared by every actix worker through `web::Data`.
pub struct AppState {
    pub pipeline: AnalysisPipeline,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Failed to fetch competitors: {0}")]
    Listing(StoreError),
}

impl ApiError {
    fn detail(&self) -> String {
        match self {
            ApiError::Analysis(e) if e.is_client_error() => e.to_string(),
            ApiError::Analysis(e) => format!("Analysis failed: {e}"),
            ApiError::Listing(_) => self.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Analysis(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            detail: self.detail(),
        })
    }
}

#[post("/analyze")]
async fn analyze(
    state: web::Data<AppState>,
    request: web::Json<AnalyzeRequest>,
) -> Result<web::Json<AnalysisResponse>, ApiError> {
    let request = request.into_inner();
    match state.pipeline.analyze(&request).await {
        Ok(response) => Ok(web::Json(response)),
        Err(e) => {
            if !e.is_client_error() {
                error!(competitor = %request.competitor_name, error = %e, "Analysis failed");
            }
            Err(e.into())
        }
    }
}

#[get("/models")]
async fn list_models() -> impl Responder {
    web::Json(ModelListing {
        models: SUPPORTED_MODELS,
    })
}

#[get("/competitors")]
async fn list_competitors(state: web::Data<AppState>) -> Result<web::Json<CompetitorListing>, ApiError> {
    let summaries = state
        .pipeline
        .store()
        .competitor_summaries()
        .await
        .map_err(|e| {
            error!(error = %e, "Competitor listing failed");
            ApiError::Listing(e)
        })?;
    Ok(web::Json(CompetitorListing::from(summaries)))
}

#[get("/metrics")]
async fn metrics(state: web::Data<AppState>) -> impl Responder {
    web::Json(state.pipeline.metrics().snapshot())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(analyze)
        .service(list_models)
        .service(list_competitors)
        .service(metrics);
}
