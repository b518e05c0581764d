//! Pass-through proxies for the fixtures and odds providers, so API keys
//! never reach the browser.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use chrono::NaiveDate;
use deployment::Deployment;
use serde::Deserialize;
use services::services::football_api::FootballApiError;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct FixturesQuery {
    pub date: Option<NaiveDate>,
    pub league: Option<u32>,
}

/// GET /api/fixtures?date=&league=
pub async fn fixtures(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<FixturesQuery>,
) -> Result<ResponseJson<ApiResponse<serde_json::Value>>, ApiError> {
    let client = deployment
        .football_api()
        .ok_or(FootballApiError::NotConfigured("FOOTBALL_DATA_API_KEY"))?;
    let payload = client.fixtures(query.date, query.league).await?;
    Ok(ResponseJson(ApiResponse::success(payload)))
}

/// GET /api/odds/{sport}
pub async fn odds(
    State(deployment): State<DeploymentImpl>,
    Path(sport): Path<String>,
) -> Result<ResponseJson<ApiResponse<serde_json::Value>>, ApiError> {
    let client = deployment
        .odds_api()
        .ok_or(FootballApiError::NotConfigured("ODDS_API_KEY"))?;
    let payload = client.odds(&sport).await?;
    Ok(ResponseJson(ApiResponse::success(payload)))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/fixtures", get(fixtures))
        .route("/odds/{sport}", get(odds))
}
