use axum::{Router, extract::State, http::StatusCode, response::Json as ResponseJson, routing::get};
use deployment::Deployment;
use serde::Serialize;
use services::services::database_validator::{DatabaseHealth, DatabaseValidator};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Serialize, TS)]
pub struct HealthReport {
    pub version: String,
    pub database: DatabaseHealth,
    pub football_data_configured: bool,
    pub odds_configured: bool,
    pub ai_configured: bool,
}

/// GET /api/health
pub async fn health(
    State(deployment): State<DeploymentImpl>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<HealthReport>>), ApiError> {
    let database = DatabaseValidator::new(deployment.db().pool.clone())
        .validate()
        .await?;

    let status = if database.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let report = HealthReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        football_data_configured: deployment.football_api().is_some(),
        odds_configured: deployment.odds_api().is_some(),
        ai_configured: deployment.content_generator().is_some(),
    };

    Ok((status, ResponseJson(ApiResponse::success(report))))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/health", get(health))
}
