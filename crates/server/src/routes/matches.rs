use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::football_match::{
    CreateMatch, FootballMatch, MatchFilter, MatchStatus, UpdateScore,
};
use deployment::Deployment;
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct SetMatchStatus {
    pub status: MatchStatus,
}

/// GET /api/matches
pub async fn list_matches(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<MatchFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<FootballMatch>>>, ApiError> {
    let matches = deployment.match_service().list(&filter).await?;
    Ok(ResponseJson(ApiResponse::success(matches)))
}

/// GET /api/matches/{id}
pub async fn get_match(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<FootballMatch>>, ApiError> {
    let football_match = deployment.match_service().get(id).await?;
    Ok(ResponseJson(ApiResponse::success(football_match)))
}

/// POST /api/admin/matches
/// Match form with separate local date and time fields
pub async fn create_match(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<CreateMatch>,
) -> Result<ResponseJson<ApiResponse<FootballMatch>>, ApiError> {
    let football_match = deployment.match_service().create_from_form(payload).await?;

    deployment
        .track_if_analytics_allowed(
            "match_created",
            serde_json::json!({
                "match_id": football_match.id.to_string(),
                "competition": football_match.competition,
            }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(football_match)))
}

/// PUT /api/admin/matches/{id}/score
pub async fn update_score(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateScore>,
) -> Result<ResponseJson<ApiResponse<FootballMatch>>, ApiError> {
    let football_match = deployment.match_service().update_score(id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(football_match)))
}

/// PUT /api/admin/matches/{id}/status
pub async fn set_status(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<SetMatchStatus>,
) -> Result<ResponseJson<ApiResponse<FootballMatch>>, ApiError> {
    let football_match = deployment
        .match_service()
        .set_status(id, payload.status)
        .await?;
    Ok(ResponseJson(ApiResponse::success(football_match)))
}

/// DELETE /api/admin/matches/{id}
pub async fn delete_match(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.match_service().delete(id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/matches", get(list_matches))
        .route("/matches/{id}", get(get_match))
}

pub fn admin_router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/matches", post(create_match))
        .route("/matches/{id}", axum::routing::delete(delete_match))
        .route("/matches/{id}/score", put(update_score))
        .route("/matches/{id}/status", put(set_status))
}
