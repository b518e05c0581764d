use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::prediction::{CreatePrediction, Prediction, PredictionAccuracy};
use deployment::Deployment;
use serde::Deserialize;
use services::services::predictions::GeneratePrediction;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

/// GET /api/matches/{id}/predictions
pub async fn list_for_match(
    State(deployment): State<DeploymentImpl>,
    Path(match_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Prediction>>>, ApiError> {
    let predictions = deployment.prediction_service().list_for_match(match_id).await?;
    Ok(ResponseJson(ApiResponse::success(predictions)))
}

/// GET /api/predictions/recent
pub async fn list_recent(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<RecentQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Prediction>>>, ApiError> {
    let predictions = deployment.prediction_service().list_recent(query.limit).await?;
    Ok(ResponseJson(ApiResponse::success(predictions)))
}

/// GET /api/predictions/accuracy
pub async fn accuracy(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<PredictionAccuracy>>, ApiError> {
    let accuracy = deployment.prediction_service().accuracy().await?;
    Ok(ResponseJson(ApiResponse::success(accuracy)))
}

/// POST /api/admin/matches/{id}/predictions
pub async fn create_prediction(
    State(deployment): State<DeploymentImpl>,
    Path(match_id): Path<Uuid>,
    axum::Json(payload): axum::Json<CreatePrediction>,
) -> Result<ResponseJson<ApiResponse<Prediction>>, ApiError> {
    let prediction = deployment
        .prediction_service()
        .create(match_id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(prediction)))
}

/// POST /api/admin/matches/{id}/predictions/generate
pub async fn generate_prediction(
    State(deployment): State<DeploymentImpl>,
    Path(match_id): Path<Uuid>,
    axum::Json(payload): axum::Json<GeneratePrediction>,
) -> Result<ResponseJson<ApiResponse<Prediction>>, ApiError> {
    let prediction = deployment
        .prediction_service()
        .generate_with_ai(match_id, payload)
        .await?;

    deployment
        .track_if_analytics_allowed(
            "prediction_generated",
            serde_json::json!({
                "match_id": match_id.to_string(),
                "prediction_id": prediction.id.to_string(),
            }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(prediction)))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/matches/{id}/predictions", get(list_for_match))
        .route("/predictions/recent", get(list_recent))
        .route("/predictions/accuracy", get(accuracy))
}

pub fn admin_router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/matches/{id}/predictions", post(create_prediction))
        .route("/matches/{id}/predictions/generate", post(generate_prediction))
}
