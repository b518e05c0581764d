use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::profile::{CreateProfile, Profile, UpdateProfile};
use deployment::Deployment;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

/// POST /api/profiles
pub async fn create_profile(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<CreateProfile>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let profile = deployment.profile_service().create(payload).await?;

    deployment
        .track_if_analytics_allowed(
            "profile_created",
            serde_json::json!({ "profile_id": profile.id.to_string() }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// GET /api/profiles/{id}
pub async fn get_profile(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let profile = deployment.profile_service().get(id).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// GET /api/profiles/by-username/{username}
pub async fn get_profile_by_username(
    State(deployment): State<DeploymentImpl>,
    Path(username): Path<String>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let profile = deployment.profile_service().find_by_username(&username).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// PUT /api/profiles/{id}
pub async fn update_profile(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateProfile>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let profile = deployment.profile_service().update(id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/profiles", post(create_profile))
        .route("/profiles/{id}", get(get_profile).put(update_profile))
        .route("/profiles/by-username/{username}", get(get_profile_by_username))
}
