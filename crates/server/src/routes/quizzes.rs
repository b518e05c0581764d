use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::quiz::{
    CreateQuizQuestion, LeaderboardEntry, PublicQuizQuestion, QuizQuestion, QuizResult,
    SubmitQuiz,
};
use deployment::Deployment;
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct DrawQuery {
    pub category: Option<String>,
    pub count: Option<i64>,
}

#[derive(Debug, Deserialize, TS)]
pub struct LeaderboardQuery {
    pub category: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/quiz/categories
pub async fn categories(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<String>>>, ApiError> {
    let categories = deployment.quiz_service().categories().await?;
    Ok(ResponseJson(ApiResponse::success(categories)))
}

/// GET /api/quiz/questions
pub async fn draw_questions(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<DrawQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<PublicQuizQuestion>>>, ApiError> {
    let questions = deployment
        .quiz_service()
        .draw_questions(query.category.as_deref(), query.count)
        .await?;
    Ok(ResponseJson(ApiResponse::success(questions)))
}

/// POST /api/quiz/submissions
pub async fn submit(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<SubmitQuiz>,
) -> Result<ResponseJson<ApiResponse<QuizResult>>, ApiError> {
    let result = deployment.quiz_service().submit(payload).await?;

    deployment
        .track_if_analytics_allowed(
            "quiz_submitted",
            serde_json::json!({
                "session_id": result.session_id.to_string(),
                "score": result.score,
                "total": result.total,
            }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(result)))
}

/// GET /api/quiz/leaderboard
pub async fn leaderboard(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<LeaderboardEntry>>>, ApiError> {
    let entries = deployment
        .quiz_service()
        .leaderboard(query.category.as_deref(), query.limit)
        .await?;
    Ok(ResponseJson(ApiResponse::success(entries)))
}

/// POST /api/admin/quiz/questions
pub async fn create_question(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<CreateQuizQuestion>,
) -> Result<ResponseJson<ApiResponse<QuizQuestion>>, ApiError> {
    let question = deployment.quiz_service().create_question(payload).await?;
    Ok(ResponseJson(ApiResponse::success(question)))
}

/// DELETE /api/admin/quiz/questions/{id}
pub async fn delete_question(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.quiz_service().delete_question(id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().nest(
        "/quiz",
        Router::new()
            .route("/categories", get(categories))
            .route("/questions", get(draw_questions))
            .route("/submissions", post(submit))
            .route("/leaderboard", get(leaderboard)),
    )
}

pub fn admin_router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/quiz/questions", post(create_question))
        .route("/quiz/questions/{id}", delete(delete_question))
}
