use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::news::{
    CreateNewsArticle, CreateNewsComment, NewsArticle, NewsComment, NewsFilter, UpdateNewsArticle,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::news::GenerateArticle;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct SetPublished {
    pub published: bool,
}

/// GET /api/news
pub async fn list_articles(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<NewsFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<NewsArticle>>>, ApiError> {
    let articles = deployment.news_service().list(&filter, false).await?;
    Ok(ResponseJson(ApiResponse::success(articles)))
}

/// GET /api/news/{slug}
pub async fn get_article(
    State(deployment): State<DeploymentImpl>,
    Path(slug): Path<String>,
) -> Result<ResponseJson<ApiResponse<NewsArticle>>, ApiError> {
    let article = deployment.news_service().get_by_slug(&slug).await?;
    Ok(ResponseJson(ApiResponse::success(article)))
}

/// GET /api/news/articles/{id}/comments
pub async fn list_comments(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<NewsComment>>>, ApiError> {
    let comments = deployment.news_service().list_comments(id).await?;
    Ok(ResponseJson(ApiResponse::success(comments)))
}

/// POST /api/news/articles/{id}/comments
pub async fn add_comment(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<CreateNewsComment>,
) -> Result<ResponseJson<ApiResponse<NewsComment>>, ApiError> {
    let comment = deployment.news_service().add_comment(id, payload).await?;

    deployment
        .track_if_analytics_allowed(
            "news_comment_added",
            serde_json::json!({ "article_id": id.to_string() }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(comment)))
}

/// GET /api/admin/news
/// Includes unpublished drafts
pub async fn admin_list_articles(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<NewsFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<NewsArticle>>>, ApiError> {
    let articles = deployment.news_service().list(&filter, true).await?;
    Ok(ResponseJson(ApiResponse::success(articles)))
}

/// POST /api/admin/news
pub async fn create_article(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<CreateNewsArticle>,
) -> Result<ResponseJson<ApiResponse<NewsArticle>>, ApiError> {
    let article = deployment.news_service().create_article(payload).await?;
    Ok(ResponseJson(ApiResponse::success(article)))
}

/// GET /api/admin/news/{id}
pub async fn admin_get_article(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<NewsArticle>>, ApiError> {
    let article = deployment.news_service().get(id).await?;
    Ok(ResponseJson(ApiResponse::success(article)))
}

/// PUT /api/admin/news/{id}
pub async fn update_article(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateNewsArticle>,
) -> Result<ResponseJson<ApiResponse<NewsArticle>>, ApiError> {
    let article = deployment.news_service().update(id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(article)))
}

/// PUT /api/admin/news/{id}/published
pub async fn set_published(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<SetPublished>,
) -> Result<ResponseJson<ApiResponse<NewsArticle>>, ApiError> {
    let article = deployment
        .news_service()
        .set_published(id, payload.published)
        .await?;
    Ok(ResponseJson(ApiResponse::success(article)))
}

/// DELETE /api/admin/news/{id}
pub async fn delete_article(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.news_service().delete(id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/admin/news/generate
pub async fn generate_article(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<GenerateArticle>,
) -> Result<ResponseJson<ApiResponse<NewsArticle>>, ApiError> {
    let article = deployment.news_service().generate_with_ai(payload).await?;

    deployment
        .track_if_analytics_allowed(
            "news_generated",
            serde_json::json!({
                "article_id": article.id.to_string(),
                "category": article.category.to_string(),
            }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(article)))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/news", get(list_articles))
        .route("/news/{slug}", get(get_article))
        .route(
            "/news/articles/{id}/comments",
            get(list_comments).post(add_comment),
        )
}

pub fn admin_router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/news", get(admin_list_articles).post(create_article))
        .route("/news/generate", post(generate_article))
        .route(
            "/news/{id}",
            get(admin_get_article).put(update_article).delete(delete_article),
        )
        .route("/news/{id}/published", put(set_published))
}
