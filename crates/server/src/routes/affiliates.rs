use axum::{
    Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{Json as ResponseJson, Redirect},
    routing::{get, post, put},
};
use db::models::{
    affiliate::{Affiliate, AffiliateStatus, CreateAffiliate},
    affiliate_commission::{AffiliateCommission, AffiliatePayout, CommissionStatus},
    affiliate_link::CreateAffiliateLink,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::affiliate::{
    AffiliateLinkWithUrl, AffiliateStats, ClickContext, ClickOutcome, RecordConversion,
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct AffiliateListQuery {
    pub status: Option<AffiliateStatus>,
}

#[derive(Debug, Deserialize, TS)]
pub struct CommissionListQuery {
    pub status: Option<CommissionStatus>,
}

#[derive(Debug, Deserialize, TS)]
pub struct SetAffiliateStatus {
    pub status: AffiliateStatus,
}

#[derive(Debug, Deserialize, TS)]
pub struct SetLinkActive {
    pub is_active: bool,
}

#[derive(Debug, Deserialize, TS)]
pub struct ReviewCommission {
    pub approve: bool,
}

/// POST /api/affiliates
pub async fn apply(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<CreateAffiliate>,
) -> Result<ResponseJson<ApiResponse<Affiliate>>, ApiError> {
    let affiliate = deployment.affiliate_service().apply(payload).await?;

    deployment
        .track_if_analytics_allowed(
            "affiliate_applied",
            serde_json::json!({ "affiliate_id": affiliate.id.to_string() }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(affiliate)))
}

/// GET /api/affiliates/{id}
pub async fn get_affiliate(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Affiliate>>, ApiError> {
    let affiliate = deployment.affiliate_service().get(id).await?;
    Ok(ResponseJson(ApiResponse::success(affiliate)))
}

/// GET /api/affiliates/by-code/{code}
pub async fn get_affiliate_by_code(
    State(deployment): State<DeploymentImpl>,
    Path(code): Path<String>,
) -> Result<ResponseJson<ApiResponse<Affiliate>>, ApiError> {
    let affiliate = deployment
        .affiliate_service()
        .find_by_code(&code.to_uppercase())
        .await?;
    Ok(ResponseJson(ApiResponse::success(affiliate)))
}

/// GET /api/affiliates/{id}/stats
pub async fn get_stats(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<AffiliateStats>>, ApiError> {
    let stats = deployment.affiliate_service().stats(id).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

/// GET /api/affiliates/{id}/links
pub async fn list_links(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<AffiliateLinkWithUrl>>>, ApiError> {
    let links = deployment.affiliate_service().list_links(id).await?;
    Ok(ResponseJson(ApiResponse::success(links)))
}

/// POST /api/affiliates/{id}/links
pub async fn create_link(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<CreateAffiliateLink>,
) -> Result<ResponseJson<ApiResponse<AffiliateLinkWithUrl>>, ApiError> {
    let link = deployment.affiliate_service().create_link(id, payload).await?;

    deployment
        .track_if_analytics_allowed(
            "affiliate_link_created",
            serde_json::json!({
                "affiliate_id": id.to_string(),
                "link_id": link.link.id.to_string(),
            }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(link)))
}

/// GET /api/affiliates/{id}/commissions
pub async fn list_commissions(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    Query(query): Query<CommissionListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<AffiliateCommission>>>, ApiError> {
    let commissions = deployment
        .affiliate_service()
        .list_commissions(id, query.status)
        .await?;
    Ok(ResponseJson(ApiResponse::success(commissions)))
}

/// GET /api/affiliates/{id}/payouts
pub async fn list_payouts(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<AffiliatePayout>>>, ApiError> {
    let payouts = deployment.affiliate_service().list_payouts(id).await?;
    Ok(ResponseJson(ApiResponse::success(payouts)))
}

/// POST /api/affiliates/{id}/payouts
pub async fn request_payout(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<AffiliatePayout>>, ApiError> {
    let payout = deployment.affiliate_service().request_payout(id).await?;

    deployment
        .track_if_analytics_allowed(
            "affiliate_payout_requested",
            serde_json::json!({
                "affiliate_id": id.to_string(),
                "amount_cents": payout.amount_cents,
            }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(payout)))
}

/// POST /api/affiliate-links/{tracking_code}/clicks
pub async fn record_click(
    State(deployment): State<DeploymentImpl>,
    Path(tracking_code): Path<String>,
    headers: HeaderMap,
) -> Result<ResponseJson<ApiResponse<ClickOutcome>>, ApiError> {
    let outcome = deployment
        .affiliate_service()
        .record_click(&tracking_code, click_context(&headers))
        .await?;
    Ok(ResponseJson(ApiResponse::success(outcome)))
}

/// GET /r/{tracking_code}
/// Count the click and send the visitor to the link's destination
pub async fn follow_link(
    State(deployment): State<DeploymentImpl>,
    Path(tracking_code): Path<String>,
    headers: HeaderMap,
) -> Result<Redirect, ApiError> {
    let outcome = deployment
        .affiliate_service()
        .record_click(&tracking_code, click_context(&headers))
        .await?;
    Ok(Redirect::temporary(outcome.redirect_url()))
}

/// POST /api/affiliate-conversions
pub async fn record_conversion(
    State(deployment): State<DeploymentImpl>,
    axum::Json(payload): axum::Json<RecordConversion>,
) -> Result<ResponseJson<ApiResponse<AffiliateCommission>>, ApiError> {
    let commission = deployment
        .affiliate_service()
        .record_conversion(payload)
        .await?;

    deployment
        .track_if_analytics_allowed(
            "affiliate_conversion",
            serde_json::json!({
                "affiliate_id": commission.affiliate_id.to_string(),
                "link_id": commission.link_id.to_string(),
            }),
        )
        .await;

    Ok(ResponseJson(ApiResponse::success(commission)))
}

/// GET /api/admin/affiliates
pub async fn admin_list_affiliates(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<AffiliateListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Affiliate>>>, ApiError> {
    let affiliates = deployment.affiliate_service().list(query.status).await?;
    Ok(ResponseJson(ApiResponse::success(affiliates)))
}

/// PUT /api/admin/affiliates/{id}/status
pub async fn admin_set_status(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<SetAffiliateStatus>,
) -> Result<ResponseJson<ApiResponse<Affiliate>>, ApiError> {
    let affiliate = deployment
        .affiliate_service()
        .set_status(id, payload.status)
        .await?;
    Ok(ResponseJson(ApiResponse::success(affiliate)))
}

/// PUT /api/admin/affiliate-links/{id}/active
pub async fn admin_set_link_active(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<SetLinkActive>,
) -> Result<ResponseJson<ApiResponse<AffiliateLinkWithUrl>>, ApiError> {
    let link = deployment
        .affiliate_service()
        .set_link_active(id, payload.is_active)
        .await?;
    Ok(ResponseJson(ApiResponse::success(link)))
}

/// POST /api/admin/commissions/{id}/review
pub async fn admin_review_commission(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<ReviewCommission>,
) -> Result<ResponseJson<ApiResponse<AffiliateCommission>>, ApiError> {
    let commission = deployment
        .affiliate_service()
        .review_commission(id, payload.approve)
        .await?;
    Ok(ResponseJson(ApiResponse::success(commission)))
}

/// Referrer, user agent and the first forwarded client address. The
/// server runs behind a reverse proxy, so the socket peer is not useful.
fn click_context(headers: &HeaderMap) -> ClickContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let ip = header("x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
        .filter(|v| !v.is_empty())
        .or_else(|| header("x-real-ip"));

    ClickContext {
        referrer: header("referer"),
        user_agent: header("user-agent"),
        ip,
    }
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/affiliates", post(apply))
        .route("/affiliates/by-code/{code}", get(get_affiliate_by_code))
        .route("/affiliates/{id}", get(get_affiliate))
        .route("/affiliates/{id}/stats", get(get_stats))
        .route("/affiliates/{id}/links", get(list_links).post(create_link))
        .route("/affiliates/{id}/commissions", get(list_commissions))
        .route("/affiliates/{id}/payouts", get(list_payouts).post(request_payout))
        .route("/affiliate-links/{tracking_code}/clicks", post(record_click))
        .route("/affiliate-conversions", post(record_conversion))
}

pub fn admin_router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/affiliates", get(admin_list_affiliates))
        .route("/affiliates/{id}/status", put(admin_set_status))
        .route("/affiliate-links/{id}/active", put(admin_set_link_active))
        .route("/commissions/{id}/review", post(admin_review_commission))
}

/// Short share links, served outside `/api`
pub fn redirect_router() -> Router<DeploymentImpl> {
    Router::new().route("/r/{tracking_code}", get(follow_link))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_click_context_prefers_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("197.248.1.2, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        headers.insert("referer", HeaderValue::from_static("https://wa.me/"));

        let ctx = click_context(&headers);
        assert_eq!(ctx.ip.as_deref(), Some("197.248.1.2"));
        assert_eq!(ctx.referrer.as_deref(), Some("https://wa.me/"));
        assert_eq!(ctx.user_agent, None);
    }

    #[test]
    fn test_click_context_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("41.90.0.3"));
        assert_eq!(click_context(&headers).ip.as_deref(), Some("41.90.0.3"));
    }
}
