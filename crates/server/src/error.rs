use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    affiliate::AffiliateError, claude_api::ClaudeApiError,
    database_validator::DatabaseValidationError, football_api::FootballApiError,
    matches::MatchError, news::NewsError, predictions::PredictionError, profiles::ProfileError,
    quiz::QuizError,
};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Affiliate(#[from] AffiliateError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Prediction(#[from] PredictionError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    News(#[from] NewsError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    FootballApi(#[from] FootballApiError),
    #[error(transparent)]
    ClaudeApi(#[from] ClaudeApiError),
    #[error(transparent)]
    DatabaseValidation(#[from] DatabaseValidationError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("missing or invalid admin token")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Affiliate(e) => match e {
                AffiliateError::Database(_) | AffiliateError::CodeGenerationExhausted => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                AffiliateError::Validation(_) => StatusCode::BAD_REQUEST,
                AffiliateError::AffiliateNotFound
                | AffiliateError::LinkNotFound
                | AffiliateError::CommissionNotFound
                | AffiliateError::ReferredProfileNotFound => StatusCode::NOT_FOUND,
                AffiliateError::InvalidTransition { .. }
                | AffiliateError::CommissionNotPending(_)
                | AffiliateError::AlreadyConverted => StatusCode::CONFLICT,
                AffiliateError::AffiliateNotApproved(_) => StatusCode::FORBIDDEN,
                AffiliateError::NotEligible(_)
                | AffiliateError::NoAttributableClick
                | AffiliateError::PayoutNotEligible { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            },
            ApiError::Match(e) => match e {
                MatchError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                MatchError::Validation(_) => StatusCode::BAD_REQUEST,
                MatchError::NotFound => StatusCode::NOT_FOUND,
                MatchError::DuplicateExternalId(_)
                | MatchError::InvalidTransition { .. }
                | MatchError::ScoreNotAllowed(_) => StatusCode::CONFLICT,
            },
            ApiError::Prediction(e) => match e {
                PredictionError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                PredictionError::Validation(_) => StatusCode::BAD_REQUEST,
                PredictionError::MatchNotFound => StatusCode::NOT_FOUND,
                PredictionError::MatchNotUpcoming(_) => StatusCode::CONFLICT,
                PredictionError::Generation(e) => claude_status(e),
                PredictionError::InvalidGeneratedContent(_) => StatusCode::BAD_GATEWAY,
            },
            ApiError::Quiz(e) => match e {
                QuizError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                QuizError::Validation(_) | QuizError::UnknownQuestions(_) => {
                    StatusCode::BAD_REQUEST
                }
                QuizError::QuestionNotFound => StatusCode::NOT_FOUND,
            },
            ApiError::News(e) => match e {
                NewsError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                NewsError::Validation(_) => StatusCode::BAD_REQUEST,
                NewsError::NotFound => StatusCode::NOT_FOUND,
                NewsError::NotPublished => StatusCode::FORBIDDEN,
                NewsError::Generation(e) => claude_status(e),
                NewsError::InvalidGeneratedContent(_) => StatusCode::BAD_GATEWAY,
            },
            ApiError::Profile(e) => match e {
                ProfileError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ProfileError::Validation(_) => StatusCode::BAD_REQUEST,
                ProfileError::NotFound => StatusCode::NOT_FOUND,
                ProfileError::UsernameTaken(_) => StatusCode::CONFLICT,
            },
            ApiError::FootballApi(e) => match e {
                FootballApiError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
                FootballApiError::Upstream { status, .. } => {
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                FootballApiError::Transport(_) | FootballApiError::Serde(_) => {
                    StatusCode::BAD_GATEWAY
                }
                FootballApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                FootballApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            },
            ApiError::ClaudeApi(e) => claude_status(e),
            ApiError::DatabaseValidation(_) | ApiError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

fn claude_status(e: &ClaudeApiError) -> StatusCode {
    match e {
        ClaudeApiError::MissingApiKey => StatusCode::SERVICE_UNAVAILABLE,
        ClaudeApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ClaudeApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ClaudeApiError::Http { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        ClaudeApiError::Transport(_) | ClaudeApiError::InvalidApiKey | ClaudeApiError::Serde(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        // Database details stay in the logs
        let message = if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
            "An internal error occurred. Please try again.".to_string()
        } else {
            self.to_string()
        };

        let response = ApiResponse::<()>::error(&message);
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use db::models::{affiliate::AffiliateStatus, football_match::MatchStatus};

    use super::*;

    #[test]
    fn test_affiliate_error_statuses() {
        assert_eq!(
            ApiError::from(AffiliateError::LinkNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(AffiliateError::AlreadyConverted).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(AffiliateError::NotEligible("link is inactive".to_string()))
                .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(AffiliateError::InvalidTransition {
                from: AffiliateStatus::Rejected,
                to: AffiliateStatus::Approved,
            })
            .status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_upstream_status_passes_through() {
        let err = ApiError::from(FootballApiError::Upstream {
            status: 404,
            body: "no such league".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = ApiError::from(FootballApiError::NotConfigured("ODDS_API_KEY"));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err = ApiError::from(NewsError::Generation(ClaudeApiError::RateLimited));
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_match_errors() {
        assert_eq!(
            ApiError::from(MatchError::ScoreNotAllowed(MatchStatus::Upcoming)).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(MatchError::Validation("bad date".to_string())).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let response = ApiError::from(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
