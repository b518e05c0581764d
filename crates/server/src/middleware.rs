use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use deployment::Deployment;
use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::{DeploymentImpl, error::ApiError};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Gate for `/api/admin`. Without a configured token every admin request
/// is refused.
pub async fn require_admin(
    State(deployment): State<DeploymentImpl>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = deployment.config().admin_token.as_ref() else {
        return Err(ApiError::Forbidden("admin access is not configured".to_string()));
    };

    let provided = request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !token_matches(provided, expected.expose_secret()) {
        warn!(path = %request.uri().path(), "Rejected admin request");
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}

fn token_matches(provided: &str, expected: &str) -> bool {
    !provided.is_empty() && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_matches() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cre", "s3cret"));
        assert!(!token_matches("", ""));
        assert!(!token_matches("S3CRET", "s3cret"));
    }
}
