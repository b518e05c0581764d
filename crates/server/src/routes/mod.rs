use std::path::Path;

use axum::{
    Router,
    http::{Method, header},
    middleware::from_fn_with_state,
};
use deployment::Deployment;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::{DeploymentImpl, middleware::require_admin};

pub mod affiliates;
pub mod football_data;
pub mod health;
pub mod matches;
pub mod news;
pub mod predictions;
pub mod profiles;
pub mod quizzes;

pub fn router(deployment: DeploymentImpl) -> Router {
    let admin_routes = Router::new()
        .merge(affiliates::admin_router())
        .merge(matches::admin_router())
        .merge(predictions::admin_router())
        .merge(quizzes::admin_router())
        .merge(news::admin_router())
        .layer(from_fn_with_state(deployment.clone(), require_admin));

    let api_routes = Router::new()
        .merge(health::router())
        .merge(profiles::router())
        .merge(affiliates::router())
        .merge(matches::router())
        .merge(predictions::router())
        .merge(quizzes::router())
        .merge(news::router())
        .merge(football_data::router())
        .nest("/admin", admin_routes);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static(crate::middleware::ADMIN_TOKEN_HEADER),
        ]);

    let mut app = Router::new()
        .nest("/api", api_routes)
        .merge(affiliates::redirect_router());

    // The SPA handles its own routing, so unknown paths fall back to index.html
    if let Some(dir) = deployment.config().static_dir.as_deref() {
        let index = Path::new(dir).join("index.html");
        app = app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(deployment)
}
