//! # ab-api
//!
//! The web routing and orchestration layer for the Ad Board.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pages;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;

pub use error::{ApiError, PageError};
pub use handlers::AppState;

/// JSON routes, mounted under `/api`.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/register/", post(handlers::register))
        .route("/profiles/{id}/", put(handlers::update_profile))
        .route("/profiles/{id}/ads/", get(handlers::profile_ads))
        .route(
            "/categories/",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/ads/", get(handlers::list_ads).post(handlers::create_ad))
        .route("/ads/last-month/", get(handlers::ads_last_month))
        .route(
            "/ads/with-comment-counts/",
            get(handlers::ads_with_comment_counts),
        )
        .route(
            "/ads/{id}/",
            get(handlers::get_ad)
                .put(handlers::update_ad)
                .delete(handlers::delete_ad),
        )
        .route(
            "/ads/{id}/image/",
            post(handlers::upload_image).layer(DefaultBodyLimit::max(handlers::MAX_UPLOAD_BYTES)),
        )
        .route(
            "/ads/{id}/comments/",
            get(handlers::list_comments).post(handlers::add_comment),
        )
}

/// Builds the full application router: HTML pages, the JSON API and the
/// health probe, wrapped in tracing and CORS layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/ads/", get(pages::ads))
        .route("/ads/{id}/", get(pages::ad_detail))
        .route("/categories/", get(pages::categories))
        .route("/category/{id}/", get(pages::category_detail))
        .route("/user/{id}/", get(pages::user_detail))
        .route("/health", get(handlers::health))
        .nest("/api", api_routes())
        .layer(middleware::cors_policy())
        .layer(middleware::trace_layer())
        .with_state(state)
}
