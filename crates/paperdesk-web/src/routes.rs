use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{article, collections, search, subscriptions};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", get(search::search))
        .route("/article/{*id}", get(article::article))
        .route(
            "/user/favorites",
            get(collections::list_favorites).post(collections::add_favorite),
        )
        .route("/user/favorites/{*id}", delete(collections::remove_favorite))
        .route(
            "/user/history",
            get(collections::list_history).post(collections::add_history),
        )
        .route("/user/history/{*id}", delete(collections::remove_history))
        .route(
            "/user/subscriptions",
            get(subscriptions::list).post(subscriptions::add),
        )
        .route("/user/subscriptions/{id}", delete(subscriptions::remove))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
