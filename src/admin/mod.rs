pub mod auth;
pub mod handlers;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/cache", get(get_cache))
        .route("/admin/rescan", post(post_rescan))
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
