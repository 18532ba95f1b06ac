mod handlers;
pub mod migrate;
mod model;
mod routes;

pub use model::*;

use axum::middleware;

use crate::{openapi::aide::axum::ApiRouter, state::AppState, users::auth::require_user};

pub fn router(state: AppState) -> ApiRouter {
    ApiRouter::new()
        .merge(routes::router(state))
        .route_layer(middleware::from_fn(require_user))
}
