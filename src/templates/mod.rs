use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod lists;
pub mod model;
pub mod repo;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::template_routes())
        .merge(handlers::render_routes())
}
