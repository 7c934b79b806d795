use crate::state::AppState;
use axum::Router;

mod dto;
pub mod guard;
pub mod handlers;
pub mod repo;
pub mod services;
pub(crate) mod extractors;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
