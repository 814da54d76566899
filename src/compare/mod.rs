pub mod handlers;
pub mod runner;
pub mod templates;
mod view;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::page_routes())
        .merge(handlers::api_routes())
}
