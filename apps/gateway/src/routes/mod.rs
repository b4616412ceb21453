pub mod health;
pub mod ingest;
pub mod stream;

use axum::Router;

use crate::state::AppState;

pub fn build(state: AppState) -> Router {
    Router::new()
        .merge(ingest::router(state.clone()))
        .merge(health::router(state.clone()))
        .merge(stream::router(state))
}
