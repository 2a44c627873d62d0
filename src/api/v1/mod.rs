//! v1 API endpoints

pub mod query;

use axum::{routing::post, Router};

use super::state::AppState;

pub fn create_v1_router() -> Router<AppState> {
    Router::new().route("/rag/query", post(query::answer_query))
}
