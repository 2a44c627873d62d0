//! Medication question endpoint

use axum::extract::State;
use tracing::info;
use validator::Validate;

use crate::api::middleware::logging::truncate_for_log;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, QueryRequest, QueryResponse};
use crate::domain::Query;

/// `POST /v1/rag/query`
///
/// Always 200 once the body validates; stage failures are reported in `errors`.
pub async fn answer_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    request.validate()?;

    let mut query = Query::new(request.query.trim());
    if let Some(user_id) = request.user_id.filter(|u| !u.trim().is_empty()) {
        query = query.with_user(user_id);
    }

    info!(
        query_id = %query.id,
        query = %truncate_for_log(&query.text, 120),
        "RAG query received"
    );

    let answer = state.orchestrator.answer(query).await;
    Ok(Json(answer.into()))
}
